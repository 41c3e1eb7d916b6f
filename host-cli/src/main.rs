//! # story-cli
//!
//! 终端宿主：在命令行里播放 JSON 故事，驱动 `story-engine` 的会话。
//!
//! ## 操作
//!
//! - 回车：跳过揭示 / 点击继续
//! - 数字：选择对应选项
//! - `s`：立即存档
//! - `b`：显示最近的回看记录
//! - `q`：退出

mod config;
mod save_manager;
mod scripted;
mod sink;

use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use story_engine::{
    BacklogEntry, ChoiceView, ChooseOutcome, Projection, Session, SessionStatus, SnapshotStore,
    dispatch_all,
};
use tracing::{info, warn};

use config::HostConfig;
use save_manager::FileSnapshotStore;
use scripted::ScriptedRuntime;
use sink::ConsoleSink;

/// 命令行参数
#[derive(Debug, Parser)]
#[command(name = "story-cli", version, about = "在终端里播放互动推理故事")]
struct Cli {
    /// 配置文件路径
    #[arg(long, default_value = "story-cli.json")]
    config: PathBuf,

    /// 故事文件（覆盖配置）
    #[arg(long)]
    story: Option<PathBuf>,

    /// 存档目录（覆盖配置）
    #[arg(long)]
    saves_dir: Option<PathBuf>,

    /// 播放速度倍率（覆盖配置）
    #[arg(long)]
    speed: Option<f64>,

    /// 日志级别（覆盖配置）
    #[arg(long)]
    log_level: Option<String>,

    /// 从自动存档继续
    #[arg(long)]
    resume: bool,

    /// 无人值守：总是点击继续并选择第一个选项
    #[arg(long)]
    auto: bool,

    /// 把合并后的配置写入配置文件后退出
    #[arg(long)]
    write_config: bool,
}

/// 玩家输入
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Tap,
    Choose(usize),
    Save,
    Backlog,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => Self::Tap,
            "s" => Self::Save,
            "b" => Self::Backlog,
            "q" => Self::Quit,
            _ => match line.parse::<usize>() {
                // 界面上从 1 开始编号
                Ok(n) if n >= 1 => Self::Choose(n - 1),
                _ => Self::Unknown(line.to_string()),
            },
        }
    }
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("story-cli error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, source) = HostConfig::load(&cli.config);
    let config = merge_config(config, &cli);

    tracing_subscriber::fmt()
        .with_max_level(config.level())
        .with_writer(io::stderr)
        .init();
    source.report(&cli.config);

    if cli.write_config {
        config.save(&cli.config)?;
        info!(path = %cli.config.display(), "配置已写入");
        return Ok(());
    }

    config.validate()?;
    info!(
        story = %config.story_path.display(),
        speed = config.speed,
        "配置就绪"
    );

    let json = fs::read_to_string(&config.story_path)
        .with_context(|| format!("无法读取故事文件: {}", config.story_path.display()))?;
    let runtime = ScriptedRuntime::from_json(&json)?;

    let store = FileSnapshotStore::new(&config.saves_dir);
    let mut session = Session::new(runtime, config.engine.clone());

    if cli.resume {
        match store.get(&config.save_key)? {
            Some(snapshot) => {
                info!(key = %config.save_key, "从存档继续");
                session.resume(&snapshot)?;
            }
            None => {
                warn!(
                    key = %config.save_key,
                    available = ?store.list_keys(),
                    "没有找到存档，从头开始"
                );
                session.start()?;
            }
        }
    } else {
        session.start()?;
    }

    let input = spawn_input_reader();
    let mut player = Player {
        session,
        store,
        config,
        auto: cli.auto,
        screen: Screen::default(),
    };
    player.run(&input)
}

/// 命令行参数覆盖配置文件
fn merge_config(mut config: HostConfig, cli: &Cli) -> HostConfig {
    if let Some(story) = &cli.story {
        config.story_path = story.clone();
    }
    if let Some(dir) = &cli.saves_dir {
        config.saves_dir = dir.clone();
    }
    if let Some(speed) = cli.speed {
        config.speed = speed;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    config
}

/// 标准输入按行读取，交给主循环
fn spawn_input_reader() -> Receiver<Input> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Input::parse(&line)).is_err() {
                break;
            }
        }
    });
    rx
}

/// 已经输出到终端的内容
#[derive(Debug, Default)]
struct Screen {
    printed: usize,
    choices_shown: bool,
    heading: Option<(u32, String)>,
}

impl Screen {
    fn new_frame(&mut self) {
        self.printed = 0;
        self.choices_shown = false;
    }

    fn render(&mut self, view: &Projection) {
        let heading = (view.chapter, view.title.clone());
        if self.heading.as_ref() != Some(&heading) {
            println!("\n=== 第 {} 章 {} ===", view.chapter, view.title);
            self.heading = Some(heading);
        }

        for paragraph in view.visible_paragraphs.iter().skip(self.printed) {
            println!("[{}] {}", paragraph.at, format_paragraph(paragraph));
        }
        self.printed = self.printed.max(view.visible_paragraphs.len());

        if self.choices_shown || matches!(view.choices, ChoiceView::Hidden) {
            return;
        }
        if let Some(panel) = &view.interrogation {
            println!(
                "  -- 审讯 {}：压力 {} / 剩余 {} 秒 / {}",
                panel.subject_name, panel.pressure, panel.time_budget_seconds, panel.hint_text
            );
        }
        for item in view.choices.options() {
            match &item.tactic {
                Some(tactic) => println!("  {}. [{}] {}", item.index + 1, tactic, item.text),
                None => println!("  {}. {}", item.index + 1, item.text),
            }
        }
        self.choices_shown = true;
    }
}

fn format_paragraph(paragraph: &story_engine::VisibleParagraph) -> String {
    use story_engine::RenderVariant;

    match &paragraph.variant {
        RenderVariant::Dialogue { speaker } => format!("{speaker}: {}", paragraph.text),
        RenderVariant::Vision => format!("~ {} ~", paragraph.text),
        RenderVariant::Document => format!("| {}", paragraph.text),
        RenderVariant::SystemNote => format!("* {}", paragraph.text),
        RenderVariant::DateLine => format!("-- {} --", paragraph.text),
        RenderVariant::Narration => paragraph.text.clone(),
    }
}

/// 主循环
struct Player {
    session: Session<ScriptedRuntime>,
    store: FileSnapshotStore,
    config: HostConfig,
    auto: bool,
    screen: Screen,
}

impl Player {
    fn run(&mut self, input: &Receiver<Input>) -> anyhow::Result<()> {
        let mut sink = ConsoleSink::new(io::stdout());
        let mut last = Instant::now();

        loop {
            let now = Instant::now();
            self.session
                .tick(now.duration_since(last).mul_f64(self.config.speed));
            last = now;

            dispatch_all(&mut sink, &self.session.drain_effects());
            self.screen.render(&self.session.projection());
            self.session
                .persist_if_needed(&mut self.store, &self.config.save_key)?;

            match self.session.status() {
                SessionStatus::Ended => {
                    println!("\n=== 完 ===");
                    return Ok(());
                }
                SessionStatus::Failed { message } => anyhow::bail!("会话失败: {message}"),
                SessionStatus::AwaitingTap if self.auto => {
                    self.handle(Input::Tap)?;
                    continue;
                }
                SessionStatus::AwaitingChoice if self.auto => {
                    self.handle(Input::Choose(0))?;
                    continue;
                }
                _ => {}
            }

            let next = match self.session.next_wakeup() {
                Some(wait) => {
                    let wait = wait.div_f64(self.config.speed);
                    match input.recv_timeout(wait) {
                        Ok(next) => Some(next),
                        Err(RecvTimeoutError::Timeout) => None,
                        // 无人值守时标准输入可能已关闭
                        Err(RecvTimeoutError::Disconnected) if self.auto => {
                            thread::sleep(wait);
                            None
                        }
                        Err(RecvTimeoutError::Disconnected) => Some(Input::Quit),
                    }
                }
                None => Some(input.recv().unwrap_or(Input::Quit)),
            };

            if let Some(next) = next
                && !self.handle(next)?
            {
                self.session.close();
                return Ok(());
            }
        }
    }

    /// 处理一条输入，返回 false 表示退出
    fn handle(&mut self, input: Input) -> anyhow::Result<bool> {
        match input {
            Input::Tap => {
                if self.session.skip() {
                    return Ok(true);
                }
                if self.session.status() == SessionStatus::AwaitingTap {
                    self.session.tap_to_continue()?;
                    self.screen.new_frame();
                }
            }
            Input::Choose(index) => match self.session.choose(index) {
                Ok(ChooseOutcome::Advanced) => self.screen.new_frame(),
                Ok(_) => {}
                Err(e) => println!("  {e}"),
            },
            Input::Save => {
                let snapshot = self.session.snapshot()?;
                self.store.put(&self.config.save_key, &snapshot)?;
                println!(
                    "  已存档: {} ({})",
                    self.config.save_key,
                    self.session.runtime().current_node()
                );
            }
            Input::Backlog => {
                for entry in self.session.backlog().iter() {
                    println!("  {}", format_entry(entry));
                }
            }
            Input::Quit => return Ok(false),
            Input::Unknown(line) => println!("  无法识别的输入: {line}"),
        }
        Ok(true)
    }
}

fn format_entry(entry: &BacklogEntry) -> String {
    match entry {
        BacklogEntry::Paragraph { speaker, text, at } => match speaker {
            Some(speaker) => format!("[{at}] {speaker}: {text}"),
            None => format!("[{at}] {text}"),
        },
        BacklogEntry::ChoiceMade {
            options,
            selected_index,
            at,
        } => format!(
            "[{at}] > {}",
            options.get(*selected_index).map(String::as_str).unwrap_or("?")
        ),
        BacklogEntry::ChapterMark { chapter, title, at } => {
            format!("[{at}] === 第 {chapter} 章 {title} ===")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(Input::parse(""), Input::Tap);
        assert_eq!(Input::parse(" 2 \n"), Input::Choose(1));
        assert_eq!(Input::parse("s"), Input::Save);
        assert_eq!(Input::parse("q"), Input::Quit);
        assert_eq!(Input::parse("0"), Input::Unknown("0".to_string()));
        assert_eq!(Input::parse("look"), Input::Unknown("look".to_string()));
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from(["story-cli", "--speed", "3", "--log-level", "debug"]);
        let config = merge_config(HostConfig::default(), &cli);
        assert_eq!(config.speed, 3.0);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.save_key, "autosave");
    }
}
