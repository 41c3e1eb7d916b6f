//! # xtask - 开发辅助工具
//!
//! 提供本地质量门禁与开发辅助命令。
//!
//! ## 命令
//!
//! - `check-all`: 运行 fmt、clippy、test
//! - `cov`: 运行 story-engine 覆盖率
//! - `story-check`: 检查故事文件（节点引用、标签词汇）

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use story_engine::{Diagnostic, DiagnosticResult, Tag, lint_choice_tags, lint_tags};
use walkdir::WalkDir;
use xshell::{Shell, cmd};

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "开发辅助工具")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 运行 fmt、clippy、test 门禁检查
    CheckAll,
    /// 运行 story-engine 覆盖率报告（需要 cargo-llvm-cov）
    Cov,
    /// 检查故事文件
    StoryCheck {
        /// 文件或目录，默认 host-cli/stories
        path: Option<PathBuf>,
    },
}

fn run(step: &str, command: xshell::Cmd<'_>) -> anyhow::Result<()> {
    eprintln!("\n==> {step}");
    command.run()?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = real_main() {
        eprintln!("xtask error: {e:#}");
        return ExitCode::from(1);
    }
    ExitCode::from(0)
}

fn real_main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    match cli.command {
        Some(Command::CheckAll) => {
            run("cargo fmt --all -- --check", cmd!(sh, "cargo fmt --all -- --check"))?;
            run(
                "cargo clippy --workspace --all-targets",
                cmd!(sh, "cargo clippy --workspace --all-targets"),
            )?;
            run("cargo test --workspace", cmd!(sh, "cargo test --workspace"))?;
        }
        Some(Command::Cov) => {
            if cmd!(sh, "cargo llvm-cov --version").quiet().run().is_err() {
                anyhow::bail!(
                    "cargo llvm-cov 不可用。\n\
请先安装：\n\
  - cargo install cargo-llvm-cov\n\
  - rustup component add llvm-tools-preview\n\
然后重试。"
                );
            }
            run(
                "cargo llvm-cov -p story-engine --html",
                cmd!(sh, "cargo llvm-cov -p story-engine --html"),
            )?;
            eprintln!("\nCoverage HTML: target/llvm-cov/html/index.html");
        }
        Some(Command::StoryCheck { path }) => story_check(path.as_deref())?,
        None => print_help(),
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        r#"xtask - 开发辅助工具

USAGE:
  cargo xtask <command>

COMMANDS:
  check-all       运行 fmt、clippy、test 门禁检查
  cov             运行 story-engine 覆盖率报告
  story-check     检查故事文件

STORY-CHECK:
  cargo xtask story-check [path]

  不带参数：检查 host-cli/stories/ 下所有 .json 文件
  带路径参数：检查指定文件或目录

  检查内容：
    - JSON 格式与起始节点
    - 未定义的跳转目标（goto / next 引用的节点）
    - 段落标签（未知键、格式错误的数字与时间）
    - 选项标签（tactic / interrogation）
"#
    );
}

//=============================================================================
// story-check 命令实现
//=============================================================================

/// 默认故事目录（相对于 workspace root）
const DEFAULT_STORIES_DIR: &str = "host-cli/stories";

/// 执行故事检查
fn story_check(path: Option<&Path>) -> anyhow::Result<()> {
    let root = path.unwrap_or(Path::new(DEFAULT_STORIES_DIR));
    if !root.exists() {
        anyhow::bail!(
            "路径不存在: {}\n请在 workspace 根目录运行，或指定故事路径",
            root.display()
        );
    }

    let files = collect_story_files(root);
    if files.is_empty() {
        eprintln!("未找到故事文件（.json）");
        return Ok(());
    }

    eprintln!("==> 检查 {} 个故事文件...\n", files.len());

    let mut diagnostics = DiagnosticResult::new();
    for file in &files {
        let source = file.display().to_string();
        match std::fs::read_to_string(file) {
            Ok(content) => diagnostics.merge(check_story(&source, &content)),
            Err(e) => diagnostics.push(Diagnostic::error(&source, format!("无法读取文件 - {e}"))),
        }
    }

    print_check_result(files.len(), &diagnostics);

    if diagnostics.has_errors() {
        anyhow::bail!("故事检查发现错误");
    }
    Ok(())
}

/// 收集目录下的所有故事文件
fn collect_story_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// 检查单个故事文件的内容
fn check_story(source: &str, content: &str) -> DiagnosticResult {
    let mut result = DiagnosticResult::new();

    let story: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => {
            result.push(Diagnostic::error(source, format!("JSON 解析失败: {e}")));
            return result;
        }
    };

    let Some(nodes) = story.get("nodes").and_then(Value::as_object) else {
        result.push(Diagnostic::error(source, "缺少 nodes"));
        return result;
    };
    let known: BTreeSet<&str> = nodes.keys().map(String::as_str).collect();

    match story.get("start").and_then(Value::as_str) {
        Some(start) if known.contains(start) => {}
        Some(start) => result.push(Diagnostic::error(source, format!("起始节点不存在: {start}"))),
        None => result.push(Diagnostic::error(source, "缺少 start")),
    }

    result.merge(lint_tags(source, "global_tags", &tags_at(&story, "global_tags")));

    for (id, node) in nodes {
        let paragraphs = node.get("paragraphs").and_then(Value::as_array);
        for (i, paragraph) in paragraphs.into_iter().flatten().enumerate() {
            result.merge(lint_tags(
                source,
                &format!("{id}.paragraphs[{i}]"),
                &tags_of(paragraph),
            ));
        }

        let choices = node.get("choices").and_then(Value::as_array);
        for (i, choice) in choices.into_iter().flatten().enumerate() {
            let location = format!("{id}.choices[{i}]");
            result.merge(lint_choice_tags(source, &location, &tags_of(choice)));
            check_target(&mut result, source, &location, choice.get("goto"), &known, true);
        }

        check_target(&mut result, source, id, node.get("next"), &known, false);
    }

    result
}

/// 检查节点引用
fn check_target(
    result: &mut DiagnosticResult,
    source: &str,
    location: &str,
    target: Option<&Value>,
    known: &BTreeSet<&str>,
    required: bool,
) {
    match target.and_then(Value::as_str) {
        Some(target) if known.contains(target) => {}
        Some(target) => result.push(
            Diagnostic::error(source, format!("未定义的跳转目标 **{target}**")).at(location),
        ),
        None if required => result.push(Diagnostic::error(source, "缺少跳转目标").at(location)),
        None => {}
    }
}

/// 读取 `tags` 数组，缺失时视为没有标签
fn tags_of(value: &Value) -> Vec<Tag> {
    tags_at(value, "tags")
}

fn tags_at(value: &Value, key: &str) -> Vec<Tag> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(Tag::parse)
                .collect()
        })
        .unwrap_or_default()
}

/// 输出检查结果
fn print_check_result(files_checked: usize, diagnostics: &DiagnosticResult) {
    eprintln!("─────────────────────────────────────────────────────");
    eprintln!("检查完成: {} 个故事", files_checked);
    eprintln!();

    for diag in &diagnostics.diagnostics {
        eprintln!("{}", diag);
    }

    let error_count = diagnostics.error_count();
    let warn_count = diagnostics.warn_count();

    eprintln!();
    if error_count > 0 {
        eprintln!("❌ {} 个错误, {} 个警告", error_count, warn_count);
    } else if warn_count > 0 {
        eprintln!("⚠️  0 个错误, {} 个警告", warn_count);
    } else {
        eprintln!("✅ 检查通过，无错误");
    }
}
