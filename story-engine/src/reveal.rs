//! # Reveal 模块
//!
//! 揭示调度器：把一帧的段落按阅读节奏逐段展示出来。
//!
//! ## 执行模型
//!
//! 调度器不读真实时钟。宿主（经由 Session）把流逝的时间传给 [`RevealScheduler::update`]，
//! 调度器报告这段时间内揭示了哪些段落；标签的应用由 Session 完成。
//!
//! ```text
//! begin_frame ──300ms──► p0 ──delay(p0)──► p1 ──delay(p1)──► p2 ──delay(p2)──► 完成
//! ```
//!
//! - 第 i 段的等待时间按**上一段**计算（玩家读完刚出现的内容需要多久），第 0 段固定 300ms
//! - 最后一段出现后还要再等 `delay(最后一段)` 才结束揭示，随后才展示选项
//! - 任意时刻最多只有一个待触发的计时器；`begin_frame` / `skip` / `cancel` 都会先清掉它

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;

use crate::frame::Paragraph;

/// 第 0 段的固定延迟
pub const INITIAL_DELAY_MS: u64 = 300;

/// 短句（< 30 字）的固定延迟
pub const SHORT_LINE_DELAY_MS: u64 = 600;

/// 对话"正在输入"阶段的基础时长与上限
const TYPING_BASE_MS: f64 = 800.0;
const TYPING_PER_CHAR_MS: f64 = 8.0;
const TYPING_MAX_MS: f64 = 1500.0;

/// 对话逐字打印：每字耗时 = clamp(1500 / len, 12, 25)
const PRINTING_BUDGET_MS: f64 = 1500.0;
const CHAR_SPEED_MIN_MS: f64 = 12.0;
const CHAR_SPEED_MAX_MS: f64 = 25.0;

/// 对话结束后的缓冲
const SPEAKER_BUFFER_MS: f64 = 500.0;

/// 中等长度（30..100 字）：800 + 5·len
const MEDIUM_BASE_MS: u64 = 800;
const MEDIUM_PER_CHAR_MS: u64 = 5;

/// 长段落（>= 100 字）：min(1200 + 6·len, 3000)
const LONG_BASE_MS: u64 = 1200;
const LONG_PER_CHAR_MS: u64 = 6;
const LONG_MAX_MS: u64 = 3000;

/// 计算读完一个段落所需的时间
///
/// 分类按优先级：
/// 1. 带 `speaker` 标签（对话）：输入阶段 + 打印阶段 + 500ms 缓冲
/// 2. 少于 30 字：600ms
/// 3. 少于 100 字：800 + 5·len
/// 4. 其余：min(1200 + 6·len, 3000)
///
/// `len` 是展示文本的字符数（不含标签）。
pub fn reading_delay(paragraph: &Paragraph) -> Duration {
    Duration::from_millis(delay_ms(paragraph.char_len(), paragraph.speaker().is_some()))
}

fn delay_ms(len: usize, is_speaker: bool) -> u64 {
    if is_speaker {
        let len_f = len as f64;
        let typing = (TYPING_BASE_MS + TYPING_PER_CHAR_MS * len_f).min(TYPING_MAX_MS);
        // 空文本时 1500/0 为无穷大，取上限
        let char_speed = if len == 0 {
            CHAR_SPEED_MAX_MS
        } else {
            (PRINTING_BUDGET_MS / len_f).clamp(CHAR_SPEED_MIN_MS, CHAR_SPEED_MAX_MS)
        };
        let printing = len_f * char_speed;
        (typing + printing + SPEAKER_BUFFER_MS).round() as u64
    } else if len < 30 {
        SHORT_LINE_DELAY_MS
    } else if len < 100 {
        MEDIUM_BASE_MS + MEDIUM_PER_CHAR_MS * len as u64
    } else {
        (LONG_BASE_MS + LONG_PER_CHAR_MS * len as u64).min(LONG_MAX_MS)
    }
}

/// 揭示游标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RevealCursor {
    /// 已展示的段落数
    pub displayed_count: usize,
    /// 是否正在揭示
    pub is_revealing: bool,
    /// 本帧是否被跳过（宿主据此省略入场动画）
    pub skipped: bool,
}

/// 待触发的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// 展示第 n 段
    Reveal(usize),
    /// 最后一段之后的收尾等待
    Settle,
}

/// 唯一的待触发计时器
#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    step: Step,
    remaining: Duration,
}

/// 一次 `update` 的结果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevealProgress {
    /// 本次新展示的段落索引
    pub revealed: Range<usize>,
    /// 本次是否结束了揭示
    pub finished: bool,
}

/// 揭示调度器
#[derive(Debug, Clone, Default)]
pub struct RevealScheduler {
    cursor: RevealCursor,
    /// 每一步的延迟：`delays[i]` 是展示第 i 段前的等待，`delays[len]` 是收尾等待
    delays: Vec<Duration>,
    pending: Option<PendingTimer>,
}

impl RevealScheduler {
    /// 创建空闲的调度器
    pub fn new() -> Self {
        Self::default()
    }

    /// 开始揭示新的一帧
    ///
    /// 会先取消任何未触发的计时器。没有段落时直接处于空闲状态。
    pub fn begin_frame(&mut self, paragraphs: &[Paragraph]) {
        self.pending = None;
        self.cursor = RevealCursor::default();
        self.delays.clear();

        if paragraphs.is_empty() {
            return;
        }

        self.delays.push(Duration::from_millis(INITIAL_DELAY_MS));
        self.delays.extend(paragraphs.iter().map(reading_delay));

        self.cursor.is_revealing = true;
        self.pending = Some(PendingTimer {
            step: Step::Reveal(0),
            remaining: self.delays[0],
        });
    }

    /// 直接以"已全部展示"的状态呈现一帧（读档恢复缓存段落时使用）
    pub fn present_revealed(&mut self, count: usize) {
        self.pending = None;
        self.delays.clear();
        self.cursor = RevealCursor {
            displayed_count: count,
            is_revealing: false,
            skipped: true,
        };
    }

    /// 从第 `displayed` 段继续揭示（读档恢复未揭示完的帧时使用）
    ///
    /// 前 `displayed` 段视为已展示，剩余段落按正常节奏继续；等待时间同样按上一段计算，
    /// `displayed` 为 0 时与 [`begin_frame`](Self::begin_frame) 一致。
    /// 已全部展示时直接处于空闲状态。
    pub fn resume_frame(&mut self, paragraphs: &[Paragraph], displayed: usize) {
        if displayed >= paragraphs.len() {
            self.present_revealed(paragraphs.len());
            return;
        }

        self.begin_frame(paragraphs);
        self.cursor.displayed_count = displayed;
        self.pending = Some(PendingTimer {
            step: Step::Reveal(displayed),
            remaining: self.delays[displayed],
        });
    }

    /// 推进时间
    ///
    /// 一次传入较长的时间会连续触发多个步骤，剩余时间顺延到下一步，
    /// 因此各段落的累计展示时刻与逐次调用完全一致。
    pub fn update(&mut self, dt: Duration) -> RevealProgress {
        let start = self.cursor.displayed_count;
        let mut finished = false;
        let mut budget = dt;

        while let Some(timer) = &mut self.pending {
            if budget < timer.remaining {
                timer.remaining -= budget;
                break;
            }
            budget -= timer.remaining;
            let step = timer.step;

            match step {
                Step::Reveal(index) => {
                    self.cursor.displayed_count = index + 1;
                    let next = if index + 1 < self.total() {
                        Step::Reveal(index + 1)
                    } else {
                        Step::Settle
                    };
                    // delays[index + 1] 是按刚展示的第 index 段计算的
                    self.pending = Some(PendingTimer {
                        step: next,
                        remaining: self.delays[index + 1],
                    });
                }
                Step::Settle => {
                    self.pending = None;
                    self.cursor.is_revealing = false;
                    finished = true;
                }
            }
        }

        RevealProgress {
            revealed: start..self.cursor.displayed_count,
            finished,
        }
    }

    /// 快进
    ///
    /// 正在揭示时：立即展示全部段落，返回尚未应用标签的段落索引范围（可能为空，
    /// 例如已处于收尾等待）。不在揭示中时为无操作，返回 `None`。
    pub fn skip(&mut self) -> Option<Range<usize>> {
        if !self.cursor.is_revealing {
            return None;
        }
        self.pending = None;

        let start = self.cursor.displayed_count;
        let total = self.total();
        self.cursor = RevealCursor {
            displayed_count: total,
            is_revealing: false,
            skipped: true,
        };
        Some(start..total)
    }

    /// 取消计时器并停止揭示（会话关闭时使用）
    pub fn cancel(&mut self) {
        self.pending = None;
        self.cursor.is_revealing = false;
    }

    /// 当前游标
    pub fn cursor(&self) -> RevealCursor {
        self.cursor
    }

    /// 是否正在揭示
    pub fn is_revealing(&self) -> bool {
        self.cursor.is_revealing
    }

    /// 距离下一步还有多久
    pub fn time_until_next(&self) -> Option<Duration> {
        self.pending.map(|t| t.remaining)
    }

    fn total(&self) -> usize {
        self.delays.len().saturating_sub(1)
    }
}
