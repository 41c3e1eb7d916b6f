//! # Session 模块
//!
//! 一次游玩对应一个 `Session`，把各个组件串成一条协作式时间线。
//!
//! ## 执行模型
//!
//! ```text
//! Host                                     Session
//!   │──── start() / resume(snapshot) ────────►│── StoryRuntime
//!   │──── tick(dt) ──────────────────────────►│   揭示 / 幻视 / 审讯倒计时
//!   │◄─── drain_effects() ────────────────────│   Vec<Effect>
//!   │◄─── projection() ───────────────────────│   只读视图
//!   │──── skip() / tap_to_continue() / choose(i)►│
//!   │◄─── next_wakeup() ──────────────────────│   距离下一个计时器
//! ```
//!
//! - 会话不读真实时钟；宿主决定时间怎么流逝（实时、加速、测试中一步到位）
//! - 副作用先进发件箱，由宿主取走分发；关闭后发件箱被清空且不再接收
//! - 运行时调用在下一次调度之前同步完成，不做预取
//! - 运行时 / 存档错误让会话进入 `Failed`，对应界面上的"无法继续"

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::adapter::StoryRuntime;
use crate::backlog::{Backlog, BacklogEntry};
use crate::clock::StoryClock;
use crate::config::EngineConfig;
use crate::effect::Effect;
use crate::error::{AdapterError, EngineError, EngineResult};
use crate::frame::{StoryFrame, VarValue};
use crate::interpreter::TagInterpreter;
use crate::persist::{self, SessionSnapshot, SnapshotStore};
use crate::presentation::PresentationState;
use crate::projection::{Projection, ProjectionSource};
use crate::reveal::{RevealCursor, RevealScheduler};

const ONE_SECOND: Duration = Duration::from_secs(1);

/// 会话状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionStatus {
    /// 尚未开始
    Idle,
    /// 正在揭示段落
    Revealing,
    /// 等待玩家选择
    AwaitingChoice,
    /// 没有选项也没结束，等待点击继续
    AwaitingTap,
    /// 故事结束（或会话已关闭）
    Ended,
    /// 无法继续
    Failed { message: String },
}

/// `choose` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChooseOutcome {
    /// 选择已交给运行时，进入下一帧
    Advanced,
    /// 仍在揭示：本次视为跳过，选择被忽略
    SkippedReveal,
    /// 当前没有可选项（无帧、已结束、已失败），无操作
    Ignored,
}

/// 播放会话
pub struct Session<R: StoryRuntime> {
    runtime: R,
    interpreter: TagInterpreter,
    scheduler: RevealScheduler,
    presentation: PresentationState,
    frame: Option<StoryFrame>,
    /// 每个已展示段落的故事时间，长度始终等于 `displayed_count`
    stamps: Vec<StoryClock>,
    backlog: Backlog,
    outbox: Vec<Effect>,
    /// 审讯倒计时不足一秒的部分
    countdown_carry: Duration,
    failure: Option<String>,
    dirty: bool,
    closed: bool,
}

impl<R: StoryRuntime> Session<R> {
    /// 创建会话
    pub fn new(runtime: R, config: EngineConfig) -> Self {
        let backlog = Backlog::with_capacity(config.backlog_capacity);
        let presentation = initial_presentation(&config);
        Self {
            runtime,
            interpreter: TagInterpreter::new(config),
            scheduler: RevealScheduler::new(),
            presentation,
            frame: None,
            stamps: Vec::new(),
            backlog,
            outbox: Vec::new(),
            countdown_carry: Duration::ZERO,
            failure: None,
            dirty: false,
            closed: false,
        }
    }

    /// 从头开始
    ///
    /// 重置展示状态与回看记录，应用故事级标签，然后开始揭示第一帧。
    pub fn start(&mut self) -> EngineResult<()> {
        self.ensure_open()?;
        self.reset_playback();

        let frame = match self.runtime.reset() {
            Ok(frame) => frame,
            Err(e) => return Err(self.fail(e.into())),
        };
        info!(
            paragraphs = frame.paragraphs.len(),
            global_tags = frame.global_tags.len(),
            "会话开始"
        );

        let effects = self.interpreter.apply(&mut self.presentation, &frame.global_tags);
        self.outbox.extend(effects);
        self.enter_frame(frame);
        Ok(())
    }

    /// 从快照恢复
    ///
    /// 存档时已展示的缓存段落直接呈现，不重新触发它们的标签效果；
    /// 存档时尚未展示的段落从断点继续揭示。运行时返回的实时段落走正常揭示流程。
    pub fn resume(&mut self, snapshot: &SessionSnapshot) -> EngineResult<()> {
        self.ensure_open()?;
        self.reset_playback();

        let restored = match persist::restore_frame(&mut self.runtime, snapshot) {
            Ok(restored) => restored,
            Err(e) => return Err(self.fail(e)),
        };

        if let Some(presentation) = &snapshot.presentation {
            self.presentation = presentation.clone();
            self.presentation.vision_remaining = None;
        }

        if restored.from_cache {
            let revealed = restored.revealed;
            info!(
                revealed,
                paragraphs = restored.frame.paragraphs.len(),
                "从快照缓存恢复"
            );
            // 已展示段落的标签已体现在展示状态里，只有断点之后的段落会再应用标签
            self.scheduler.resume_frame(&restored.frame.paragraphs, revealed);
            self.stamps = vec![self.presentation.clock; revealed];
            self.frame = Some(restored.frame);
            self.dirty = false;
        } else {
            info!(paragraphs = restored.frame.paragraphs.len(), "从运行时恢复");
            self.enter_frame(restored.frame);
        }
        Ok(())
    }

    /// 推进时间
    ///
    /// 依次处理审讯倒计时、幻视计时、段落揭示；会话关闭或失败后为无操作。
    pub fn tick(&mut self, dt: Duration) {
        if !self.is_live() {
            return;
        }

        self.tick_countdown(dt);

        if let Some(remaining) = self.presentation.vision_remaining {
            if dt >= remaining {
                debug!("幻视效果结束");
                self.presentation.vision_remaining = None;
            } else {
                self.presentation.vision_remaining = Some(remaining - dt);
            }
        }

        let progress = self.scheduler.update(dt);
        for index in progress.revealed {
            self.disclose(index);
        }
        if progress.finished {
            self.on_reveal_finished();
        }
    }

    /// 快进当前帧
    ///
    /// 返回是否真的跳过了什么；没有正在揭示的帧时为无操作。
    pub fn skip(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        let Some(pending) = self.scheduler.skip() else {
            return false;
        };

        debug!(remaining = pending.len(), "跳过揭示");
        for index in pending {
            self.disclose(index);
        }
        self.on_reveal_finished();
        true
    }

    /// 点击继续
    ///
    /// - 正在揭示：等同于 [`skip`](Self::skip)
    /// - 没有选项且未结束：向运行时要下一帧
    /// - 其余情况：无操作
    pub fn tap_to_continue(&mut self) -> EngineResult<()> {
        self.ensure_open()?;
        if self.scheduler.is_revealing() {
            self.skip();
            return Ok(());
        }
        if self.status() != SessionStatus::AwaitingTap {
            return Ok(());
        }

        match self.runtime.cont() {
            Ok(frame) => {
                self.enter_frame(frame);
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// 做出选择
    ///
    /// 揭示未完成时选择会被忽略，并立即跳过揭示。
    /// 索引不在当前选项中时返回 [`AdapterError::InvalidChoice`]，会话状态不变。
    pub fn choose(&mut self, index: usize) -> EngineResult<ChooseOutcome> {
        self.ensure_open()?;
        if self.failure.is_some() {
            return Ok(ChooseOutcome::Ignored);
        }
        if self.scheduler.is_revealing() {
            info!(index, "揭示未完成，忽略选择并跳过");
            self.skip();
            return Ok(ChooseOutcome::SkippedReveal);
        }

        let Some(frame) = &self.frame else {
            return Ok(ChooseOutcome::Ignored);
        };
        if frame.choices.is_empty() {
            return Ok(ChooseOutcome::Ignored);
        }
        if !frame.has_choice(index) {
            return Err(AdapterError::InvalidChoice {
                index,
                available: frame.choice_indices(),
            }
            .into());
        }

        let options = frame.choices.iter().map(|c| c.text.clone()).collect();
        self.backlog.push(BacklogEntry::ChoiceMade {
            options,
            selected_index: index,
            at: self.presentation.clock,
        });

        debug!(index, "提交选择");
        match self.runtime.choose(index) {
            Ok(next) => {
                self.enter_frame(next);
                Ok(ChooseOutcome::Advanced)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// 取走待分发的副作用
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.outbox)
    }

    /// 生成只读视图
    pub fn projection(&self) -> Projection {
        let (paragraphs, choices) = match &self.frame {
            Some(frame) => (frame.paragraphs.as_slice(), frame.choices.as_slice()),
            None => (&[][..], &[][..]),
        };
        Projection::capture(ProjectionSource {
            status: self.status(),
            paragraphs,
            stamps: &self.stamps,
            choices,
            cursor: self.scheduler.cursor(),
            presentation: &self.presentation,
            legacy_text_heuristics: self.interpreter.config().legacy_text_heuristics,
        })
    }

    /// 生成快照
    ///
    /// 当前帧按揭示游标分成已展示 / 未展示两段保存，
    /// 揭示中途存档也能在读档后从同一段继续。
    pub fn snapshot(&self) -> EngineResult<SessionSnapshot> {
        self.ensure_open()?;
        let runtime_state = self.runtime.serialize_state()?;
        let (materialized, pending) = match &self.frame {
            Some(frame) => {
                let displayed = self.scheduler.cursor().displayed_count.min(frame.paragraphs.len());
                let (shown, rest) = frame.paragraphs.split_at(displayed);
                (shown.to_vec(), rest.to_vec())
            }
            None => (Vec::new(), Vec::new()),
        };

        Ok(SessionSnapshot::new(runtime_state, materialized)
            .with_pending(pending)
            .with_presentation(self.presentation.clone()))
    }

    /// 有未保存的变化时写入存储
    ///
    /// 帧切换与揭示完成都会标记为待保存。返回是否真的写入了。
    pub fn persist_if_needed(&mut self, store: &mut dyn SnapshotStore, key: &str) -> EngineResult<bool> {
        if !self.dirty || !self.is_live() {
            return Ok(false);
        }
        let snapshot = self.snapshot()?;
        store.put(key, &snapshot)?;
        self.dirty = false;
        debug!(
            key = %key,
            revealed = snapshot.materialized_paragraphs.len(),
            pending = snapshot.pending_paragraphs.len(),
            "快照已保存"
        );
        Ok(true)
    }

    /// 关闭会话
    ///
    /// 取消揭示计时器与审讯倒计时，清空发件箱；之后不会再产生任何副作用。
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.scheduler.cancel();
        self.outbox.clear();
        self.presentation.vision_remaining = None;
        self.countdown_carry = Duration::ZERO;
        info!("会话已关闭");
    }

    /// 距离下一个计时器触发还有多久
    ///
    /// 没有任何待触发的计时器时返回 `None`，宿主可以一直等待输入。
    pub fn next_wakeup(&self) -> Option<Duration> {
        if !self.is_live() {
            return None;
        }
        let countdown = self
            .presentation
            .interrogation
            .as_ref()
            .filter(|i| !i.is_time_up())
            .map(|_| ONE_SECOND.saturating_sub(self.countdown_carry));

        [
            self.scheduler.time_until_next(),
            self.presentation.vision_remaining,
            countdown,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// 当前状态
    pub fn status(&self) -> SessionStatus {
        if let Some(message) = &self.failure {
            return SessionStatus::Failed {
                message: message.clone(),
            };
        }
        if self.closed {
            return SessionStatus::Ended;
        }
        let Some(frame) = &self.frame else {
            return SessionStatus::Idle;
        };
        if self.scheduler.is_revealing() {
            SessionStatus::Revealing
        } else if !frame.choices.is_empty() {
            SessionStatus::AwaitingChoice
        } else if frame.is_end {
            SessionStatus::Ended
        } else {
            SessionStatus::AwaitingTap
        }
    }

    /// 宿主通知场景图已加载
    pub fn mark_image_loaded(&mut self) {
        self.presentation.mark_image_loaded();
    }

    /// 当前帧的变量快照
    pub fn variables(&self) -> Option<&BTreeMap<String, VarValue>> {
        self.frame.as_ref().map(|f| &f.variables)
    }

    pub fn presentation(&self) -> &PresentationState {
        &self.presentation
    }

    pub fn cursor(&self) -> RevealCursor {
        self.scheduler.cursor()
    }

    pub fn backlog(&self) -> &Backlog {
        &self.backlog
    }

    pub fn config(&self) -> &EngineConfig {
        self.interpreter.config()
    }

    /// 是否有未保存的变化
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    // ---- 内部 ----

    fn ensure_open(&self) -> EngineResult<()> {
        if self.closed {
            Err(EngineError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn is_live(&self) -> bool {
        !self.closed && self.failure.is_none()
    }

    fn reset_playback(&mut self) {
        self.presentation = initial_presentation(self.interpreter.config());
        self.scheduler = RevealScheduler::new();
        self.frame = None;
        self.stamps.clear();
        self.backlog.clear();
        self.outbox.clear();
        self.countdown_carry = Duration::ZERO;
        self.failure = None;
        self.dirty = false;
    }

    fn fail(&mut self, error: EngineError) -> EngineError {
        warn!(error = %error, "会话无法继续");
        self.failure = Some(error.to_string());
        self.scheduler.cancel();
        error
    }

    fn enter_frame(&mut self, frame: StoryFrame) {
        debug!(
            paragraphs = frame.paragraphs.len(),
            choices = frame.choices.len(),
            is_end = frame.is_end,
            "开始新的一帧"
        );
        self.scheduler.begin_frame(&frame.paragraphs);
        self.stamps.clear();
        self.frame = Some(frame);
        self.dirty = true;
    }

    /// 展示第 `index` 段：应用标签、推进故事时钟、写入回看
    fn disclose(&mut self, index: usize) {
        let Some(paragraph) = self.frame.as_ref().and_then(|f| f.paragraphs.get(index)) else {
            return;
        };
        let speaker = paragraph.speaker().map(str::to_string);
        let text = paragraph.text.clone();
        let tags = paragraph.tags.clone();

        let chapter_before = self.presentation.chapter;
        let effects = self.interpreter.apply(&mut self.presentation, &tags);
        self.outbox.extend(effects);

        if self.presentation.chapter != chapter_before {
            self.backlog.push(BacklogEntry::ChapterMark {
                chapter: self.presentation.chapter,
                title: self.presentation.title.clone(),
                at: self.presentation.clock,
            });
        }

        if speaker.is_some() {
            let step = self.interpreter.config().clock_step_minutes;
            self.presentation.clock.advance(step);
        }
        let at = self.presentation.clock;
        self.stamps.push(at);
        self.backlog.push(BacklogEntry::Paragraph { speaker, text, at });
    }

    fn on_reveal_finished(&mut self) {
        self.dirty = true;
        debug!(status = ?self.status(), "本帧揭示完成");
    }

    fn tick_countdown(&mut self, dt: Duration) {
        let Some(interrogation) = &mut self.presentation.interrogation else {
            self.countdown_carry = Duration::ZERO;
            return;
        };
        if interrogation.is_time_up() {
            return;
        }

        self.countdown_carry += dt;
        while self.countdown_carry >= ONE_SECOND {
            self.countdown_carry -= ONE_SECOND;
            if interrogation.tick_second() {
                info!(subject = %interrogation.subject_id, "审讯时间耗尽");
                self.outbox.push(Effect::InterrogationTimeUp {
                    subject_id: interrogation.subject_id.clone(),
                });
                self.countdown_carry = Duration::ZERO;
                break;
            }
        }
    }
}

fn initial_presentation(config: &EngineConfig) -> PresentationState {
    PresentationState {
        clock: StoryClock::new(config.clock_start_minutes),
        ..Default::default()
    }
}
