//! # Story Engine
//!
//! 互动小说的叙事播放引擎。
//!
//! ## 架构概述
//!
//! `story-engine` 是纯逻辑核心，不做 IO，也不读真实时钟。
//! 故事本身由外部 VM 执行（实现 [`StoryRuntime`]），引擎只负责"怎么播放"：
//!
//! ```text
//! StoryRuntime ──StoryFrame──► Session ──Effect──► Host（震动 / 音频 / 观察者）
//!                                 │
//!                                 └──Projection──► Host（渲染）
//! ```
//!
//! 宿主通过 **时间驱动模式** 与会话通信：
//!
//! ```ignore
//! use story_engine::{EngineConfig, Session};
//!
//! let mut session = Session::new(runtime, EngineConfig::default());
//! session.start()?;
//!
//! loop {
//!     let wait = session.next_wakeup();
//!     let input = host.wait_for_input(wait);   // 最多等 wait 这么久
//!     session.tick(host.elapsed());
//!
//!     for effect in session.drain_effects() {
//!         sink.dispatch(&effect);
//!     }
//!     host.render(&session.projection());
//!
//!     match input {
//!         Input::Tap => session.tap_to_continue()?,
//!         Input::Choose(i) => { session.choose(i)?; }
//!         Input::None => {}
//!     }
//!     session.persist_if_needed(&mut store, "autosave")?;
//! }
//! ```
//!
//! ## 模块结构
//!
//! - [`adapter`]：外部 VM 契约
//! - [`frame`] / [`tag`]：VM 产出的数据
//! - [`interpreter`]：标签解释器
//! - [`reveal`]：揭示调度器与阅读节奏
//! - [`interrogation`]：审讯子状态机
//! - [`persist`]：快照与存储
//! - [`session`]：把以上组件串起来的会话
//! - [`projection`]：宿主看到的只读视图
//! - [`classify`]：段落渲染变体分类
//! - [`diagnostic`]：标签静态检查

pub mod adapter;
pub mod backlog;
pub mod classify;
pub mod clock;
pub mod config;
pub mod diagnostic;
pub mod effect;
pub mod error;
pub mod frame;
pub mod interpreter;
pub mod interrogation;
pub mod persist;
pub mod presentation;
pub mod projection;
pub mod reveal;
pub mod session;
pub mod tag;

// 重导出核心类型
pub use adapter::StoryRuntime;
pub use backlog::{Backlog, BacklogEntry};
pub use classify::{RenderVariant, classify};
pub use clock::StoryClock;
pub use config::EngineConfig;
pub use diagnostic::{
    Diagnostic, DiagnosticLevel, DiagnosticResult, lint_choice_tags, lint_frame, lint_tags,
};
pub use effect::{AudioCue, Effect, EffectSink, HapticKind, RecordingSink, dispatch_all};
pub use error::{AdapterError, EngineError, EngineResult, PersistError};
pub use frame::{Choice, Paragraph, StoryFrame, VarValue};
pub use interpreter::{TagInterpreter, VISION_DURATION};
pub use interrogation::{DEFAULT_TIME_BUDGET_SECS, InterrogationState, TacticalHint};
pub use persist::{MemoryStore, SessionSnapshot, SnapshotStore, SnapshotVersion};
pub use presentation::{ImageLayout, Mode, Mood, PresentationState, SceneImage};
pub use projection::{ChoiceItem, ChoiceView, InterrogationView, Projection, VisibleParagraph};
pub use reveal::{RevealCursor, RevealScheduler, reading_delay};
pub use session::{ChooseOutcome, Session, SessionStatus};
pub use tag::{Tag, TagValue};
