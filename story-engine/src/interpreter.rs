//! # Interpreter 模块
//!
//! 标签解释器：把段落标签翻译成展示状态 / 审讯状态的变更和副作用请求。
//!
//! ## 幂等性
//!
//! - 情绪、章节、标题、场景图是"设置"语义，重复应用结果不变
//! - 震动等效果每次应用都会发出；调用方（揭示调度器）保证每个段落的标签
//!   只应用一次：要么在揭示时，要么在跳过时，不会两次都应用
//!
//! ## 容错
//!
//! 未知标签原样转交观察者；格式错误的数字（`chapter`、`timer`）回退到默认行为。
//! 这里永远不返回错误。

use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::clock::StoryClock;
use crate::config::EngineConfig;
use crate::effect::{AudioCue, Effect, HapticKind};
use crate::interrogation::InterrogationState;
use crate::presentation::{ImageLayout, Mood, PresentationState, SceneImage};
use crate::tag::Tag;

/// `type:vision` 的持续时间
pub const VISION_DURATION: Duration = Duration::from_secs(8);

/// 引擎识别的键（键值对）
pub(crate) const KNOWN_KEYS: &[&str] = &[
    "mood",
    "chapter",
    "title",
    "image",
    "image_position",
    "type",
    "mode",
    "speaker",
    "suspect",
    "suspect_name",
    "timer",
    "pressure",
    "sfx",
    "music",
    "time",
];

/// 引擎识别的裸标记
pub(crate) const KNOWN_FLAGS: &[&str] = &[
    "clear_image",
    "clue",
    "suspect_revealed",
    "new_suspect",
    "important",
    "revelation",
    "warning",
    "danger",
    "end_interrogation",
    "stop_music",
    "contradiction",
    "stonewall",
];

/// `type:<variant>` 的可选值
pub(crate) const KNOWN_TYPES: &[&str] = &["vision", "document", "system", "date", "narration"];

/// 标签解释器
#[derive(Debug, Clone, Default)]
pub struct TagInterpreter {
    config: EngineConfig,
}

impl TagInterpreter {
    /// 创建解释器
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// 解释器配置
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 应用一个段落（或故事级）的标签
    ///
    /// 按标签顺序处理；审讯词汇表只在进入本段落之前就已处于审讯模式时生效，
    /// 触发进入审讯的段落本身只用于读取 `suspect` / `timer`。
    pub fn apply(&self, state: &mut PresentationState, tags: &[Tag]) -> Vec<Effect> {
        let mut effects = Vec::new();
        let was_interrogating = state.interrogation.is_some();

        for tag in tags {
            match tag {
                Tag::Pair { key, value } => self.apply_pair(state, tags, tag, key, value, &mut effects),
                Tag::Flag(name) => self.apply_flag(state, tag, name, &mut effects),
            }
        }

        if was_interrogating && let Some(interrogation) = &mut state.interrogation {
            interrogation.apply_tags(tags);
        }

        effects
    }

    fn apply_pair(
        &self,
        state: &mut PresentationState,
        tags: &[Tag],
        tag: &Tag,
        key: &str,
        value: &str,
        effects: &mut Vec<Effect>,
    ) {
        match key {
            "mood" => match Mood::from_str(value) {
                Ok(mood) => {
                    if mood != state.mood {
                        state.mood = mood;
                        if let Some(kind) = mood.haptic() {
                            effects.push(Effect::Haptic(kind));
                        }
                    }
                }
                Err(()) => {
                    debug!(mood = %value, "未知情绪，转交观察者");
                    effects.push(observed(tag));
                }
            },
            "chapter" => match value.parse::<u32>() {
                Ok(chapter) if chapter >= 1 => {
                    if chapter != state.chapter {
                        state.chapter = chapter;
                        effects.push(Effect::Haptic(HapticKind::SceneTransition));
                    }
                }
                _ => debug!(chapter = %value, "章节号无效，保持不变"),
            },
            "title" => state.title = value.to_string(),
            "image" => {
                if value.is_empty() {
                    debug!("空的 image 标签，忽略");
                    return;
                }
                state.scene_image = Some(SceneImage {
                    path: self.config.resolve_image(value),
                    loaded: false,
                });
                effects.push(Effect::Haptic(HapticKind::SceneTransition));
            }
            "image_position" => match ImageLayout::from_str(value) {
                Ok(layout) => state.image_layout = layout,
                Err(()) => debug!(layout = %value, "未知图片布局，保持不变"),
            },
            "type" => {
                if value == "vision" {
                    state.vision_remaining = Some(VISION_DURATION);
                    effects.push(Effect::Haptic(HapticKind::Dramatic));
                } else if !KNOWN_TYPES.contains(&value) {
                    effects.push(observed(tag));
                }
            }
            "mode" => match value {
                "interrogation" => {
                    if state.interrogation.is_none() {
                        let entered = InterrogationState::enter(tags);
                        debug!(
                            subject = %entered.subject_id,
                            seconds = entered.time_budget_seconds(),
                            "进入审讯"
                        );
                        effects.push(Effect::Haptic(HapticKind::Dramatic));
                        // 时限为 0 时倒计时不会再走，只能在进入时报告
                        if entered.is_time_up() {
                            effects.push(Effect::InterrogationTimeUp {
                                subject_id: entered.subject_id.clone(),
                            });
                        }
                        state.interrogation = Some(entered);
                    }
                }
                "normal" => exit_interrogation(state),
                _ => effects.push(observed(tag)),
            },
            "sfx" => effects.push(Effect::Audio(AudioCue::PlaySfx {
                id: value.to_string(),
            })),
            "music" => {
                let cue = match value {
                    "stop" | "none" => AudioCue::StopMusic,
                    id => AudioCue::PlayMusic { id: id.to_string() },
                };
                effects.push(Effect::Audio(cue));
            }
            "time" => match StoryClock::parse(value) {
                Some(clock) => state.clock = clock,
                None => debug!(time = %value, "故事时间格式无效，保持不变"),
            },
            // 由调度器/分类器或审讯状态机读取
            "speaker" | "suspect" | "suspect_name" | "timer" | "pressure" => {}
            _ => effects.push(observed(tag)),
        }
    }

    fn apply_flag(
        &self,
        state: &mut PresentationState,
        tag: &Tag,
        name: &str,
        effects: &mut Vec<Effect>,
    ) {
        match name {
            "clear_image" => state.scene_image = None,
            "clue" => effects.push(Effect::Haptic(HapticKind::ClueDiscovered)),
            "suspect_revealed" | "new_suspect" => {
                effects.push(Effect::Haptic(HapticKind::SuspectRevealed))
            }
            "important" | "revelation" => effects.push(Effect::Haptic(HapticKind::Dramatic)),
            "warning" | "danger" => effects.push(Effect::Haptic(HapticKind::TimerWarning)),
            "end_interrogation" => exit_interrogation(state),
            "stop_music" => effects.push(Effect::Audio(AudioCue::StopMusic)),
            "contradiction" | "stonewall" => {}
            _ => effects.push(observed(tag)),
        }
    }
}

fn exit_interrogation(state: &mut PresentationState) {
    if let Some(finished) = state.interrogation.take() {
        debug!(
            subject = %finished.subject_id,
            pressure = finished.pressure(),
            "退出审讯"
        );
    }
}

fn observed(tag: &Tag) -> Effect {
    Effect::TagObserved {
        key: tag.key().to_string(),
        value: tag.observed_value(),
    }
}
