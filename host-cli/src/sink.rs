//! # Sink 模块
//!
//! 终端宿主的副作用接收端：没有震动马达和扬声器，效果以文本提示输出，同时写入日志。

use std::io::Write;

use story_engine::{AudioCue, Effect, EffectSink, TagValue};
use tracing::{debug, warn};

/// 把效果写成一行终端提示
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EffectSink for ConsoleSink<W> {
    fn dispatch(&mut self, effect: &Effect) {
        debug!(effect = ?effect, "分发效果");
        if let Err(e) = writeln!(self.out, "{}", describe(effect)) {
            warn!(error = %e, "效果提示写入失败");
        }
    }
}

/// 效果的文本描述
pub fn describe(effect: &Effect) -> String {
    match effect {
        Effect::Haptic(kind) => format!("  ~ 震动: {}", kind.as_str()),
        Effect::Audio(AudioCue::PlaySfx { id }) => format!("  ♪ 音效: {id}"),
        Effect::Audio(AudioCue::PlayMusic { id }) => format!("  ♫ 音乐: {id}"),
        Effect::Audio(AudioCue::StopMusic) => "  ♫ 音乐停止".to_string(),
        Effect::TagObserved { key, value } => match value {
            TagValue::Text(value) => format!("  # {key}: {value}"),
            TagValue::Present => format!("  # {key}"),
        },
        Effect::InterrogationTimeUp { subject_id } => format!("  ! 审讯时间耗尽: {subject_id}"),
    }
}
