//! # Effect 模块
//!
//! 引擎向宿主发出的副作用请求。
//!
//! ## 设计说明
//!
//! - 引擎不直接调用震动、音频等设备，只把 [`Effect`] 放进发件箱
//! - 宿主调用 `Session::drain_effects()` 取走并分发到各个 [`EffectSink`]
//! - 所有效果都是"发出即忘"，引擎不观察返回值

use serde::{Deserialize, Serialize};

use crate::tag::TagValue;

/// 震动反馈类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HapticKind {
    /// 悬疑
    Suspense,
    /// 戏剧性
    Dramatic,
    /// 顿悟
    Insight,
    /// 场景切换
    SceneTransition,
    /// 发现线索
    ClueDiscovered,
    /// 嫌疑人登场
    SuspectRevealed,
    /// 倒计时警告
    TimerWarning,
}

impl HapticKind {
    /// 外部震动接口使用的类别名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suspense => "suspense",
            Self::Dramatic => "dramatic",
            Self::Insight => "insight",
            Self::SceneTransition => "scene_transition",
            Self::ClueDiscovered => "clue_discovered",
            Self::SuspectRevealed => "suspect_revealed",
            Self::TimerWarning => "timer_warning",
        }
    }
}

/// 音频指令
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioCue {
    /// 播放一次性音效
    PlaySfx { id: String },
    /// 播放循环音乐（替换当前音乐）
    PlayMusic { id: String },
    /// 停止音乐
    StopMusic,
}

/// 副作用请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// 震动反馈
    Haptic(HapticKind),
    /// 音频
    Audio(AudioCue),
    /// 未识别的标签，原样转交给观察者
    TagObserved { key: String, value: TagValue },
    /// 审讯倒计时归零
    InterrogationTimeUp { subject_id: String },
}

/// 副作用接收端
///
/// 宿主为每类设备实现一个 sink；不关心的效果直接忽略即可。
pub trait EffectSink {
    /// 处理一个效果
    fn dispatch(&mut self, effect: &Effect);
}

/// 把一批效果依次分发给 sink
pub fn dispatch_all(sink: &mut dyn EffectSink, effects: &[Effect]) {
    for effect in effects {
        sink.dispatch(effect);
    }
}

/// 收集型 sink，便于宿主做录制或测试断言
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub effects: Vec<Effect>,
}

impl EffectSink for RecordingSink {
    fn dispatch(&mut self, effect: &Effect) {
        self.effects.push(effect.clone());
    }
}

impl RecordingSink {
    /// 已收到的震动类别
    pub fn haptics(&self) -> Vec<HapticKind> {
        self.effects
            .iter()
            .filter_map(|e| match e {
                Effect::Haptic(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }
}
