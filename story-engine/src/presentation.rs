//! # Presentation 模块
//!
//! 由标签驱动的展示状态。
//!
//! 只有 [`TagInterpreter`](crate::interpreter::TagInterpreter) 会修改它；
//! 宿主通过 [`Projection`](crate::projection::Projection) 只读访问。

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

use crate::clock::StoryClock;
use crate::effect::HapticKind;
use crate::interrogation::InterrogationState;

/// 情绪基调
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Normal,
    Horror,
    Pressure,
    Tense,
    Conflict,
    Discovery,
    Hope,
    Mystery,
    Melancholy,
    Calm,
}

impl Mood {
    /// 情绪切换时对应的震动类别
    pub fn haptic(&self) -> Option<HapticKind> {
        match self {
            Self::Horror | Self::Pressure => Some(HapticKind::Suspense),
            Self::Tense | Self::Conflict => Some(HapticKind::Dramatic),
            Self::Discovery | Self::Hope => Some(HapticKind::Insight),
            _ => None,
        }
    }

    /// 标签中使用的 ID
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Horror => "horror",
            Self::Pressure => "pressure",
            Self::Tense => "tense",
            Self::Conflict => "conflict",
            Self::Discovery => "discovery",
            Self::Hope => "hope",
            Self::Mystery => "mystery",
            Self::Melancholy => "melancholy",
            Self::Calm => "calm",
        }
    }
}

impl FromStr for Mood {
    type Err = ();

    /// 从标签值解析（不区分大小写）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "horror" => Ok(Self::Horror),
            "pressure" => Ok(Self::Pressure),
            "tense" => Ok(Self::Tense),
            "conflict" => Ok(Self::Conflict),
            "discovery" => Ok(Self::Discovery),
            "hope" => Ok(Self::Hope),
            "mystery" => Ok(Self::Mystery),
            "melancholy" => Ok(Self::Melancholy),
            "calm" => Ok(Self::Calm),
            _ => Err(()),
        }
    }
}

/// 场景图布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageLayout {
    #[default]
    Top,
    Background,
    Inline,
}

impl FromStr for ImageLayout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "background" => Ok(Self::Background),
            "inline" => Ok(Self::Inline),
            _ => Err(()),
        }
    }
}

/// 展示模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Normal,
    Interrogation,
}

/// 场景图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneImage {
    /// 解析后的资源路径
    pub path: String,
    /// 宿主是否已加载完成
    #[serde(default)]
    pub loaded: bool,
}

/// 展示状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationState {
    pub mood: Mood,
    /// 章节号（>= 1）
    pub chapter: u32,
    pub title: String,
    pub scene_image: Option<SceneImage>,
    pub image_layout: ImageLayout,
    /// 审讯状态；`Some` 即处于审讯模式
    pub interrogation: Option<InterrogationState>,
    /// 故事时钟（仅展示用）
    pub clock: StoryClock,
    /// 幻视效果剩余时间；不进存档
    #[serde(skip)]
    pub vision_remaining: Option<Duration>,
}

impl Default for PresentationState {
    fn default() -> Self {
        Self {
            mood: Mood::Normal,
            chapter: 1,
            title: String::new(),
            scene_image: None,
            image_layout: ImageLayout::default(),
            interrogation: None,
            clock: StoryClock::new(22 * 60),
            vision_remaining: None,
        }
    }
}

impl PresentationState {
    /// 当前模式
    pub fn mode(&self) -> Mode {
        if self.interrogation.is_some() {
            Mode::Interrogation
        } else {
            Mode::Normal
        }
    }

    /// 幻视效果是否生效
    pub fn vision_active(&self) -> bool {
        self.vision_remaining.is_some()
    }

    /// 宿主通知场景图已加载
    pub fn mark_image_loaded(&mut self) {
        if let Some(image) = &mut self.scene_image {
            image.loaded = true;
        }
    }
}
