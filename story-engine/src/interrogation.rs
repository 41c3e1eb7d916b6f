//! # Interrogation 模块
//!
//! 审讯子状态机。
//!
//! ## 状态转换
//!
//! ```text
//! Inactive ──mode:interrogation──► Active ──mode:normal / end_interrogation──► Inactive
//! ```
//!
//! - 进入与退出只由标签驱动
//! - 倒计时归零只触发一次 `InterrogationTimeUp`，**不会**自动退出；
//!   由故事运行时在下一帧给出 `end_interrogation`
//! - 退出时状态整体丢弃，不保留历史
//!
//! `Inactive` 在上层表现为 `Option<InterrogationState>` 的 `None`。

use serde::{Deserialize, Serialize};

use crate::tag::{self, Tag};

/// 未给出 `timer:<seconds>` 时的默认时限（秒）
pub const DEFAULT_TIME_BUDGET_SECS: u32 = 300;

/// 未给出 `suspect:<id>` 时的嫌疑人 ID
pub const UNKNOWN_SUBJECT: &str = "unknown";

/// 压力上限
pub const MAX_PRESSURE: u8 = 100;

/// `contradiction` 标记带来的压力增量
pub const CONTRADICTION_PRESSURE: i32 = 15;

/// `stonewall` 标记带来的压力变化
pub const STONEWALL_PRESSURE: i32 = -10;

/// 战术提示
///
/// 由 `(pressure, time_budget_seconds)` 纯函数推导，规则按优先级排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TacticalHint {
    /// 时间已耗尽
    TimeUp,
    /// 压力接近顶点，逼供
    PushForConfession,
    /// 时间不多
    RunningOut,
    /// 利用矛盾施压
    PressContradictions,
    /// 继续追问
    KeepProbing,
    /// 建立信任
    BuildRapport,
}

impl TacticalHint {
    /// 推导提示
    pub fn derive(pressure: u8, time_budget_seconds: u32) -> Self {
        if time_budget_seconds == 0 {
            Self::TimeUp
        } else if pressure >= 80 {
            Self::PushForConfession
        } else if time_budget_seconds <= 30 {
            Self::RunningOut
        } else if pressure >= 50 {
            Self::PressContradictions
        } else if pressure >= 20 {
            Self::KeepProbing
        } else {
            Self::BuildRapport
        }
    }

    /// 提示文本
    pub fn text(&self) -> &'static str {
        match self {
            Self::TimeUp => "时间到了，对方不会再开口。",
            Self::PushForConfession => "对方快撑不住了，现在逼他认罪。",
            Self::RunningOut => "时间所剩无几，直接亮出最有力的证据。",
            Self::PressContradictions => "抓住证词里的矛盾继续施压。",
            Self::KeepProbing => "对方开始紧张，继续追问细节。",
            Self::BuildRapport => "先放松对方的戒心，建立信任。",
        }
    }
}

/// 审讯状态（只在审讯模式下存在）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterrogationState {
    /// 嫌疑人 ID
    pub subject_id: String,
    /// 嫌疑人显示名
    pub subject_name: String,
    /// 压力值（0..=100）
    pressure: u8,
    /// 剩余时间（秒）
    time_budget_seconds: u32,
}

impl InterrogationState {
    /// 根据触发段落的标签进入审讯
    ///
    /// - `suspect:<id>` 缺省为 `"unknown"`
    /// - `suspect_name:<name>` 缺省为 ID
    /// - `timer:<seconds>` 缺省或格式错误时为 300
    pub fn enter(tags: &[Tag]) -> Self {
        let subject_id = tag::value_of(tags, "suspect")
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SUBJECT)
            .to_string();
        let subject_name = tag::value_of(tags, "suspect_name")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| subject_id.clone());
        let time_budget_seconds = tag::value_of(tags, "timer")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_TIME_BUDGET_SECS);

        Self {
            subject_id,
            subject_name,
            pressure: 0,
            time_budget_seconds,
        }
    }

    /// 当前压力
    pub fn pressure(&self) -> u8 {
        self.pressure
    }

    /// 剩余时间（秒）
    pub fn time_budget_seconds(&self) -> u32 {
        self.time_budget_seconds
    }

    /// 当前战术提示
    pub fn tactical_hint(&self) -> TacticalHint {
        TacticalHint::derive(self.pressure, self.time_budget_seconds)
    }

    /// 是否已经超时
    pub fn is_time_up(&self) -> bool {
        self.time_budget_seconds == 0
    }

    /// 按增量调整压力，结果夹在 0..=100
    pub fn adjust_pressure(&mut self, delta: i32) {
        let next = (self.pressure as i32).saturating_add(delta);
        self.pressure = next.clamp(0, MAX_PRESSURE as i32) as u8;
    }

    /// 直接设置压力，结果夹在 0..=100
    pub fn set_pressure(&mut self, value: i32) {
        self.pressure = value.clamp(0, MAX_PRESSURE as i32) as u8;
    }

    /// 应用审讯词汇表中的标签
    ///
    /// - `pressure:+N` / `pressure:-N`：增量
    /// - `pressure:N`：绝对值
    /// - `contradiction` / `stonewall`：固定增量
    /// - `suspect_name:<name>`：更新显示名
    ///
    /// 格式错误的数值被忽略。
    pub fn apply_tags(&mut self, tags: &[Tag]) {
        for t in tags {
            match t {
                Tag::Pair { key, value } if key == "pressure" => {
                    let relative = value.starts_with('+') || value.starts_with('-');
                    match (relative, value.parse::<i32>()) {
                        (true, Ok(delta)) => self.adjust_pressure(delta),
                        (false, Ok(absolute)) => self.set_pressure(absolute),
                        (_, Err(_)) => {}
                    }
                }
                Tag::Pair { key, value } if key == "suspect_name" => {
                    if !value.is_empty() {
                        self.subject_name = value.clone();
                    }
                }
                Tag::Flag(name) if name == "contradiction" => {
                    self.adjust_pressure(CONTRADICTION_PRESSURE);
                }
                Tag::Flag(name) if name == "stonewall" => {
                    self.adjust_pressure(STONEWALL_PRESSURE);
                }
                _ => {}
            }
        }
    }

    /// 倒计时走一秒
    ///
    /// 返回 `true` 表示这一秒恰好让时间归零；归零之后再调用不会再返回 `true`。
    pub fn tick_second(&mut self) -> bool {
        if self.time_budget_seconds == 0 {
            return false;
        }
        self.time_budget_seconds -= 1;
        self.time_budget_seconds == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_defaults() {
        let state = InterrogationState::enter(&Tag::parse_all(["mode:interrogation", "timer:120"]));
        assert_eq!(state.subject_id, "unknown");
        assert_eq!(state.subject_name, "unknown");
        assert_eq!(state.pressure(), 0);
        assert_eq!(state.time_budget_seconds(), 120);
    }

    #[test]
    fn test_enter_malformed_timer_falls_back() {
        let state = InterrogationState::enter(&Tag::parse_all([
            "mode:interrogation",
            "timer:soon",
            "suspect:gromov",
            "suspect_name:Громов",
        ]));
        assert_eq!(state.time_budget_seconds(), DEFAULT_TIME_BUDGET_SECS);
        assert_eq!(state.subject_id, "gromov");
        assert_eq!(state.subject_name, "Громов");
    }

    #[test]
    fn test_pressure_clamped() {
        let mut state = InterrogationState::enter(&[]);
        state.adjust_pressure(-30);
        assert_eq!(state.pressure(), 0);
        state.adjust_pressure(250);
        assert_eq!(state.pressure(), 100);
        state.set_pressure(-7);
        assert_eq!(state.pressure(), 0);
    }

    #[test]
    fn test_apply_vocabulary() {
        let mut state = InterrogationState::enter(&[]);
        state.apply_tags(&Tag::parse_all(["pressure:+30"]));
        assert_eq!(state.pressure(), 30);
        state.apply_tags(&Tag::parse_all(["pressure:-5", "contradiction"]));
        assert_eq!(state.pressure(), 40);
        state.apply_tags(&Tag::parse_all(["stonewall"]));
        assert_eq!(state.pressure(), 30);
        state.apply_tags(&Tag::parse_all(["pressure:90"]));
        assert_eq!(state.pressure(), 90);

        // 格式错误与词汇表以外的标签都被忽略
        state.apply_tags(&Tag::parse_all(["pressure:lots", "clue"]));
        assert_eq!(state.pressure(), 90);

        state.apply_tags(&Tag::parse_all(["suspect_name:Громов"]));
        assert_eq!(state.subject_name, "Громов");
    }

    #[test]
    fn test_hint_is_pure_and_ordered() {
        assert_eq!(TacticalHint::derive(0, 300), TacticalHint::BuildRapport);
        assert_eq!(TacticalHint::derive(20, 300), TacticalHint::KeepProbing);
        assert_eq!(TacticalHint::derive(50, 300), TacticalHint::PressContradictions);
        assert_eq!(TacticalHint::derive(50, 30), TacticalHint::RunningOut);
        assert_eq!(TacticalHint::derive(80, 30), TacticalHint::PushForConfession);
        assert_eq!(TacticalHint::derive(100, 0), TacticalHint::TimeUp);
        // 相同输入总是相同输出
        assert_eq!(TacticalHint::derive(42, 77), TacticalHint::derive(42, 77));
    }

    #[test]
    fn test_hint_follows_state() {
        let mut state = InterrogationState::enter(&Tag::parse_all(["timer:40"]));
        assert_eq!(state.tactical_hint(), TacticalHint::BuildRapport);
        state.adjust_pressure(55);
        assert_eq!(state.tactical_hint(), TacticalHint::PressContradictions);
        for _ in 0..10 {
            state.tick_second();
        }
        assert_eq!(state.tactical_hint(), TacticalHint::RunningOut);
    }

    #[test]
    fn test_time_up_fires_once() {
        let mut state = InterrogationState::enter(&Tag::parse_all(["timer:2"]));
        assert!(!state.tick_second());
        assert!(state.tick_second());
        assert!(state.is_time_up());
        assert!(!state.tick_second());
        assert_eq!(state.time_budget_seconds(), 0);
    }
}
