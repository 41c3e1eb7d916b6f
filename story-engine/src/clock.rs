//! # Clock 模块
//!
//! 会话级的故事时钟，只用于展示（聊天气泡上的 `22:14` 之类）。
//!
//! 每个 Session 各持一份，不存在进程级的全局计数器，
//! 多个会话可以并行测试互不干扰。

use serde::{Deserialize, Serialize};
use std::fmt;

const MINUTES_PER_DAY: u32 = 24 * 60;

/// 故事时钟
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryClock {
    /// 当日分钟数（0..1440）
    minutes: u32,
}

impl StoryClock {
    /// 从当日分钟数创建（超出一天的部分回绕）
    pub fn new(minutes: u32) -> Self {
        Self {
            minutes: minutes % MINUTES_PER_DAY,
        }
    }

    /// 解析 `HH:MM`
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.trim().split_once(':')?;
        let h: u32 = h.parse().ok()?;
        let m: u32 = m.parse().ok()?;
        if h >= 24 || m >= 60 {
            return None;
        }
        Some(Self::new(h * 60 + m))
    }

    /// 当日分钟数
    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// 前进若干分钟
    pub fn advance(&mut self, minutes: u32) {
        self.minutes = (self.minutes + minutes % MINUTES_PER_DAY) % MINUTES_PER_DAY;
    }
}

impl fmt::Display for StoryClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let clock = StoryClock::parse("07:05").unwrap();
        assert_eq!(clock.minutes(), 425);
        assert_eq!(clock.to_string(), "07:05");

        assert!(StoryClock::parse("24:00").is_none());
        assert!(StoryClock::parse("9pm").is_none());
    }

    #[test]
    fn test_advance_wraps_midnight() {
        let mut clock = StoryClock::parse("23:59").unwrap();
        clock.advance(2);
        assert_eq!(clock.to_string(), "00:01");
    }

    #[test]
    fn test_clocks_are_independent() {
        let mut a = StoryClock::new(600);
        let b = StoryClock::new(600);
        a.advance(5);
        assert_eq!(a.to_string(), "10:05");
        assert_eq!(b.to_string(), "10:00");
    }
}
