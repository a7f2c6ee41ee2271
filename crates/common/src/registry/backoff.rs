//! Dial timeout and exponential backoff between connection attempts.

use std::time::Duration;

/// 拨号参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DialConfig {
    /// 整个拨号过程（含重试）的上限
    pub timeout: Duration,
    /// 首次重试前的等待
    pub initial_backoff: Duration,
    /// 单次等待的上限
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl DialConfig {
    /// Delay to wait after the given (1-based) failed attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay_millis = (self.initial_backoff.as_millis() as f64 * factor) as u64;
        Duration::from_millis(delay_millis).min(self.max_backoff)
    }
}
