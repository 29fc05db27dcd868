use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timeouts and limits for one audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditConfig {
    /// Bound on waiting for `document.readyState == "complete"`.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    /// Bound on waiting for a link's new tab to appear.
    #[serde(default = "default_new_tab_timeout_ms")]
    pub new_tab_timeout_ms: u64,
    /// Pause before each capture and before banner detection, for late cookies
    /// and banners.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_sample_link_limit")]
    pub sample_link_limit: usize,
}

fn default_load_timeout_ms() -> u64 {
    10_000
}
fn default_new_tab_timeout_ms() -> u64 {
    3_000
}
fn default_settle_delay_ms() -> u64 {
    2_000
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_sample_link_limit() -> usize {
    3
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            load_timeout_ms: default_load_timeout_ms(),
            new_tab_timeout_ms: default_new_tab_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            sample_link_limit: default_sample_link_limit(),
        }
    }
}

impl AuditConfig {
    /// No settle pauses and short waits; for replayed sites and tests.
    pub fn instant() -> Self {
        Self {
            load_timeout_ms: 200,
            new_tab_timeout_ms: 200,
            settle_delay_ms: 0,
            poll_interval_ms: 10,
            ..Self::default()
        }
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn new_tab_timeout(&self) -> Duration {
        Duration::from_millis(self.new_tab_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_empty_yaml() {
        let cfg: AuditConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, AuditConfig::default());
        assert_eq!(cfg.load_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.new_tab_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.sample_link_limit, 3);
    }

    #[test]
    fn partial_override() {
        let cfg: AuditConfig =
            serde_yaml::from_str("settle_delay_ms: 0\nsample_link_limit: 5\n").unwrap();
        assert_eq!(cfg.settle_delay(), Duration::ZERO);
        assert_eq!(cfg.sample_link_limit, 5);
        assert_eq!(cfg.load_timeout_ms, 10_000);
    }

    #[test]
    fn poll_interval_never_zero() {
        let cfg = AuditConfig {
            poll_interval_ms: 0,
            ..AuditConfig::default()
        };
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
    }
}
