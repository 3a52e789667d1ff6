use std::time::Duration;

use super::RaftError;

/// Timing knobs shared by every node of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectionConfig {
    pub timeout_min: Duration,
    pub timeout_max: Duration,
    pub heartbeat_interval: Duration,
    pub poll_interval: Duration,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            timeout_min: Duration::from_millis(150),
            timeout_max: Duration::from_millis(300),
            heartbeat_interval: Duration::from_millis(100),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ElectionConfig {
    pub fn new(timeout_min: Duration, timeout_max: Duration, heartbeat_interval: Duration) -> Self {
        Self {
            timeout_min,
            timeout_max,
            heartbeat_interval,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Rejects ranges that would break heartbeat suppression or make the
    /// background loops spin.
    pub fn validate(&self) -> Result<(), RaftError> {
        if self.timeout_min.is_zero() {
            return Err(RaftError::ZeroTimeout);
        }
        if self.timeout_min > self.timeout_max {
            return Err(RaftError::InvalidTimeoutRange {
                min: self.timeout_min,
                max: self.timeout_max,
            });
        }
        if self.heartbeat_interval.is_zero() {
            return Err(RaftError::ZeroHeartbeat);
        }
        if self.heartbeat_interval >= self.timeout_min {
            return Err(RaftError::HeartbeatTooSlow {
                heartbeat: self.heartbeat_interval,
                min: self.timeout_min,
            });
        }
        if self.poll_interval.is_zero() {
            return Err(RaftError::ZeroPollInterval);
        }
        Ok(())
    }
}
