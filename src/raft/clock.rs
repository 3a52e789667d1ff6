use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use super::ElectionConfig;

/// Draws randomized election deadlines so nodes rarely time out together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElectionClock {
    min: Duration,
    max: Duration,
}

impl ElectionClock {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub fn from_config(config: &ElectionConfig) -> Self {
        Self::new(config.timeout_min, config.timeout_max)
    }

    pub fn generate_deadline(&self) -> Instant {
        self.deadline_from(Instant::now())
    }

    pub fn deadline_from(&self, now: Instant) -> Instant {
        now + self.random_timeout()
    }

    pub fn random_timeout(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        rand::rng().random_range(self.min..=self.max)
    }
}
