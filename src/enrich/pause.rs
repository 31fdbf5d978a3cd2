use std::time::Duration;

use rand::{thread_rng, Rng};

/// Randomized human-scale delay between requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseRange {
    pub min: Duration,
    pub max: Duration,
}

impl PauseRange {
    pub const fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    pub const fn from_millis(min_ms: u64, max_ms: u64) -> Self {
        Self::new(Duration::from_millis(min_ms), Duration::from_millis(max_ms))
    }

    pub const fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.max.is_zero()
    }

    pub fn pick(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        thread_rng().gen_range(self.min..=self.max)
    }

    pub async fn sleep(&self) {
        if self.is_zero() {
            return;
        }
        tokio::time::sleep(self.pick()).await;
    }
}

impl Default for PauseRange {
    fn default() -> Self {
        Self::from_millis(1_500, 3_000)
    }
}
