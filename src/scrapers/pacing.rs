use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Randomized pause between consecutive search page requests.
///
/// Not a retry backoff: it runs after every page except the last, whether or
/// not the previous request went well.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    config: PacingConfig,
}

impl Pacer {
    pub fn new(config: PacingConfig) -> Self {
        Self { config }
    }

    /// Uniform sample from `[min, max]`
    pub fn next_delay(&self) -> Duration {
        let PacingConfig { min, max } = self.config;
        if min == max {
            return min;
        }
        rand::thread_rng().gen_range(min..=max)
    }

    /// Sleep for one sampled delay. Returns `false` if `cancel` fired first.
    pub async fn pause(&self, cancel: &CancellationToken) -> bool {
        let delay = self.next_delay();
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }

        debug!("Pausing {:?} before next page", delay);
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}
