use backon::{BackoffBuilder, ConstantBuilder, ExponentialBuilder};
use std::time::Duration;

/// Delay policy between reconnect attempts.
///
/// `builder(retries)` must yield at most `retries` delays; the initializer
/// relies on that to bound the number of attempts.
pub trait ReconnectBackoff: Send + Sync {
    type Builder: BackoffBuilder;

    fn builder(&self, retries: usize) -> Self::Builder;
}

/// Same delay before every retry. Defaults to one second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    pub delay: Duration,
}

impl FixedBackoff {
    pub const fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl ReconnectBackoff for FixedBackoff {
    type Builder = ConstantBuilder;

    fn builder(&self, retries: usize) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(retries)
    }
}

/// Doubling delay between `min_delay` and `max_delay`, optionally jittered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl ReconnectBackoff for ExponentialBackoff {
    type Builder = ExponentialBuilder;

    fn builder(&self, retries: usize) -> ExponentialBuilder {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(retries);
        if self.jitter {
            builder.with_jitter()
        } else {
            builder
        }
    }
}
