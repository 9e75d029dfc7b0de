//! Pipeline tuning.

use std::time::Duration;

use bclip_models::{BarHeightPolicy, CompositeStrategy, EncodingConfig};

use crate::error::{MediaError, MediaResult};

/// Default wall-clock budget for the encoder pass.
pub const COMPOSE_TIMEOUT: Duration = Duration::from_secs(300);
/// Default wall-clock budget for the decode check.
pub const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);
/// Outputs smaller than this are treated as broken.
pub const MIN_OUTPUT_BYTES: u64 = 10 * 1024;
/// The decode check always covers at least this many seconds.
pub const MIN_VERIFY_WINDOW_SECS: f64 = 10.0;

/// Settings for the compositing pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub strategy: CompositeStrategy,
    pub bar_policy: BarHeightPolicy,
    pub encoding: EncodingConfig,
    pub compose_timeout: Duration,
    pub probe_timeout: Duration,
    pub verify_timeout: Duration,
    pub min_output_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: CompositeStrategy::default(),
            bar_policy: BarHeightPolicy::default(),
            encoding: EncodingConfig::default(),
            compose_timeout: COMPOSE_TIMEOUT,
            probe_timeout: crate::probe::PROBE_TIMEOUT,
            verify_timeout: VERIFY_TIMEOUT,
            min_output_bytes: MIN_OUTPUT_BYTES,
        }
    }
}

impl PipelineConfig {
    pub fn with_strategy(mut self, strategy: CompositeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_bar_policy(mut self, policy: BarHeightPolicy) -> Self {
        self.bar_policy = policy;
        self
    }

    /// Apply one timeout to every external invocation.
    pub fn with_uniform_timeout(mut self, timeout: Duration) -> Self {
        self.compose_timeout = timeout;
        self.probe_timeout = timeout;
        self.verify_timeout = timeout;
        self
    }

    pub fn validate(&self) -> MediaResult<()> {
        for (key, value) in [
            ("compose_timeout", self.compose_timeout),
            ("probe_timeout", self.probe_timeout),
            ("verify_timeout", self.verify_timeout),
        ] {
            if value.is_zero() {
                return Err(MediaError::InvalidConfig(format!("{key} must be positive")));
            }
        }
        if self.encoding.crf > 51 {
            return Err(MediaError::InvalidConfig(format!(
                "crf {} outside 0-51",
                self.encoding.crf
            )));
        }
        Ok(())
    }
}
