//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bclip_media::PipelineConfig;
use bclip_models::{BarHeightPolicy, CompositeStrategy, EncodingConfig};

use crate::error::{WorkerError, WorkerResult};

/// Where the overlay clip lives in the production image.
pub const PRODUCTION_OVERLAY_PATH: &str = "/app/assets/overlay.mp4";

/// Checked after the production path, for local runs.
const DEV_OVERLAY_PATHS: &[&str] = &["./assets/overlay.mp4", "../assets/overlay.mp4"];

/// Default upper bound on accepted input size.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 500_000_000;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for scratch and output directories
    pub work_dir: PathBuf,
    /// Operator-provisioned overlay clip
    pub overlay_path: PathBuf,
    /// Inputs larger than this are rejected
    pub max_input_bytes: u64,
    /// Accepted input extensions, lowercase
    pub allowed_extensions: Vec<String>,
    /// Explicit ffmpeg binary, otherwise located
    pub ffmpeg_path: Option<PathBuf>,
    /// Explicit ffprobe binary, otherwise located
    pub ffprobe_path: Option<PathBuf>,
    pub strategy: CompositeStrategy,
    pub bar_policy: BarHeightPolicy,
    pub crf: u8,
    pub preset: String,
    pub compose_timeout: Duration,
    pub probe_timeout: Duration,
    pub verify_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let encoding = EncodingConfig::default();
        Self {
            work_dir: PathBuf::from("downloads"),
            overlay_path: PathBuf::from(PRODUCTION_OVERLAY_PATH),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            allowed_extensions: vec!["mp4".to_string()],
            ffmpeg_path: None,
            ffprobe_path: None,
            strategy: CompositeStrategy::default(),
            bar_policy: BarHeightPolicy::default(),
            crf: encoding.crf,
            preset: encoding.preset,
            compose_timeout: Duration::from_secs(300),
            probe_timeout: Duration::from_secs(30),
            verify_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unparseable numeric values fall back to their defaults; unknown
    /// strategy or bar policy names are configuration errors.
    pub fn from_env() -> WorkerResult<Self> {
        let defaults = Self::default();

        let strategy = match env("BCLIP_STRATEGY") {
            Some(s) => s.parse::<CompositeStrategy>().map_err(WorkerError::config_error)?,
            None => defaults.strategy,
        };
        let bar_policy = match env("BCLIP_BAR_POLICY") {
            Some(s) => s.parse::<BarHeightPolicy>().map_err(WorkerError::config_error)?,
            None => defaults.bar_policy,
        };

        let config = Self {
            work_dir: env("BCLIP_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            overlay_path: resolve_overlay_path(env("BCLIP_OVERLAY_PATH").map(PathBuf::from)),
            max_input_bytes: parse_env("BCLIP_MAX_INPUT_BYTES").unwrap_or(defaults.max_input_bytes),
            allowed_extensions: defaults.allowed_extensions,
            ffmpeg_path: env("BCLIP_FFMPEG_PATH").map(PathBuf::from),
            ffprobe_path: env("BCLIP_FFPROBE_PATH").map(PathBuf::from),
            strategy,
            bar_policy,
            crf: parse_env("BCLIP_CRF").unwrap_or(defaults.crf),
            preset: env("BCLIP_PRESET").unwrap_or(defaults.preset),
            compose_timeout: parse_env("BCLIP_COMPOSE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.compose_timeout),
            probe_timeout: parse_env("BCLIP_PROBE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.probe_timeout),
            verify_timeout: parse_env("BCLIP_VERIFY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.verify_timeout),
        };

        config.validate()?;
        Ok(config)
    }

    /// Pipeline settings derived from this config.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            strategy: self.strategy,
            bar_policy: self.bar_policy,
            encoding: EncodingConfig::default()
                .with_crf(self.crf)
                .with_preset(self.preset.clone()),
            compose_timeout: self.compose_timeout,
            probe_timeout: self.probe_timeout,
            verify_timeout: self.verify_timeout,
            ..PipelineConfig::default()
        }
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_input_bytes == 0 {
            return Err(WorkerError::config_error("max_input_bytes must be positive"));
        }
        if self.crf > 51 {
            return Err(WorkerError::config_error(format!("crf {} outside 0-51", self.crf)));
        }
        if self.allowed_extensions.is_empty() {
            return Err(WorkerError::config_error("no accepted input extensions"));
        }
        self.pipeline_config()
            .validate()
            .map_err(|e| WorkerError::config_error(e.to_string()))
    }
}

/// Pick the overlay clip location.
///
/// An explicit path always wins. Otherwise the production path is used if
/// present, then the development fallbacks; if nothing exists the
/// production path is returned and jobs report the overlay as missing.
pub fn resolve_overlay_path(explicit: Option<PathBuf>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }

    std::iter::once(PRODUCTION_OVERLAY_PATH)
        .chain(DEV_OVERLAY_PATHS.iter().copied())
        .map(Path::new)
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(PRODUCTION_OVERLAY_PATH))
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env(key).and_then(|s| s.trim().parse().ok())
}
