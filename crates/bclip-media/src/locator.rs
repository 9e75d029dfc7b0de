//! External tool discovery.
//!
//! Deployments put FFmpeg in different places (distro packages, Homebrew,
//! buildpacks, static vendored builds). The locator tries an ordered list
//! of candidates, keeps the first one that answers `-version`, and caches
//! the answer for the lifetime of the locator.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::command::ToolRunner;

/// Timeout for each `-version` probe.
pub const LOCATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Directories checked before falling back to `PATH`.
pub const DEFAULT_TOOL_DIRS: &[&str] = &[
    "/usr/bin",
    "/usr/local/bin",
    "/opt/homebrew/bin",
    "/app/vendor/ffmpeg",
    "/app/.apt/usr/bin",
];

/// Path to an external binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPath {
    path: PathBuf,
    verified: bool,
}

impl ToolPath {
    /// A path that has not been checked.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            verified: false,
        }
    }

    fn verified(path: PathBuf) -> Self {
        Self {
            path,
            verified: true,
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// Whether this path answered `-version` during resolution.
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    /// Short name used in logs and error messages.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// First line of `-version` output, or `None` if the tool does not answer.
    pub async fn version_line(&self, timeout: Duration) -> Option<String> {
        let output = ToolRunner::new(timeout)
            .run(self, &["-version".to_string()])
            .await
            .ok()?;
        if !output.success() {
            return None;
        }
        output.stdout.lines().next().map(|l| l.trim().to_string())
    }
}

impl std::fmt::Display for ToolPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolves one external tool by name.
#[derive(Debug)]
pub struct ToolLocator {
    name: String,
    candidates: Vec<PathBuf>,
    timeout: Duration,
    resolved: OnceCell<ToolPath>,
}

impl ToolLocator {
    /// Locator for `name` using the default directory list.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let candidates = DEFAULT_TOOL_DIRS
            .iter()
            .map(|dir| Path::new(dir).join(&name))
            .collect();
        Self::with_candidates(name, candidates)
    }

    /// Locator with an explicit candidate list (checked before `PATH`).
    pub fn with_candidates(name: impl Into<String>, candidates: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            candidates,
            timeout: LOCATE_TIMEOUT,
            resolved: OnceCell::new(),
        }
    }

    /// Put an operator-supplied path in front of the candidates.
    pub fn with_override(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.candidates.insert(0, path);
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve the tool, probing candidates only on the first call.
    ///
    /// Never fails: when nothing answers, the bare name is returned and the
    /// eventual invocation reports `ToolNotFound`.
    pub async fn resolve(&self) -> ToolPath {
        self.resolved.get_or_init(|| self.locate()).await.clone()
    }

    async fn locate(&self) -> ToolPath {
        for candidate in &self.candidates {
            if candidate.is_absolute() && !tokio::fs::try_exists(candidate).await.unwrap_or(false) {
                continue;
            }
            if self.answers_version(candidate).await {
                info!(tool = %self.name, path = %candidate.display(), "Resolved tool");
                return ToolPath::verified(candidate.clone());
            }
            debug!(tool = %self.name, path = %candidate.display(), "Candidate did not answer");
        }

        let on_path = which::which(&self.name).unwrap_or_else(|_| PathBuf::from(&self.name));
        if self.answers_version(&on_path).await {
            info!(tool = %self.name, path = %on_path.display(), "Resolved tool from PATH");
            return ToolPath::verified(on_path);
        }

        warn!(
            tool = %self.name,
            "No candidate answered -version, falling back to bare name"
        );
        ToolPath::new(&self.name)
    }

    async fn answers_version(&self, path: &Path) -> bool {
        ToolRunner::new(self.timeout)
            .run(&ToolPath::new(path), &["-version".to_string()])
            .await
            .map(|output| output.success())
            .unwrap_or(false)
    }
}

/// The pair of binaries the pipeline needs.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: ToolPath,
    pub ffprobe: ToolPath,
}

impl Toolchain {
    /// Resolve both tools. `ffprobe` is looked for next to the resolved
    /// `ffmpeg` first, since vendored builds ship them together.
    pub async fn resolve(
        ffmpeg_override: Option<PathBuf>,
        ffprobe_override: Option<PathBuf>,
    ) -> Self {
        let ffmpeg = ToolLocator::new("ffmpeg")
            .with_override(ffmpeg_override)
            .resolve()
            .await;

        let sibling = ffmpeg
            .as_path()
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join("ffprobe"));

        let ffprobe = ToolLocator::new("ffprobe")
            .with_override(sibling)
            .with_override(ffprobe_override)
            .resolve()
            .await;

        Self { ffmpeg, ffprobe }
    }

    /// Use the bare names without probing (tests, or when PATH is trusted).
    pub fn from_path() -> Self {
        Self {
            ffmpeg: ToolPath::new("ffmpeg"),
            ffprobe: ToolPath::new("ffprobe"),
        }
    }
}
