//! Per-job scratch directories.
//!
//! Layout under the work root:
//!
//! ```text
//! <root>/scratch/<job_id>/   intermediate artifacts, purged on release
//! <root>/output/             finished videos, owned by the caller
//! ```
//!
//! Every job gets its own scratch directory, so cleanup can never touch
//! another job's in-flight files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};

use bclip_models::JobId;

use crate::error::{MediaError, MediaResult};

const SCRATCH_DIR: &str = "scratch";
const OUTPUT_DIR: &str = "output";

/// Creates and hands out job workspaces.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    scratch_root: PathBuf,
    output_dir: PathBuf,
}

impl WorkspaceManager {
    /// Create the directory layout under `root`.
    pub async fn new(root: impl Into<PathBuf>) -> MediaResult<Self> {
        let root = root.into();
        let scratch_root = root.join(SCRATCH_DIR);
        let output_dir = root.join(OUTPUT_DIR);

        for dir in [&scratch_root, &output_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| MediaError::workspace(dir, e))?;
        }

        Ok(Self {
            scratch_root,
            output_dir,
        })
    }

    /// Directory finished outputs are written to.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Final output path for a job.
    ///
    /// The output is always an MP4, whatever extension the requested name
    /// carries.
    pub fn output_path(&self, job_id: &JobId, desired_name: &str) -> PathBuf {
        let name = sanitize_file_name(desired_name);
        let stem = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "video".to_string());
        self.output_dir
            .join(format!("{}_processed_{}.mp4", job_id, stem))
    }

    /// Acquire the scratch directory for `job_id`.
    ///
    /// Stale files left there by a crashed earlier run are removed first.
    pub async fn acquire(&self, job_id: &JobId) -> MediaResult<Workspace> {
        let dir = self.scratch_root.join(job_id.as_str());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| MediaError::workspace(&dir, e))?;

        let stale = purge_files(&dir).await?;
        if stale > 0 {
            warn!(job_id = %job_id, removed = stale, "Removed stale scratch files");
        }

        debug!(job_id = %job_id, dir = %dir.display(), "Workspace acquired");
        Ok(Workspace {
            job_id: job_id.clone(),
            dir,
            released: AtomicBool::new(false),
        })
    }

    /// Remove scratch directories left behind by a previous process.
    ///
    /// Only safe before any job has been admitted.
    pub async fn purge_orphans(&self) -> MediaResult<usize> {
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.scratch_root)
            .await
            .map_err(|e| MediaError::workspace(&self.scratch_root, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MediaError::workspace(&self.scratch_root, e))?
        {
            let path = entry.path();
            let result = if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(&path).await
            } else {
                fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove orphan"),
            }
        }

        if removed > 0 {
            info!(removed, "Purged orphaned scratch entries");
        }
        Ok(removed)
    }

    /// Number of finished outputs currently in the output area.
    pub async fn pending_outputs(&self) -> MediaResult<usize> {
        let mut count = 0;
        let mut entries = fs::read_dir(&self.output_dir)
            .await
            .map_err(|e| MediaError::workspace(&self.output_dir, e))?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Scratch directory exclusively owned by one job.
///
/// Call [`Workspace::release`] when the job ends; dropping an unreleased
/// workspace purges it synchronously so no exit path leaks files.
#[derive(Debug)]
pub struct Workspace {
    job_id: JobId,
    dir: PathBuf,
    released: AtomicBool,
}

impl Workspace {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for an intermediate artifact, namespaced by job id.
    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}_{}", self.job_id, name))
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Delete every file this job created. Safe to call more than once.
    ///
    /// A failed purge leaves the workspace unreleased, so a retry or the
    /// drop path still cleans it up.
    pub async fn release(&self) -> MediaResult<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let removed = match purge_files(&self.dir).await {
            Ok(removed) => removed,
            Err(e) => {
                self.released.store(false, Ordering::Release);
                return Err(e);
            }
        };
        match fs::remove_dir(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => debug!(dir = %self.dir.display(), error = %e, "Scratch dir kept"),
        }

        debug!(job_id = %self.job_id, removed, "Workspace released");
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != ErrorKind::NotFound {
                warn!(dir = %self.dir.display(), error = %e, "Failed to purge workspace on drop");
            }
        }
    }
}

/// Remove the regular files directly inside `dir`, returning how many.
async fn purge_files(dir: &Path) -> MediaResult<usize> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(MediaError::workspace(dir, e)),
    };

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| MediaError::workspace(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| MediaError::workspace(entry.path(), e))?;
        if file_type.is_dir() {
            continue;
        }
        match fs::remove_file(entry.path()).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(MediaError::workspace(entry.path(), e)),
        }
    }
    Ok(removed)
}

/// Reduce a user-supplied name to a safe plain file name.
pub fn sanitize_file_name(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "video.mp4".to_string()
    } else {
        trimmed.to_string()
    }
}
