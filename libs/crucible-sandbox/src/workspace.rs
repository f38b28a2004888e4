/// Per-submission workspace
///
/// A uniquely named temporary directory holding the sandbox input payload
/// and, after the harness ran, its output payload. It is bind-mounted into
/// exactly one container.
///
/// **Lifecycle:**
/// - Created before the container exists
/// - `close()` removes it and reports failures
/// - Dropping it without `close()` (early return, cancellation) still removes it

use crate::error::{Result, SandboxError};
use crucible_common::types::{ExecutionOutcome, Submission};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::{Builder, TempDir};
use tracing::{debug, warn};
use uuid::Uuid;

pub const INPUT_FILE: &str = "input.json";
pub const OUTPUT_FILE: &str = "output.json";

#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    host_path: PathBuf,
}

// The harness runs under an unprivileged uid that does not own the directory,
// so it must be world-writable for the output payload to land.
#[cfg(unix)]
fn open_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o777))
}

#[cfg(not(unix))]
fn open_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl Workspace {
    /// Create a fresh workspace under `root` (system temp dir when `None`)
    pub fn create(root: Option<&Path>, submission_id: &Uuid) -> Result<Self> {
        let prefix = format!("crucible-{}-", submission_id);
        let mut builder = Builder::new();
        builder.prefix(&prefix);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| {
                    SandboxError::workspace(format!("create root {}", root.display()), e)
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| SandboxError::workspace("create workspace directory", e))?;

        open_permissions(dir.path())
            .map_err(|e| SandboxError::workspace("set workspace permissions", e))?;

        // Docker bind mounts need an absolute, symlink-free host path
        let host_path = std::fs::canonicalize(dir.path())
            .map_err(|e| SandboxError::workspace("resolve workspace path", e))?;

        debug!(workspace = %host_path.display(), "Workspace created");
        Ok(Self { dir, host_path })
    }

    /// Absolute host path to bind-mount
    pub fn host_path(&self) -> &Path {
        &self.host_path
    }

    pub fn input_path(&self) -> PathBuf {
        self.host_path.join(INPUT_FILE)
    }

    pub fn output_path(&self) -> PathBuf {
        self.host_path.join(OUTPUT_FILE)
    }

    /// Serialize the submission as the sandbox input payload
    pub async fn write_submission(&self, submission: &Submission) -> Result<()> {
        let payload = serde_json::to_vec(submission).map_err(|e| {
            SandboxError::workspace(
                "serialize input payload",
                std::io::Error::new(ErrorKind::InvalidData, e),
            )
        })?;

        tokio::fs::write(self.input_path(), payload)
            .await
            .map_err(|e| SandboxError::workspace("write input payload", e))
    }

    /// Read the harness output payload.
    /// A missing or unparsable file means the sandbox produced no result.
    pub async fn read_outcome(&self) -> Result<ExecutionOutcome> {
        let bytes = match tokio::fs::read(self.output_path()).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SandboxError::NoResult("output payload missing".to_string()));
            }
            Err(e) => return Err(SandboxError::workspace("read output payload", e)),
        };

        serde_json::from_slice(&bytes)
            .map_err(|e| SandboxError::NoResult(format!("output payload unparsable: {}", e)))
    }

    /// Remove the workspace. Consumes self so removal happens at most once.
    pub fn close(self) -> Result<()> {
        let path = self.host_path.clone();
        self.dir.close().map_err(|e| {
            warn!(workspace = %path.display(), error = %e, "Failed to remove workspace");
            SandboxError::workspace(format!("remove {}", path.display()), e)
        })?;
        debug!(workspace = %path.display(), "Workspace removed");
        Ok(())
    }
}
