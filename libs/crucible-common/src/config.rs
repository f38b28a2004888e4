// Sandbox policy configuration
// Loaded from config/sandbox.json when present, then overridden by CRUCIBLE_* env vars

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_POLICY_PATH: &str = "config/sandbox.json";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read sandbox policy {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse sandbox policy {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {var}: {value}")]
    Env { var: &'static str, value: String },
    #[error("unsatisfiable sandbox policy: {0}")]
    Invalid(String),
}

/// Isolation and resource policy applied to every sandbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxPolicy {
    /// Image whose entrypoint is the harness runner
    pub image: String,
    pub memory_limit_mb: u32,
    /// Fraction of one core, e.g. 0.5
    pub cpu_limit: f32,
    pub pids_limit: i64,
    /// Wall-clock deadline for one submission
    pub timeout_ms: u64,
    /// uid:gid inside the container
    pub user: String,
    /// Fixed path the workspace is mounted at inside the container
    pub mount_path: String,
    pub tmpfs_size_mb: u32,
    pub max_concurrent_sandboxes: usize,
    /// Parent directory for per-submission workspaces (system temp dir if unset)
    pub workspace_root: Option<PathBuf>,
    /// Pull the image when it is not present locally
    pub pull_missing_image: bool,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            image: "crucible-sandbox:latest".to_string(),
            memory_limit_mb: 128,
            cpu_limit: 0.5,
            pids_limit: 64,
            timeout_ms: 10_000,
            user: "1000:1000".to_string(),
            mount_path: "/app/data".to_string(),
            tmpfs_size_mb: 16,
            max_concurrent_sandboxes: 4,
            workspace_root: None,
            pull_missing_image: false,
        }
    }
}

impl SandboxPolicy {
    /// Load policy from a JSON file; missing fields take defaults
    pub fn load(path: &Path) -> Result<Self, PolicyError> {
        let content = fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| PolicyError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Default file if present, then environment overrides, then validation
    pub fn load_default() -> Result<Self, PolicyError> {
        let path = std::env::var("SANDBOX_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_POLICY_PATH));

        let mut policy = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        policy.apply_env(|var| std::env::var(var).ok())?;
        policy.validate()?;
        Ok(policy)
    }

    /// Apply CRUCIBLE_* overrides from the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), PolicyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, PolicyError> {
            value.trim().parse().map_err(|_| PolicyError::Env { var, value })
        }

        if let Some(v) = lookup("CRUCIBLE_IMAGE") {
            self.image = v;
        }
        if let Some(v) = lookup("CRUCIBLE_MEMORY_MB") {
            self.memory_limit_mb = parse("CRUCIBLE_MEMORY_MB", v)?;
        }
        if let Some(v) = lookup("CRUCIBLE_CPU_LIMIT") {
            self.cpu_limit = parse("CRUCIBLE_CPU_LIMIT", v)?;
        }
        if let Some(v) = lookup("CRUCIBLE_PIDS_LIMIT") {
            self.pids_limit = parse("CRUCIBLE_PIDS_LIMIT", v)?;
        }
        if let Some(v) = lookup("CRUCIBLE_TIMEOUT_MS") {
            self.timeout_ms = parse("CRUCIBLE_TIMEOUT_MS", v)?;
        }
        if let Some(v) = lookup("CRUCIBLE_MAX_SANDBOXES") {
            self.max_concurrent_sandboxes = parse("CRUCIBLE_MAX_SANDBOXES", v)?;
        }
        if let Some(v) = lookup("CRUCIBLE_WORKSPACE_ROOT") {
            self.workspace_root = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("CRUCIBLE_PULL_IMAGE") {
            self.pull_missing_image = parse("CRUCIBLE_PULL_IMAGE", v)?;
        }
        Ok(())
    }

    /// Reject limits Docker cannot honour or that disable isolation
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.image.trim().is_empty() {
            return Err(PolicyError::Invalid("image must not be empty".into()));
        }
        // Docker refuses memory limits below 6MB
        if self.memory_limit_mb < 6 {
            return Err(PolicyError::Invalid(format!(
                "memory_limit_mb must be at least 6, got {}",
                self.memory_limit_mb
            )));
        }
        if !(self.cpu_limit > 0.0) {
            return Err(PolicyError::Invalid(format!(
                "cpu_limit must be positive, got {}",
                self.cpu_limit
            )));
        }
        if self.pids_limit <= 0 {
            return Err(PolicyError::Invalid(format!(
                "pids_limit must be positive, got {}",
                self.pids_limit
            )));
        }
        if self.timeout_ms == 0 {
            return Err(PolicyError::Invalid("timeout_ms must be positive".into()));
        }
        if self.max_concurrent_sandboxes == 0 {
            return Err(PolicyError::Invalid(
                "max_concurrent_sandboxes must be positive".into(),
            ));
        }
        if !self.mount_path.starts_with('/') {
            return Err(PolicyError::Invalid(format!(
                "mount_path must be absolute, got {}",
                self.mount_path
            )));
        }
        if self.user.trim().is_empty() || self.user.starts_with("0:") || self.user == "0" || self.user == "root" {
            return Err(PolicyError::Invalid(format!(
                "sandbox user must be unprivileged, got {:?}",
                self.user
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn memory_limit_bytes(&self) -> i64 {
        (self.memory_limit_mb as i64) * 1024 * 1024
    }

    pub fn nano_cpus(&self) -> i64 {
        (self.cpu_limit as f64 * 1_000_000_000.0) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_limits() {
        let policy = SandboxPolicy::default();
        assert_eq!(policy.memory_limit_bytes(), 128 * 1024 * 1024);
        assert_eq!(policy.nano_cpus(), 500_000_000);
        assert_eq!(policy.pids_limit, 64);
        assert_eq!(policy.timeout(), Duration::from_secs(10));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sandbox.json");
        fs::write(&path, r#"{"timeout_ms": 2500, "image": "custom:1"}"#).unwrap();

        let policy = SandboxPolicy::load(&path).unwrap();
        assert_eq!(policy.timeout_ms, 2500);
        assert_eq!(policy.image, "custom:1");
        assert_eq!(policy.memory_limit_mb, 128);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CRUCIBLE_TIMEOUT_MS", "3000"),
            ("CRUCIBLE_MAX_SANDBOXES", "8"),
            ("CRUCIBLE_PULL_IMAGE", "true"),
        ]
        .into_iter()
        .collect();

        let mut policy = SandboxPolicy::default();
        policy
            .apply_env(|var| env.get(var).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(policy.timeout_ms, 3000);
        assert_eq!(policy.max_concurrent_sandboxes, 8);
        assert!(policy.pull_missing_image);
    }

    #[test]
    fn test_bad_env_value_is_reported() {
        let mut policy = SandboxPolicy::default();
        let err = policy
            .apply_env(|var| (var == "CRUCIBLE_MEMORY_MB").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, PolicyError::Env { var: "CRUCIBLE_MEMORY_MB", .. }));
    }

    #[test]
    fn test_unsatisfiable_limits_rejected() {
        let mut policy = SandboxPolicy::default();
        policy.cpu_limit = 0.0;
        assert!(policy.validate().is_err());

        let mut policy = SandboxPolicy::default();
        policy.user = "0:0".to_string();
        assert!(policy.validate().is_err());

        let mut policy = SandboxPolicy::default();
        policy.memory_limit_mb = 1;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_bundled_policy_file_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/sandbox.json");
        let policy = SandboxPolicy::load(&path).unwrap();
        assert_eq!(policy, SandboxPolicy::default());
    }
}
