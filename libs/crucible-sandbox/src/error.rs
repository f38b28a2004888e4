use std::time::Duration;
use thiserror::Error;

/// Launch-level failures. Code-level failures never appear here: they travel
/// inside the `ExecutionOutcome` the harness writes.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Wall-clock deadline exceeded; the container was killed
    #[error("execution timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// Isolation backend unreachable or refused the container
    #[error("sandbox unavailable: {0}")]
    Unavailable(String),

    #[error("Docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("workspace I/O failure: {context}: {source}")]
    Workspace {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Container exited but left no usable output payload
    #[error("sandbox produced no result: {0}")]
    NoResult(String),
}

pub type Result<T, E = SandboxError> = std::result::Result<T, E>;

impl SandboxError {
    pub(crate) fn workspace(context: impl Into<String>, source: std::io::Error) -> Self {
        SandboxError::Workspace {
            context: context.into(),
            source,
        }
    }

    /// Stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SandboxError::TimedOut(_) => "timeout",
            SandboxError::Unavailable(_) | SandboxError::Docker(_) => "unavailable",
            SandboxError::Workspace { .. } => "workspace",
            SandboxError::NoResult(_) => "no_result",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = SandboxError::TimedOut(Duration::from_secs(10));
        assert_eq!(err.to_string(), "execution timed out after 10000ms");
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_infrastructure_kinds_are_distinct() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(SandboxError::workspace("write input", io).kind(), "workspace");
        assert_eq!(SandboxError::NoResult("missing".into()).kind(), "no_result");
        assert_eq!(SandboxError::Unavailable("no daemon".into()).kind(), "unavailable");
    }
}
