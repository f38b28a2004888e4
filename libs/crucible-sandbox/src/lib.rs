//! Isolated execution of untrusted submissions.
//!
//! [`engine::DockerSandbox`] launches one hardened container per submission,
//! [`workspace::Workspace`] carries the payloads in and out, and
//! [`report`] turns the resulting outcome into the user-facing text.

pub mod engine;
pub mod error;
pub mod report;
pub mod workspace;

pub use engine::DockerSandbox;
pub use error::{Result, SandboxError};

use async_trait::async_trait;
use crucible_common::types::{ExecutionOutcome, Submission};
use uuid::Uuid;

/// Execution backend seam: run one submission in isolation.
///
/// Implementations must use a fresh environment per call and release every
/// resource they acquired before returning, or when the future is dropped.
#[async_trait]
pub trait Sandbox: Send + Sync {
    async fn launch(&self, submission_id: Uuid, submission: &Submission) -> Result<ExecutionOutcome>;
}
