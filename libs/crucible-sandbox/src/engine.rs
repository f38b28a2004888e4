/// Sandbox Launcher - Docker-backed isolated execution
///
/// **Core Responsibility:**
/// Run the harness for one submission inside a fresh, hardened container and
/// hand back the `ExecutionOutcome` it wrote.
///
/// **Critical Architectural Boundary:**
/// - Launcher knows HOW to isolate and bound execution
/// - Launcher does NOT compare values or format reports
/// - Code-level failures come back inside the outcome, never as `SandboxError`
///
/// **Container Rules:**
/// 1. One container and one workspace per submission, never reused
/// 2. No network, memory/CPU/pids ceilings, read-only rootfs
/// 3. Workspace bind-mounted at the policy mount path, nothing else writable
///    except a small noexec tmpfs at /tmp
/// 4. Unprivileged user, no-new-privileges, all capabilities dropped
/// 5. Hard wall-clock deadline, container force-killed on expiry
/// 6. Container and workspace removed on every exit path

use crate::error::{Result, SandboxError};
use crate::workspace::Workspace;
use crate::Sandbox;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, KillContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, WaitContainerOptions,
};
use bollard::image::CreateImageOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use crucible_common::config::SandboxPolicy;
use crucible_common::types::{ExecutionOutcome, Submission};
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub const SUBMISSION_LABEL: &str = "crucible.submission";

/// Lines of container output kept for diagnostics when no result was produced
const DIAGNOSTIC_LOG_LINES: &str = "40";

/// Container cleanup guard - guarantees container removal
/// `release()` removes it inline; dropping an unreleased guard (panic,
/// cancellation) schedules a forced removal on the runtime.
struct ContainerGuard {
    docker: Docker,
    container_id: String,
    released: bool,
}

impl ContainerGuard {
    fn new(docker: Docker, container_id: String) -> Self {
        Self {
            docker,
            container_id,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        remove_container(&self.docker, &self.container_id).await;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let docker = self.docker.clone();
        let container_id = self.container_id.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    remove_container(&docker, &container_id).await;
                });
            }
            Err(_) => {
                warn!(container = %container_id, "No runtime to remove abandoned container");
            }
        }
    }
}

async fn remove_container(docker: &Docker, container_id: &str) {
    let options = RemoveContainerOptions {
        force: true,
        ..Default::default()
    };
    match docker.remove_container(container_id, Some(options)).await {
        Ok(()) => debug!(container = %container_id, "Container removed"),
        Err(e) => warn!(container = %container_id, error = %e, "Failed to remove container"),
    }
}

/// Human hint for well-known container exit codes
pub fn describe_exit(code: i64) -> Option<&'static str> {
    match code {
        137 => Some("killed, likely exceeded memory limit"),
        139 => Some("segmentation fault"),
        _ => None,
    }
}

/// Check a harness outcome against how the container exited.
/// The harness exits 0 after its atomic write, and answers every case or none.
pub fn accept_outcome(
    exit_code: i64,
    expected_cases: usize,
    outcome: ExecutionOutcome,
) -> Result<ExecutionOutcome> {
    if exit_code != 0 {
        return Err(SandboxError::NoResult(format!(
            "harness exited with code {}",
            exit_code
        )));
    }
    if let ExecutionOutcome::Results(results) = &outcome {
        if results.len() != expected_cases {
            return Err(SandboxError::NoResult(format!(
                "result count {} does not match {} test cases",
                results.len(),
                expected_cases
            )));
        }
    }
    Ok(outcome)
}

/// Build the hardened container configuration for one submission
pub fn container_config(
    policy: &SandboxPolicy,
    workspace: &Path,
    submission_id: &Uuid,
) -> Config<String> {
    let mut tmpfs = HashMap::new();
    tmpfs.insert(
        "/tmp".to_string(),
        format!("rw,noexec,nosuid,size={}m", policy.tmpfs_size_mb),
    );

    let mut labels = HashMap::new();
    labels.insert(SUBMISSION_LABEL.to_string(), submission_id.to_string());

    Config {
        image: Some(policy.image.clone()),
        user: Some(policy.user.clone()),
        env: Some(vec![format!("HARNESS_DATA_DIR={}", policy.mount_path)]),
        labels: Some(labels),
        network_disabled: Some(true),
        attach_stdout: Some(false),
        attach_stderr: Some(false),
        host_config: Some(HostConfig {
            memory: Some(policy.memory_limit_bytes()),
            // Equal to memory: no swap on top of the ceiling
            memory_swap: Some(policy.memory_limit_bytes()),
            nano_cpus: Some(policy.nano_cpus()),
            pids_limit: Some(policy.pids_limit),
            network_mode: Some("none".to_string()),
            readonly_rootfs: Some(true),
            binds: Some(vec![format!(
                "{}:{}:rw",
                workspace.display(),
                policy.mount_path
            )]),
            tmpfs: Some(tmpfs),
            security_opt: Some(vec!["no-new-privileges".to_string()]),
            cap_drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Docker-based launcher
pub struct DockerSandbox {
    docker: Docker,
    policy: SandboxPolicy,
}

impl DockerSandbox {
    /// Connect to the local Docker daemon with a validated policy
    pub fn connect(policy: SandboxPolicy) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| SandboxError::Unavailable(format!("failed to connect to Docker daemon: {}", e)))?;
        Self::with_client(docker, policy)
    }

    pub fn with_client(docker: Docker, policy: SandboxPolicy) -> Result<Self> {
        policy
            .validate()
            .map_err(|e| SandboxError::Unavailable(e.to_string()))?;
        Ok(Self { docker, policy })
    }

    /// Verify the daemon answers
    pub async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| SandboxError::Unavailable(format!("Docker daemon not reachable: {}", e)))?;
        Ok(())
    }

    /// Ensure the sandbox image is available (pull if allowed)
    pub async fn ensure_image(&self) -> Result<()> {
        let image = self.policy.image.as_str();
        if self.docker.inspect_image(image).await.is_ok() {
            debug!(image = %image, "Image cache hit");
            return Ok(());
        }

        if !self.policy.pull_missing_image {
            return Err(SandboxError::Unavailable(format!(
                "sandbox image '{}' not present; build it with `crucible-cli build-image`",
                image
            )));
        }

        warn!(image = %image, "Image cache miss, pulling now");
        let options = Some(CreateImageOptions {
            from_image: image,
            ..Default::default()
        });
        let mut stream = self.docker.create_image(options, None, None);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| {
                SandboxError::Unavailable(format!("failed to pull image '{}': {}", image, e))
            })?;
        }
        info!(image = %image, "Image pulled");
        Ok(())
    }

    /// Wait for the container to stop and return its exit code
    async fn wait_exit(&self, container_id: &str) -> Result<i64> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };
        let mut stream = self.docker.wait_container(container_id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports non-zero exits as errors
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(SandboxError::Unavailable(
                "container wait stream ended unexpectedly".to_string(),
            )),
        }
    }

    async fn tail_logs(&self, container_id: &str) -> String {
        let options = Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            tail: DIAGNOSTIC_LOG_LINES.to_string(),
            ..Default::default()
        });
        let mut stream = self.docker.logs(container_id, options);
        let mut collected = String::new();

        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    collected.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(container = %container_id, error = %e, "Could not read container logs");
                    break;
                }
            }
        }
        collected
    }

    /// Start the created container and supervise it until it exits or the
    /// deadline fires, then collect the outcome from the workspace
    async fn supervise(
        &self,
        container_id: &str,
        submission: &Submission,
        workspace: &Workspace,
    ) -> Result<ExecutionOutcome> {
        self.docker
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| SandboxError::Unavailable(format!("failed to start container: {}", e)))?;

        let started = Instant::now();
        let deadline = self.policy.timeout();

        let exit_code = match tokio::time::timeout(deadline, self.wait_exit(container_id)).await {
            Ok(code) => code?,
            Err(_) => {
                warn!(
                    container = %container_id,
                    timeout_ms = self.policy.timeout_ms,
                    "Execution timed out, killing container"
                );
                if let Err(e) = self
                    .docker
                    .kill_container(container_id, None::<KillContainerOptions<String>>)
                    .await
                {
                    warn!(container = %container_id, error = %e, "Failed to kill timed-out container");
                }
                return Err(SandboxError::TimedOut(deadline));
            }
        };

        let execution_ms = started.elapsed().as_millis() as u64;
        debug!(container = %container_id, exit_code, execution_ms, "Container exited");

        let collected = workspace
            .read_outcome()
            .await
            .and_then(|outcome| accept_outcome(exit_code, submission.test_cases.len(), outcome));

        match collected {
            Ok(outcome) => Ok(outcome),
            Err(SandboxError::NoResult(reason)) => {
                let logs = self.tail_logs(container_id).await;
                let hint = describe_exit(exit_code)
                    .map(|h| format!(": {}", h))
                    .unwrap_or_default();
                error!(
                    container = %container_id,
                    exit_code,
                    logs = %logs.trim_end(),
                    "Sandbox produced no result"
                );
                Err(SandboxError::NoResult(format!(
                    "{} (exit code {}{})",
                    reason, exit_code, hint
                )))
            }
            Err(e) => Err(e),
        }
    }

    async fn run_in_workspace(
        &self,
        submission_id: &Uuid,
        submission: &Submission,
        workspace: &Workspace,
    ) -> Result<ExecutionOutcome> {
        workspace.write_submission(submission).await?;
        self.ensure_image().await?;

        let config = container_config(&self.policy, workspace.host_path(), submission_id);
        let name = format!("crucible-{}", submission_id);
        let create_options = CreateContainerOptions {
            name: name.as_str(),
            platform: None,
        };

        let container = self
            .docker
            .create_container(Some(create_options), config)
            .await
            .map_err(|e| SandboxError::Unavailable(format!("failed to create container: {}", e)))?;
        for warning in &container.warnings {
            warn!(container = %container.id, warning = %warning, "Docker warning");
        }

        // Guard is armed before the container can run
        let guard = ContainerGuard::new(self.docker.clone(), container.id.clone());
        let result = self.supervise(&container.id, submission, workspace).await;
        guard.release().await;
        result
    }
}

#[async_trait]
impl Sandbox for DockerSandbox {
    #[instrument(
        skip(self, submission),
        fields(submission_id = %submission_id, test_count = submission.test_cases.len())
    )]
    async fn launch(&self, submission_id: Uuid, submission: &Submission) -> Result<ExecutionOutcome> {
        let started = Instant::now();
        let workspace = Workspace::create(self.policy.workspace_root.as_deref(), &submission_id)?;

        let result = self.run_in_workspace(&submission_id, submission, &workspace).await;

        // Removal failure is logged by close() and must not mask the outcome
        let _ = workspace.close();

        let execution_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(execution_ms, "Sandbox run completed"),
            Err(e) => warn!(execution_ms, kind = e.kind(), error = %e, "Sandbox run failed"),
        }
        result
    }
}
