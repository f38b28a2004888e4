mod config;
mod error;
mod handlers;
mod metrics;
mod orchestrator;
mod routes;
mod store;

use anyhow::{Context, Result};
use config::ApiConfig;
use crucible_common::config::SandboxPolicy;
use crucible_sandbox::{DockerSandbox, Sandbox};
use orchestrator::Orchestrator;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use store::{MemoryStore, ProblemStore, RedisStore, SolveLog};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub struct AppState {
    pub orchestrator: Orchestrator,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Crucible API booting...");

    let config = ApiConfig::from_env();
    let policy = SandboxPolicy::load_default().context("Failed to load sandbox policy")?;
    info!(
        image = %policy.image,
        memory_mb = policy.memory_limit_mb,
        cpu = policy.cpu_limit,
        timeout_ms = policy.timeout_ms,
        max_sandboxes = policy.max_concurrent_sandboxes,
        "Sandbox policy loaded"
    );

    let sandbox = DockerSandbox::connect(policy.clone()).context("Failed to create Docker client")?;
    // Docker may come up after us; launches report Unavailable until it does
    if let Err(e) = sandbox.ping().await {
        warn!(error = %e, "Docker daemon not reachable at startup");
    } else if let Err(e) = sandbox.ensure_image().await {
        warn!(error = %e, "Sandbox image not ready");
    }

    let (problems, solves): (Arc<dyn ProblemStore>, Arc<dyn SolveLog>) = match &config.problems_file {
        Some(path) => {
            let store = Arc::new(MemoryStore::load(path).context("Failed to load problems file")?);
            info!(path = %path.display(), problems = store.len(), "Serving problems from file");
            let problems: Arc<dyn ProblemStore> = store.clone();
            let solves: Arc<dyn SolveLog> = store;
            (problems, solves)
        }
        None => {
            let client = redis::Client::open(config.redis_url.as_str())
                .context("Failed to create Redis client")?;
            let conn = ConnectionManager::new(client)
                .await
                .context("Failed to connect to Redis")?;
            info!("Connected to Redis: {}", config.redis_url);
            let store = Arc::new(RedisStore::new(conn));
            let problems: Arc<dyn ProblemStore> = store.clone();
            let solves: Arc<dyn SolveLog> = store;
            (problems, solves)
        }
    };

    let sandbox: Arc<dyn Sandbox> = Arc::new(sandbox);
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(sandbox, problems, solves, policy.max_concurrent_sandboxes),
    });

    // Build router
    let app = routes::routes().with_state(state);

    // Start server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("HTTP server listening on {}", config.bind_addr);
    info!("Ready to accept submissions");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
