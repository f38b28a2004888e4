// CLI commands for operating Crucible
use anyhow::{bail, Context, Result};
use crucible_common::config::SandboxPolicy;
use crucible_common::redis as store;
use crucible_common::types::{is_identifier, Problem, Submission};
use crucible_sandbox::{report, DockerSandbox, Sandbox};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};
use uuid::Uuid;

pub const SANDBOX_DOCKERFILE: &str = "docker/sandbox/Dockerfile";

/// A problem file holds one problem or a list of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProblemFile {
    Many(Vec<Problem>),
    One(Problem),
}

/// Parse and sanity-check a problem file
pub fn read_problems(path: &Path) -> Result<Vec<Problem>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let problems = match serde_json::from_str::<ProblemFile>(&content)
        .with_context(|| format!("Failed to parse problems in {}", path.display()))?
    {
        ProblemFile::Many(problems) => problems,
        ProblemFile::One(problem) => vec![problem],
    };

    for problem in &problems {
        if problem.id.trim().is_empty() {
            bail!("Problem '{}' has an empty id", problem.title);
        }
        if !is_identifier(&problem.function_name) {
            bail!(
                "Problem '{}' has invalid function name '{}'",
                problem.id,
                problem.function_name
            );
        }
    }
    Ok(problems)
}

pub fn read_submission(path: &Path) -> Result<Submission> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse submission in {}", path.display()))
}

async fn connect_redis(redis_url: &str) -> Result<redis::aio::ConnectionManager> {
    let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
    redis::aio::ConnectionManager::new(client)
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", redis_url))
}

pub fn build_sandbox_image(tag: Option<&str>, no_cache: bool) -> Result<()> {
    let policy = SandboxPolicy::load_default().context("Failed to load sandbox policy")?;
    let tag = tag.unwrap_or(policy.image.as_str()).to_string();

    if !Path::new(SANDBOX_DOCKERFILE).exists() {
        bail!(
            "Dockerfile not found at {}. Run from the repository root.",
            SANDBOX_DOCKERFILE
        );
    }

    println!("🐳 Building sandbox image: {}", tag);
    println!("📄 Dockerfile: {}", SANDBOX_DOCKERFILE);

    let mut docker_args = vec![
        "build".to_string(),
        "-t".to_string(),
        tag.clone(),
        "-f".to_string(),
        SANDBOX_DOCKERFILE.to_string(),
    ];
    if no_cache {
        docker_args.push("--no-cache".to_string());
    }
    // Workspace root is the build context so the harness crate can be compiled
    docker_args.push(".".to_string());

    println!("\n🔨 Running: docker {}", docker_args.join(" "));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

    let status = Command::new("docker")
        .args(&docker_args)
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .context("Failed to execute docker build. Is Docker installed and running?")?;

    if !status.success() {
        bail!("Docker build failed with exit code: {:?}", status.code());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Sandbox image built: {}", tag);
    Ok(())
}

pub async fn add_problems(path: &Path, redis_url: &str) -> Result<()> {
    let problems = read_problems(path)?;
    let mut conn = connect_redis(redis_url).await?;

    for problem in &problems {
        store::put_problem(&mut conn, problem)
            .await
            .with_context(|| format!("Failed to store problem '{}'", problem.id))?;
        println!(
            "✅ Stored problem {} ({}, {} test cases)",
            problem.id,
            problem.title,
            problem.test_cases.len()
        );
    }

    println!("\n📦 {} problem(s) loaded", problems.len());
    Ok(())
}

pub async fn list_problems(redis_url: &str) -> Result<()> {
    let mut conn = connect_redis(redis_url).await?;
    let problems = store::list_problems(&mut conn)
        .await
        .context("Failed to list problems")?;

    if problems.is_empty() {
        println!("No problems stored. Add some with: crucible-cli add-problem --file <problems.json>");
        return Ok(());
    }

    println!("{:<12} {:<24} {}", "ID", "FUNCTION", "TITLE");
    for problem in problems {
        println!("{:<12} {:<24} {}", problem.id, problem.function_name, problem.title);
    }
    Ok(())
}

/// Run one submission through Docker; returns the aggregate verdict
pub async fn run_submission(path: &Path, timeout_ms: Option<u64>) -> Result<bool> {
    let submission = read_submission(path)?;

    let mut policy = SandboxPolicy::load_default().context("Failed to load sandbox policy")?;
    if let Some(timeout_ms) = timeout_ms {
        policy.timeout_ms = timeout_ms;
    }

    let sandbox = DockerSandbox::connect(policy)?;
    sandbox.ping().await?;

    println!(
        "🚀 Running {} against {} test case(s)",
        submission.function_name,
        submission.test_cases.len()
    );

    let outcome = sandbox
        .launch(Uuid::new_v4(), &submission)
        .await
        .context("Sandbox run failed")?;
    let report = report::interpret(&outcome);

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
    println!("{}", report.output);
    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if report.passed_all {
        println!("✅ All test cases passed");
    } else {
        println!("❌ Not all test cases passed");
    }

    Ok(report.passed_all)
}
