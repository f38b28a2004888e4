mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crucible-cli")]
#[command(about = "Crucible CLI - Build the sandbox image, manage problems, run submissions locally", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the sandbox image (harness + Python runtime)
    BuildImage {
        /// Image tag (defaults to the policy image)
        #[arg(short, long)]
        tag: Option<String>,

        /// Skip build cache
        #[arg(long, default_value = "false")]
        no_cache: bool,
    },

    /// Load problems from a JSON file (one object or an array) into Redis
    AddProblem {
        /// Problem file
        #[arg(short, long)]
        file: PathBuf,

        /// Redis URL
        #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,
    },

    /// List problems stored in Redis
    ListProblems {
        /// Redis URL
        #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
        redis_url: String,
    },

    /// Run a submission file through a local sandbox and print the report
    Run {
        /// Submission file: {code, function_name, test_cases}
        #[arg(short, long)]
        file: PathBuf,

        /// Override the wall-clock timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildImage { tag, no_cache } => {
            commands::build_sandbox_image(tag.as_deref(), no_cache)?;
        }
        Commands::AddProblem { file, redis_url } => {
            commands::add_problems(&file, &redis_url).await?;
        }
        Commands::ListProblems { redis_url } => {
            commands::list_problems(&redis_url).await?;
        }
        Commands::Run { file, timeout_ms } => {
            let passed = commands::run_submission(&file, timeout_ms).await?;
            if !passed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
