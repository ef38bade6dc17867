//! EIP Automerge - CI entry point
//!
//! The `eip-automerge` command runs once per CI event and either merges a
//! pull request that only touches early-stage EIPs or comments on why it
//! could not.
//!
//! ## Commands
//!
//! - `run`: read the trigger from the CI environment and act on it
//! - `check`: evaluate a given PR directly, optionally without side effects

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info, Level};

use eip_automerge_core::{Orchestrator, PolicyConfig, RunOutcome, TriggerContext};
use eip_forge::{ForgeApi, ForgeConfig, ForgeError, GitHubClient, RepoRef};

#[derive(Parser)]
#[command(name = "eip-automerge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automatically merge pull requests that only update draft EIPs", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// API token used for every forge call
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Base URL of the forge REST API
    #[arg(long, env = "GITHUB_API_URL", global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Act on the CI event described by the environment
    Run {
        /// Evaluate only; never merge or comment
        #[arg(long)]
        dry_run: bool,

        /// Do not require an author's approval
        #[arg(long)]
        skip_approval_check: bool,
    },

    /// Evaluate a pull request directly
    Check {
        /// Repository as owner/name
        #[arg(long)]
        repo: String,

        /// Pull request number
        #[arg(long)]
        pr: u64,

        /// Evaluate only and print the decision
        #[arg(long)]
        dry_run: bool,

        /// Do not require an author's approval
        #[arg(long)]
        skip_approval_check: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // `.env` has to be in the environment before clap reads its env fallbacks.
    let mode = std::env::var("AUTOMERGE_ENV").ok();
    let dev_env = std::env::current_dir()
        .ok()
        .and_then(|dir| load_development_env(mode.as_deref(), &dir));
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    eip_automerge_core::init_tracing(cli.json, level);
    if let Some(path) = dev_env {
        debug!(path = %path.display(), "loaded development environment");
    }

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Actions turns this line into an error annotation on the run.
            println!("{}", error_annotation(&format!("{:#}", err)));
            ExitCode::FAILURE
        }
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let forge = connect(cli.token, cli.api_url)?;

    match cli.command {
        Commands::Run {
            dry_run,
            skip_approval_check,
        } => {
            let trigger = TriggerContext::from_env().context("Failed to read CI trigger")?;
            let outcome = cmd_run(forge, &trigger, dry_run, policy(skip_approval_check)).await?;
            report(&outcome)
        }
        Commands::Check {
            repo,
            pr,
            dry_run,
            skip_approval_check,
        } => {
            let repo = RepoRef::parse(&repo)
                .with_context(|| format!("Invalid repository '{}', expected owner/name", repo))?;
            let trigger = TriggerContext::for_pull_request(repo, pr);
            let outcome = cmd_run(forge, &trigger, dry_run, policy(skip_approval_check)).await?;
            report(&outcome)
        }
    }
}

/// Load `dir/.env` when `AUTOMERGE_ENV` is `development`.
///
/// Variables already set in the process win over the file.
fn load_development_env(mode: Option<&str>, dir: &Path) -> Option<PathBuf> {
    if mode != Some("development") {
        return None;
    }
    let path = dir.join(".env");
    dotenvy::from_path(&path).ok()?;
    Some(path)
}

fn connect(token: Option<String>, api_url: Option<String>) -> Result<Arc<dyn ForgeApi>> {
    let token = token.ok_or_else(|| {
        ForgeError::MissingConfig(
            "GITHUB_TOKEN is not set; pass --token or set the variable".into(),
        )
    })?;
    let mut config = ForgeConfig::new(token);
    if let Some(url) = api_url {
        config = config.with_api_url(url);
    }
    let client = GitHubClient::new(config).context("Failed to build forge client")?;
    Ok(Arc::new(client))
}

fn policy(skip_approval_check: bool) -> PolicyConfig {
    PolicyConfig {
        require_author_approval: !skip_approval_check,
    }
}

async fn cmd_run(
    forge: Arc<dyn ForgeApi>,
    trigger: &TriggerContext,
    dry_run: bool,
    policy: PolicyConfig,
) -> Result<RunOutcome> {
    let outcome = Orchestrator::new(forge)
        .with_policy(policy)
        .dry_run(dry_run)
        .run(trigger)
        .await
        .context("Automerge run failed")?;
    Ok(outcome)
}

fn report(outcome: &RunOutcome) -> Result<()> {
    match outcome {
        RunOutcome::Skipped(reason) => info!("skipped: {}", reason),
        RunOutcome::NothingToMerge { .. } => info!("nothing to merge"),
        RunOutcome::Merged { title, .. } => info!("merged: {}", title),
        RunOutcome::Commented { errors, .. } => {
            info!("commented with {} issue(s)", errors.len())
        }
        RunOutcome::DryRun(decision) => {
            println!("{}", serde_json::to_string_pretty(decision)?);
        }
    }
    Ok(())
}

/// Format `message` as an Actions `::error::` workflow command.
fn error_annotation(message: &str) -> String {
    let escaped = message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    format!("::error::{}", escaped)
}
