//! apisweep: replay saved API requests across environments and profile their latency
//!
//! Loads a workspace file of environments and request definitions, runs one
//! send, comparison sweep or latency profile, and prints the reduced report.

use anyhow::{Context, Result};
use apisweep::config::{self, WorkspaceFile};
use apisweep::execution::DispatchOptions;
use apisweep::orchestrator::results::{print_report, write_report};
use apisweep::orchestrator::{CompareRequest, ProfileRequest, SendRequest, StartRequest};
use apisweep::{app, history};
use apisweep_common::defaults::{
    DEFAULT_DELAY_MS, DEFAULT_ITERATIONS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_WARMUP,
    DEFAULT_WORKSPACE_FILE, WORKSPACE_ENV_VAR,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "apisweep")]
#[command(about = "Environment comparison sweeps and latency profiles for HTTP requests")]
#[command(version)]
struct Args {
    /// Workspace file with environments and requests
    #[arg(short, long, env = WORKSPACE_ENV_VAR, default_value = DEFAULT_WORKSPACE_FILE, global = true)]
    workspace: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by every run command
#[derive(clap::Args, Debug)]
struct CommonArgs {
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout: u64,

    /// Don't follow redirects
    #[arg(long)]
    no_redirects: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    insecure: bool,

    /// Output JSON file for the report
    #[arg(short, long)]
    output: Option<String>,

    /// Don't record the run in the history database
    #[arg(long)]
    no_history: bool,

    /// Don't print live progress
    #[arg(short, long)]
    quiet: bool,
}

/// Arguments for the send command
#[derive(clap::Args, Debug)]
struct SendArgs {
    /// Request name from the workspace
    request: String,

    /// Environment to send against (defaults to the workspace default)
    #[arg(short, long)]
    env: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

/// Arguments for the compare command
#[derive(clap::Args, Debug)]
struct CompareArgs {
    /// Request name from the workspace
    request: String,

    /// Environments to compare, in order (repeatable or comma-separated)
    #[arg(short, long = "env", value_delimiter = ',', required = true)]
    environments: Vec<String>,

    /// Environment every other row is diffed against (defaults to the first)
    #[arg(short, long)]
    baseline: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

/// Arguments for the profile command
#[derive(clap::Args, Debug)]
struct ProfileArgs {
    /// Request name from the workspace
    request: String,

    /// Environment to profile against (defaults to the workspace default)
    #[arg(short, long)]
    env: Option<String>,

    /// Warmup iterations, excluded from statistics
    #[arg(long, default_value_t = DEFAULT_WARMUP)]
    warmup: u32,

    /// Measured iterations
    #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: u32,

    /// Pause between iterations in milliseconds
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    delay_ms: u64,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send a request once
    Send(SendArgs),

    /// Replay a request against several environments and diff the responses
    Compare(CompareArgs),

    /// Replay a request repeatedly and report latency statistics
    Profile(ProfileArgs),

    /// Show or prune recorded runs
    History {
        /// Number of runs to show
        #[arg(short, long, default_value = "20")]
        limit: u32,

        /// Delete runs older than this many days instead of listing
        #[arg(long)]
        prune: Option<u32>,
    },
}

impl CommonArgs {
    fn into_config(self, workspace: PathBuf) -> config::RunConfig {
        config::RunConfig {
            workspace,
            http: config::HttpConfig {
                timeout_secs: self.timeout,
                follow_redirects: !self.no_redirects,
                insecure: self.insecure,
            },
            flags: config::RuntimeFlags {
                no_history: self.no_history,
                quiet: self.quiet,
                output: self.output,
            },
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let workspace_path = args.workspace;
    let (run_config, active, start) = match args.command {
        Command::History { limit, prune } => {
            return match prune {
                Some(days) => history::prune_runs(days).await,
                None => history::list_runs(limit).await,
            };
        }

        Command::Send(send) => {
            let workspace = load_workspace(&workspace_path)?;
            let request = workspace.request(&send.request)?;
            if let Some(env) = &send.env {
                workspace.check_environments([env.as_str()])?;
            }
            let config = send.common.into_config(workspace_path);
            let start = StartRequest::Send(SendRequest {
                label: format!("Send {}", request.name),
                request,
                options: dispatch_options(&config),
            });
            (config, (workspace, send.env), start)
        }

        Command::Compare(compare) => {
            let workspace = load_workspace(&workspace_path)?;
            let request = workspace.request(&compare.request)?;
            let environments: Vec<String> = compare
                .environments
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            workspace.check_environments(environments.iter().map(String::as_str))?;

            info!(
                request = %request.name,
                environments = ?environments,
                baseline = ?compare.baseline,
                "Starting comparison"
            );

            let config = compare.common.into_config(workspace_path);
            let start = StartRequest::Compare(CompareRequest {
                label: format!("Compare {}", request.name),
                request,
                environments,
                baseline: compare.baseline,
                options: dispatch_options(&config),
            });
            (config, (workspace, None), start)
        }

        Command::Profile(profile) => {
            let workspace = load_workspace(&workspace_path)?;
            let request = workspace.request(&profile.request)?;
            if let Some(env) = &profile.env {
                workspace.check_environments([env.as_str()])?;
            }

            info!(
                request = %request.name,
                warmup = profile.warmup,
                iterations = profile.iterations,
                delay_ms = profile.delay_ms,
                "Starting profile"
            );

            let config = profile.common.into_config(workspace_path);
            let start = StartRequest::Profile(ProfileRequest {
                label: format!("Profile {}", request.name),
                request,
                warmup: profile.warmup,
                measured: profile.iterations,
                delay: Duration::from_millis(profile.delay_ms),
                options: dispatch_options(&config),
            });
            (config, (workspace, profile.env), start)
        }
    };

    let (workspace, active_env) = active;
    let environments = workspace.environment_store(active_env.as_deref());

    let Some(report) = app::run(&run_config, environments, start).await? else {
        return Ok(());
    };

    print_report(&report);
    if let Some(output) = run_config.output() {
        write_report(&report, output)?;
    }

    Ok(())
}

fn load_workspace(path: &std::path::Path) -> Result<WorkspaceFile> {
    WorkspaceFile::load(path)
        .with_context(|| format!("Failed to load workspace {}", path.display()))
}

fn dispatch_options(config: &config::RunConfig) -> DispatchOptions {
    DispatchOptions {
        timeout: config.timeout(),
    }
}
