use anyhow::Context;
use clap::{Parser, Subcommand};
use labelgrab_engine::config::{ConfigLoader, LabelgrabConfig};
use labelgrab_engine::workflow::{
    RunContext, RunOutcome, check_session, execute_run, logout,
};
use labelgrab_h::HeadlessBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit status for "ran fine, nothing to download" under `--strict-exit`.
const EXIT_EMPTY: u8 = 3;
/// Exit status of `check-session` when the stored session is rejected.
const EXIT_SESSION_INVALID: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "labelgrab",
    version,
    about = "Download today's shipping-label PDF from the supplier panel"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (YAML). Defaults to ./labelgrab.yaml, then ~/.labelgrab/config.yaml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show the browser window instead of running headless
    #[arg(long, global = true)]
    visible: bool,

    /// Value to pick in the orders filter (e.g. a dispatch date)
    #[arg(long)]
    filter_value: Option<String>,

    /// Exit with status 3 when the run finds nothing to download
    #[arg(long)]
    strict_exit: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Delete the persisted session so the next run logs in again
    Logout,
    /// Check whether the persisted session is still accepted
    CheckSession,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    // Logs go to stderr; stdout carries only the downloaded file path.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> anyhow::Result<ExitCode> {
    let mut config = ConfigLoader::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    apply_args(&mut config, &args);

    if args.command == Some(Command::Logout) {
        logout(&config)
            .await
            .context("Failed to remove the persisted session")?;
        return Ok(ExitCode::SUCCESS);
    }

    let cancel = CancellationToken::new();
    spawn_shutdown_listener(cancel.clone());

    let ctx = RunContext::new(config, cancel);
    let mut backend = HeadlessBackend::new(ctx.config.browser.clone());

    if args.command == Some(Command::CheckSession) {
        let valid = check_session(&mut backend, &ctx)
            .await
            .context("Session check failed")?;
        info!(valid, "Session check finished");
        return Ok(if valid {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(EXIT_SESSION_INVALID)
        });
    }

    Ok(match execute_run(&mut backend, &ctx).await {
        Ok(RunOutcome::Downloaded(path)) => {
            info!(outcome = "downloaded", path = %path.display(), "Run finished");
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::NothingToDo(reason)) => {
            info!(outcome = "empty", %reason, "Run finished with nothing to download");
            if args.strict_exit {
                ExitCode::from(EXIT_EMPTY)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            error!(outcome = "failed", step = %e.step(), code = e.code(), "Run failed: {}", e);
            ExitCode::FAILURE
        }
    })
}

fn apply_args(config: &mut LabelgrabConfig, args: &Args) {
    if args.visible {
        config.browser.visible = true;
    }
    if let Some(value) = &args.filter_value {
        config.workflow.filter_value = Some(value.clone());
    }
}

fn spawn_shutdown_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Shutdown requested, cancelling run");
        cancel.cancel();
    });
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!("Ctrl-C handler unavailable: {}", e);
                        term.recv().await;
                    }
                }
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!("SIGTERM handler unavailable: {}", e);
            ctrl_c_or_never().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c_or_never().await;
}

async fn ctrl_c_or_never() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
