//! reelay-supervisor: runs the bot as a child process with output in a log file.
//!
//! # Usage
//!
//! ```bash
//! # Start `reelay` from the same directory as this binary, logging to bot_output.log
//! reelay-supervisor
//!
//! # Custom binary and log file
//! reelay-supervisor --program ./target/release/reelay --log-file /var/log/reelay.log
//! ```

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::process::{Child, Command};

use reelay_bot::signal::shutdown_signal;

/// Launch the relay bot and keep it attached to this terminal.
#[derive(Parser, Debug)]
#[command(name = "reelay-supervisor", version, about)]
struct Cli {
    /// Bot executable (default: `reelay` next to this binary, else on PATH).
    #[arg(long)]
    program: Option<PathBuf>,

    /// File receiving the bot's stdout and stderr. Truncated at start.
    #[arg(long, default_value = "bot_output.log")]
    log_file: PathBuf,

    /// Seconds to wait after SIGTERM before killing the bot.
    #[arg(long, default_value_t = 30)]
    stop_timeout: u64,

    /// Extra arguments passed to the bot.
    #[arg(last = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let program = cli.program.clone().unwrap_or_else(default_program);

    let log = std::fs::File::create(&cli.log_file)
        .with_context(|| format!("creating log file {}", cli.log_file.display()))?;
    let log_err = log
        .try_clone()
        .with_context(|| format!("duplicating handle for {}", cli.log_file.display()))?;

    let mut child = Command::new(&program)
        .args(&cli.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err))
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("starting {}", program.display()))?;

    tracing::info!(
        pid = child.id(),
        program = %program.display(),
        log_file = %cli.log_file.display(),
        "bot started, press Ctrl+C to stop"
    );

    let exit_code = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("stopping bot");
            stop(&mut child, Duration::from_secs(cli.stop_timeout)).await;
            tracing::info!("bot stopped");
            0
        }
        status = child.wait() => {
            let status = status.context("waiting for bot process")?;
            tracing::warn!(code = status.code(), "bot exited on its own");
            status.code().unwrap_or(1)
        }
    };

    std::process::exit(exit_code);
}

/// `reelay` beside the current executable, falling back to a PATH lookup.
fn default_program() -> PathBuf {
    let name = format!("reelay{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .filter(|candidate| candidate.exists())
        .unwrap_or_else(|| PathBuf::from(name))
}

/// Send SIGTERM and wait up to `grace`, then force kill.
async fn stop(child: &mut Child, grace: Duration) {
    if let Some(pid) = child.id() {
        #[cfg(unix)]
        {
            let _ = std::process::Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .output();
            tracing::info!(pid, "sent SIGTERM");
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
            tracing::info!(pid, "sent kill signal");
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => tracing::info!(code = status.code(), "bot exited"),
        Ok(Err(e)) => tracing::warn!(error = %e, "failed waiting for bot"),
        Err(_) => {
            tracing::warn!(grace_secs = grace.as_secs(), "bot ignored SIGTERM, force killing");
            let _ = child.kill().await;
        }
    }
}
