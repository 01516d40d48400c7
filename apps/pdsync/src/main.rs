//! pdsync - sync PagerDuty on-call schedules to Slack
//!
//! Polls PagerDuty schedules for the people currently on call, keeps Slack
//! user groups in line with them and renders a channel topic from a template.
//! Runs once by default; `--daemon` keeps it running on a fixed cadence.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use pdsync_core::{
    Daemon, DaemonSettings, DirectorySnapshot, FailurePolicy, Remotes, SyncUnit, Syncer,
};
use pdsync_pagerduty::PagerDutyClient;
use pdsync_slack::SlackClient;

mod config;
mod error;
mod logging;

use config::Config;
use error::{CliError, CliResult};
use logging::LogFormat;

/// Sync PagerDuty on-call schedules to Slack user groups and channel topics
#[derive(Debug, Parser)]
#[command(name = "pdsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PagerDuty REST API token
    #[arg(long, env = "PAGERDUTY_TOKEN", hide_env_values = true)]
    pagerduty_token: String,

    /// Slack bot token
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    slack_token: String,

    /// YAML file describing one or more Slack syncs
    #[arg(long, value_name = "FILE", conflicts_with_all = ["schedules", "channel_name", "channel_id", "template", "template_file"])]
    config: Option<PathBuf>,

    /// Schedule specifier, e.g. "name=Backend;userGroup=handle=backend-oncall" (repeatable)
    #[arg(long = "schedule", value_name = "SPEC")]
    schedules: Vec<String>,

    /// Name of the channel whose topic to update
    #[arg(long, conflicts_with = "channel_id")]
    channel_name: Option<String>,

    /// ID of the channel whose topic to update
    #[arg(long)]
    channel_id: Option<String>,

    /// Topic template; {{.ScheduleName}} is replaced by the on-call Slack user ID
    #[arg(long, conflicts_with = "template_file")]
    template: Option<String>,

    /// File containing the topic template
    #[arg(long, value_name = "FILE")]
    template_file: Option<PathBuf>,

    /// Escape user IDs in the topic so nobody gets notified
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pretend_users: Option<bool>,

    /// Log intended changes instead of applying them
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    dry_run: Option<bool>,

    /// Also look up private channels by name
    #[arg(long)]
    include_private_channels: bool,

    /// Keep running and sync periodically
    #[arg(long)]
    daemon: bool,

    /// How often to sync in daemon mode (minimum 1m)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "5m")]
    daemon_update_frequency: Duration,

    /// How often to refresh Slack users and user groups in daemon mode (0 disables, minimum 10m)
    #[arg(long, value_parser = humantime::parse_duration, default_value = "0s")]
    daemon_slack_data_update_frequency: Duration,

    /// Stop at the first failing sync (default: on for one-shot runs, off for the daemon)
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    fail_fast: Option<bool>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    logging::init_logging(cli.log_format, logging::DEFAULT_FILTER)?;

    let units = load_units(&cli)?;
    let policy = FailurePolicy::resolve(cli.fail_fast, cli.daemon);
    let settings = if cli.daemon {
        Some(DaemonSettings::new(
            cli.daemon_update_frequency,
            cli.daemon_slack_data_update_frequency,
        )?)
    } else {
        None
    };

    let pagerduty = PagerDutyClient::new(cli.pagerduty_token.as_str()).map_err(|source| {
        CliError::Client {
            client: "PagerDuty",
            source,
        }
    })?;
    let slack = SlackClient::new(cli.slack_token.as_str(), cli.include_private_channels)
        .map_err(|source| CliError::Client {
            client: "Slack",
            source,
        })?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let remotes = Remotes::new(Arc::new(pagerduty), Arc::new(slack), cancel);
    let snapshot = remotes
        .fetch_directory_snapshot()
        .await
        .map_err(CliError::Directory)?;
    let syncer = Syncer::new(remotes);

    match settings {
        Some(settings) => {
            Daemon::new(syncer, units, settings, policy).run(snapshot).await;
            Ok(())
        }
        None => sync_once(&syncer, &units, &snapshot, policy).await,
    }
}

/// One pass over every sync. Only an aborted run is an error; failures
/// under the best-effort policy have already been logged per sync.
async fn sync_once(
    syncer: &Syncer,
    units: &[SyncUnit],
    snapshot: &DirectorySnapshot,
    policy: FailurePolicy,
) -> CliResult<()> {
    let summary = syncer.run_once(units, snapshot, policy).await?;
    info!(
        succeeded = summary.reports.len(),
        failed = summary.failures.len(),
        "Finished"
    );
    Ok(())
}

fn load_units(cli: &Cli) -> CliResult<Vec<SyncUnit>> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => {
            let template = match &cli.template_file {
                Some(path) => Some(std::fs::read_to_string(path).map_err(|e| CliError::Io {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?),
                None => cli.template.clone(),
            };
            Config::single(
                &cli.schedules,
                cli.channel_id.clone(),
                cli.channel_name.clone(),
                template,
            )?
        }
    };
    config.apply_overrides(cli.dry_run, cli.pretend_users);
    Ok(config.into_units()?)
}

/// Cancel `token` on Ctrl+C or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
    token.cancel();
}
