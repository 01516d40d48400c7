//! Long-running reconciliation loop.
//!
//! Two cadences share one cancellation token: the reconciliation cycle and an
//! optional, slower directory refresh. The refresh publishes whole snapshots
//! through a single-slot watch channel; each cycle picks up the latest one
//! without waiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, RunError};
use crate::executor::{FailurePolicy, Syncer};
use crate::models::{DirectorySnapshot, SyncUnit};
use crate::remote::Remotes;

/// Shortest allowed time between reconciliation cycles.
pub const MIN_RUN_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest allowed time between directory refreshes.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Validated daemon cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonSettings {
    run_interval: Duration,
    refresh_interval: Option<Duration>,
}

impl DaemonSettings {
    /// Clamp and validate the requested intervals.
    ///
    /// A zero `refresh_interval` disables refreshing. A non-zero one is
    /// raised to [`MIN_REFRESH_INTERVAL`] and must exceed the run interval.
    pub fn new(run_interval: Duration, refresh_interval: Duration) -> Result<Self, ConfigError> {
        let run_interval = if run_interval < MIN_RUN_INTERVAL {
            warn!(
                requested = ?run_interval,
                minimum = ?MIN_RUN_INTERVAL,
                "Daemon update frequency too low, using minimum"
            );
            MIN_RUN_INTERVAL
        } else {
            run_interval
        };

        let refresh_interval = if refresh_interval.is_zero() {
            None
        } else {
            let clamped = if refresh_interval < MIN_REFRESH_INTERVAL {
                warn!(
                    requested = ?refresh_interval,
                    minimum = ?MIN_REFRESH_INTERVAL,
                    "Slack data update frequency too low, using minimum"
                );
                MIN_REFRESH_INTERVAL
            } else {
                refresh_interval
            };
            if clamped <= run_interval {
                return Err(ConfigError::Interval(format!(
                    "Slack data update frequency ({}s) must be greater than the daemon update frequency ({}s)",
                    clamped.as_secs(),
                    run_interval.as_secs()
                )));
            }
            Some(clamped)
        };

        Ok(Self {
            run_interval,
            refresh_interval,
        })
    }

    #[must_use]
    pub fn run_interval(&self) -> Duration {
        self.run_interval
    }

    #[must_use]
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }
}

/// The scheduler that drives [`Syncer::run_once`] on a fixed cadence.
pub struct Daemon {
    syncer: Syncer,
    units: Vec<SyncUnit>,
    settings: DaemonSettings,
    policy: FailurePolicy,
}

impl Daemon {
    #[must_use]
    pub fn new(syncer: Syncer, units: Vec<SyncUnit>, settings: DaemonSettings, policy: FailurePolicy) -> Self {
        Self {
            syncer,
            units,
            settings,
            policy,
        }
    }

    /// Run until the cancellation token fires. Returns the number of
    /// completed cycles.
    ///
    /// The first cycle starts immediately. Cycle failures are logged and
    /// never end the loop.
    pub async fn run(self, initial: DirectorySnapshot) -> u64 {
        let cancel = self.syncer.remotes().cancel.clone();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(initial));

        let refresher = self.settings.refresh_interval.map(|period| {
            info!(interval = ?period, "Starting Slack data updater");
            tokio::spawn(refresh_directory(
                self.syncer.remotes().clone(),
                period,
                snapshot_tx,
            ))
        });

        info!(
            interval = ?self.settings.run_interval,
            syncs = self.units.len(),
            "Starting daemon"
        );

        let mut ticker = interval(self.settings.run_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles: u64 = 0;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let snapshot = snapshot_rx.borrow().clone();
            debug!(snapshot_fetched_at = %snapshot.fetched_at, "Starting sync cycle");
            match self.syncer.run_once(&self.units, &snapshot, self.policy).await {
                Ok(summary) => {
                    cycles += 1;
                    info!(
                        cycle = cycles,
                        succeeded = summary.reports.len(),
                        failed = summary.failures.len(),
                        "Finished sync cycle"
                    );
                }
                Err(RunError::Cancelled) => break,
                Err(e) => {
                    cycles += 1;
                    error!(cycle = cycles, error = %e, "Sync cycle failed");
                }
            }
        }

        info!("Daemon stopping");
        if let Some(handle) = refresher {
            if let Err(e) = handle.await {
                warn!(error = %e, "Slack data updater terminated abnormally");
            }
        }
        cycles
    }
}

async fn refresh_directory(
    remotes: Remotes,
    period: Duration,
    snapshot_tx: watch::Sender<Arc<DirectorySnapshot>>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = remotes.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match remotes.fetch_directory_snapshot().await {
            Ok(snapshot) => {
                let fetched_at = snapshot.fetched_at;
                snapshot_tx.send_replace(Arc::new(snapshot));
                info!(%fetched_at, "Published new Slack directory snapshot");
            }
            Err(_) if remotes.cancel.is_cancelled() => break,
            Err(e) => warn!(error = %e, "Failed to update Slack data, keeping previous snapshot"),
        }
    }
}
