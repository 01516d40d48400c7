//! Execution of sync units.
//!
//! A unit moves through [`SyncPhase`]s in order. Any failure ends the unit;
//! whether it also ends the run depends on the [`FailurePolicy`].

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, error, info, instrument, warn};

use crate::error::{RunError, SyncError, SyncResult};
use crate::groups::{reconcile_groups, DesiredGroups, GroupChange};
use crate::matcher::match_account;
use crate::models::{
    Channel, DirectoryGroup, DirectorySnapshot, JoinOutcome, Schedule, SyncUnit,
};
use crate::remote::Remotes;
use crate::render::{account_reference, placeholder_key, StatusRenderer};
use crate::resolve::{resolve_group, Resolver};

/// Steps of a single unit execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    ResolvingSchedules,
    MatchingIdentities,
    ReconcilingGroups,
    RenderingStatus,
    ApplyingStatus,
    Done,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ResolvingSchedules => "resolving_schedules",
            Self::MatchingIdentities => "matching_identities",
            Self::ReconcilingGroups => "reconciling_groups",
            Self::RenderingStatus => "rendering_status",
            Self::ApplyingStatus => "applying_status",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

/// What to do when a unit fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the run on the first failing unit.
    FailFast,
    /// Log the failure and continue with the remaining units.
    BestEffort,
}

impl FailurePolicy {
    /// Fail-fast for one-shot runs, best-effort for the daemon.
    #[must_use]
    pub fn default_for(daemon: bool) -> Self {
        if daemon {
            Self::BestEffort
        } else {
            Self::FailFast
        }
    }

    /// Explicit `fail_fast` setting wins over the mode default.
    #[must_use]
    pub fn resolve(fail_fast: Option<bool>, daemon: bool) -> Self {
        match fail_fast {
            Some(true) => Self::FailFast,
            Some(false) => Self::BestEffort,
            None => Self::default_for(daemon),
        }
    }
}

/// A schedule with the groups its on-call person belongs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchedule {
    pub schedule: Schedule,
    pub groups: Vec<DirectoryGroup>,
}

/// Outcome of the topic step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// No template configured for the unit.
    Skipped,
    Unchanged { topic: String },
    Updated { previous: String, topic: String },
    /// Dry-run: the topic differs but was not written.
    WouldUpdate { previous: String, topic: String },
}

/// Everything a successful unit did (or would have done).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub unit: String,
    pub groups: Vec<GroupChange>,
    pub status: StatusChange,
}

/// A unit that failed under the best-effort policy.
#[derive(Debug)]
pub struct UnitFailure {
    pub unit: String,
    pub error: SyncError,
}

/// Result of a run that was not aborted.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub reports: Vec<SyncReport>,
    pub failures: Vec<UnitFailure>,
}

impl RunSummary {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs sync units against the remote clients.
pub struct Syncer {
    remotes: Remotes,
    renderer: StatusRenderer,
}

impl Syncer {
    #[must_use]
    pub fn new(remotes: Remotes) -> Self {
        Self {
            remotes,
            renderer: StatusRenderer::new(),
        }
    }

    #[must_use]
    pub fn remotes(&self) -> &Remotes {
        &self.remotes
    }

    /// Run every unit once, in order.
    pub async fn run_once(
        &self,
        units: &[SyncUnit],
        snapshot: &DirectorySnapshot,
        policy: FailurePolicy,
    ) -> Result<RunSummary, RunError> {
        // Fresh resolver per run: name lookups are cached for this run only.
        let resolver = Resolver::new(self.remotes.clone());
        let mut summary = RunSummary::default();

        for unit in units {
            if self.remotes.cancel.is_cancelled() {
                return Err(RunError::Cancelled);
            }

            match self.run_unit(&resolver, unit, snapshot).await {
                Ok(report) => summary.reports.push(report),
                Err(SyncError::Cancelled) => {
                    info!(sync = %unit.name, "Abandoned Slack sync because the run was cancelled");
                    return Err(RunError::Cancelled);
                }
                Err(error) => {
                    if policy == FailurePolicy::FailFast || self.remotes.cancel.is_cancelled() {
                        return Err(RunError::UnitFailed {
                            unit: unit.name.clone(),
                            source: error,
                        });
                    }
                    error!(sync = %unit.name, error = %error, "Failed to run Slack sync");
                    summary.failures.push(UnitFailure {
                        unit: unit.name.clone(),
                        error,
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Run one unit through all phases.
    #[instrument(skip_all, fields(sync = %unit.name))]
    pub async fn run_unit(
        &self,
        resolver: &Resolver,
        unit: &SyncUnit,
        snapshot: &DirectorySnapshot,
    ) -> SyncResult<SyncReport> {
        self.enter(SyncPhase::ResolvingSchedules)?;
        let schedules = resolve_schedules(resolver, unit, snapshot).await?;
        let channel = match &unit.channel {
            Some(reference) => Some(
                resolver
                    .resolve_channel(reference)
                    .await
                    .map_err(|e| SyncError::remote(format!("failed to look up channel {reference}"), e))?
                    .ok_or_else(|| SyncError::ChannelNotFound(reference.clone()))?,
            ),
            None => None,
        };

        self.enter(SyncPhase::MatchingIdentities)?;
        let mut desired = DesiredGroups::new();
        let mut values = BTreeMap::new();
        for resolved in &schedules {
            info!(schedule = %resolved.schedule, "Processing schedule");
            let on_call = self.remotes.current_on_call(&resolved.schedule).await?;
            let (account, matched_by) = match_account(&on_call, &snapshot.accounts).ok_or_else(|| {
                SyncError::IdentityNotMatched {
                    name: on_call.name.clone(),
                    email: on_call.email.clone(),
                }
            })?;
            debug!(
                on_call = %on_call.name,
                slack_user = %account.id,
                matched_by = ?matched_by,
                "Matched on-call user"
            );

            for group in &resolved.groups {
                debug!(slack_user = %account.id, user_group = %group, "Ensuring member for user group");
                desired.ensure_member(group, &account.id);
            }

            values.insert(
                placeholder_key(&resolved.schedule.name),
                account_reference(&account.id, unit.pretend_users),
            );
        }

        self.enter(SyncPhase::ReconcilingGroups)?;
        let groups = reconcile_groups(&self.remotes, &desired, unit.dry_run).await?;

        let (Some(template), Some(channel)) = (&unit.template, channel) else {
            info!("Skipping topic update because template is undefined");
            debug!(phase = %SyncPhase::Done, "Sync phase");
            return Ok(SyncReport {
                unit: unit.name.clone(),
                groups,
                status: StatusChange::Skipped,
            });
        };

        self.enter(SyncPhase::RenderingStatus)?;
        debug!(values = ?values, "Executing template with Slack user IDs by schedule name");
        let topic = self.renderer.render(template, &values)?;

        self.enter(SyncPhase::ApplyingStatus)?;
        let status = self.apply_status(&channel, &topic, unit.dry_run).await?;

        debug!(phase = %SyncPhase::Done, "Sync phase");
        Ok(SyncReport {
            unit: unit.name.clone(),
            groups,
            status,
        })
    }

    /// Log the phase change. A cancelled run abandons the unit here, before
    /// the phase touches either remote.
    fn enter(&self, phase: SyncPhase) -> SyncResult<()> {
        if self.remotes.cancel.is_cancelled() {
            debug!(phase = %phase, "Cancelled before sync phase");
            return Err(SyncError::Cancelled);
        }
        debug!(phase = %phase, "Sync phase");
        Ok(())
    }

    async fn apply_status(&self, channel: &Channel, topic: &str, dry_run: bool) -> SyncResult<StatusChange> {
        let platform = &*self.remotes.platform;

        if dry_run {
            info!(channel_id = %channel.id, "[DRY RUN] Not joining channel");
        } else {
            self.join_channel(channel).await?;
        }

        let current = self
            .remotes
            .platform_call("get_channel", || platform.get_channel(&channel.id))
            .await
            .map_err(|e| SyncError::remote(format!("failed to get channel {}", channel.id), e))?;

        if current.topic == topic {
            debug!(channel_id = %channel.id, "Topic already set correctly");
            return Ok(StatusChange::Unchanged {
                topic: topic.to_string(),
            });
        }

        info!(
            channel_id = %channel.id,
            old_topic = %current.topic,
            new_topic = %topic,
            "Updating topic"
        );
        if dry_run {
            info!(channel_id = %channel.id, "[DRY RUN] Not updating topic");
            return Ok(StatusChange::WouldUpdate {
                previous: current.topic,
                topic: topic.to_string(),
            });
        }

        self.remotes
            .platform_call("set_channel_status", || platform.set_channel_status(&channel.id, topic))
            .await
            .map_err(|e| SyncError::remote("failed to update topic", e))?;
        info!(channel_id = %channel.id, "Topic updated");

        Ok(StatusChange::Updated {
            previous: current.topic,
            topic: topic.to_string(),
        })
    }

    /// Best-effort join: a channel we may not join is a warning, not a failure.
    async fn join_channel(&self, channel: &Channel) -> SyncResult<()> {
        let platform = &*self.remotes.platform;
        match self
            .remotes
            .platform_call("join_channel", || platform.join_channel(&channel.id))
            .await
        {
            Ok(JoinOutcome::Joined) => {
                info!(channel_id = %channel.id, "Joined channel");
                Ok(())
            }
            Ok(JoinOutcome::AlreadyMember) => Ok(()),
            Ok(JoinOutcome::NotPermitted) => {
                warn!(
                    channel_id = %channel.id,
                    "Cannot join channel of this type (likely private); invite pdsync manually"
                );
                Ok(())
            }
            Err(e) if e.is_permission() => {
                warn!(
                    channel_id = %channel.id,
                    error = %e,
                    "Cannot automatically join channel because of missing scope \"channels:join\"; add the scope or invite pdsync manually"
                );
                Ok(())
            }
            Err(e) => Err(SyncError::remote(
                format!("failed to join channel with ID {}", channel.id),
                e,
            )),
        }
    }
}

/// Resolve every configured schedule and its groups; duplicates (same
/// schedule ID) are merged.
async fn resolve_schedules(
    resolver: &Resolver,
    unit: &SyncUnit,
    snapshot: &DirectorySnapshot,
) -> SyncResult<Vec<ResolvedSchedule>> {
    let mut resolved: Vec<ResolvedSchedule> = Vec::with_capacity(unit.schedules.len());

    for binding in &unit.schedules {
        let schedule = resolver
            .resolve_schedule(&binding.schedule)
            .await
            .map_err(|e| SyncError::remote(format!("failed to get schedule {}", binding.schedule), e))?
            .ok_or_else(|| SyncError::ScheduleNotFound(binding.schedule.clone()))?;

        let mut groups = Vec::with_capacity(binding.groups.len());
        for reference in &binding.groups {
            let group = resolve_group(&snapshot.groups, reference)
                .ok_or_else(|| SyncError::GroupNotFound(reference.clone()))?;
            debug!(user_group = %group, schedule = %schedule, "Assigning user group to schedule");
            groups.push(group.clone());
        }

        if let Some(existing) = resolved.iter_mut().find(|r| r.schedule.id == schedule.id) {
            for group in groups {
                if !existing.groups.iter().any(|g| g.id == group.id) {
                    existing.groups.push(group);
                }
            }
        } else {
            resolved.push(ResolvedSchedule { schedule, groups });
        }
    }

    debug!(schedules = resolved.len(), "Resolved PagerDuty schedules");
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_policy_defaults() {
        assert_eq!(FailurePolicy::default_for(false), FailurePolicy::FailFast);
        assert_eq!(FailurePolicy::default_for(true), FailurePolicy::BestEffort);
        assert_eq!(FailurePolicy::resolve(Some(true), true), FailurePolicy::FailFast);
        assert_eq!(FailurePolicy::resolve(Some(false), false), FailurePolicy::BestEffort);
        assert_eq!(FailurePolicy::resolve(None, true), FailurePolicy::BestEffort);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(SyncPhase::ResolvingSchedules.to_string(), "resolving_schedules");
        assert_eq!(SyncPhase::Done.to_string(), "done");
    }
}
