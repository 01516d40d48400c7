//! Resolution of configured references against live directory data.
//!
//! A reference resolves by ID if it carries one, otherwise by name,
//! otherwise (groups only) by handle. Duplicates in the directory are not an
//! error: the first entry in directory order wins.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{PlatformError, PlatformResult};
use crate::models::{
    Channel, ChannelRef, DirectoryGroup, GroupRef, Schedule, ScheduleRef,
};
use crate::remote::Remotes;

/// A single lookup key extracted from a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    Id(&'a str),
    Name(&'a str),
    Handle(&'a str),
}

/// Something a [`Lookup`] can be matched against.
pub trait DirectoryEntry {
    fn entry_id(&self) -> &str;
    fn entry_name(&self) -> &str;
    fn entry_handle(&self) -> Option<&str> {
        None
    }

    fn matches(&self, lookup: Lookup<'_>) -> bool {
        match lookup {
            Lookup::Id(id) => self.entry_id() == id,
            Lookup::Name(name) => self.entry_name() == name,
            Lookup::Handle(handle) => self.entry_handle() == Some(handle),
        }
    }
}

impl DirectoryEntry for Schedule {
    fn entry_id(&self) -> &str {
        &self.id
    }
    fn entry_name(&self) -> &str {
        &self.name
    }
}

impl DirectoryEntry for Channel {
    fn entry_id(&self) -> &str {
        &self.id
    }
    fn entry_name(&self) -> &str {
        &self.name
    }
}

impl DirectoryEntry for DirectoryGroup {
    fn entry_id(&self) -> &str {
        &self.id
    }
    fn entry_name(&self) -> &str {
        &self.name
    }
    fn entry_handle(&self) -> Option<&str> {
        Some(&self.handle)
    }
}

impl ScheduleRef {
    #[must_use]
    pub fn lookup(&self) -> Lookup<'_> {
        match self {
            Self::Id(id) => Lookup::Id(id),
            Self::Name(name) => Lookup::Name(name),
        }
    }
}

impl GroupRef {
    #[must_use]
    pub fn lookup(&self) -> Lookup<'_> {
        match self {
            Self::Id(id) => Lookup::Id(id),
            Self::Name(name) => Lookup::Name(name),
            Self::Handle(handle) => Lookup::Handle(handle),
        }
    }
}

impl ChannelRef {
    #[must_use]
    pub fn lookup(&self) -> Lookup<'_> {
        match self {
            Self::Id(id) => Lookup::Id(id),
            Self::Name(name) => Lookup::Name(name),
        }
    }
}

/// First entry matching `lookup`, in slice order.
pub fn find_entry<'a, T: DirectoryEntry>(candidates: &'a [T], lookup: Lookup<'_>) -> Option<&'a T> {
    candidates.iter().find(|candidate| candidate.matches(lookup))
}

/// Resolve a group reference against a snapshot of groups.
#[must_use]
pub fn resolve_group<'a>(groups: &'a [DirectoryGroup], reference: &GroupRef) -> Option<&'a DirectoryGroup> {
    find_entry(groups, reference.lookup())
}

/// Per-run resolver for schedules and channels.
///
/// Name lookups need the full listing; it is fetched on first use and kept
/// for the lifetime of this resolver, which is one reconciliation run.
pub struct Resolver {
    remotes: Remotes,
    schedules: Mutex<Option<Arc<Vec<Schedule>>>>,
    channels: Mutex<Option<Arc<Vec<Channel>>>>,
}

impl Resolver {
    #[must_use]
    pub fn new(remotes: Remotes) -> Self {
        Self {
            remotes,
            schedules: Mutex::new(None),
            channels: Mutex::new(None),
        }
    }

    /// Resolve a schedule. `Ok(None)` means it does not exist.
    pub async fn resolve_schedule(&self, reference: &ScheduleRef) -> PlatformResult<Option<Schedule>> {
        match reference {
            ScheduleRef::Id(id) => {
                debug!(schedule_id = %id, "Looking up schedule by ID");
                let source = &*self.remotes.source;
                match self
                    .remotes
                    .source_call("get_schedule", || source.get_schedule(id))
                    .await
                {
                    Ok(schedule) => Ok(schedule),
                    Err(PlatformError::NotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            }
            ScheduleRef::Name(name) => {
                let all = self.all_schedules().await?;
                Ok(find_entry(&all, Lookup::Name(name)).cloned())
            }
        }
    }

    /// Resolve a channel. `Ok(None)` means it does not exist or is not visible.
    pub async fn resolve_channel(&self, reference: &ChannelRef) -> PlatformResult<Option<Channel>> {
        match reference {
            ChannelRef::Id(id) => {
                let platform = &*self.remotes.platform;
                match self
                    .remotes
                    .platform_call("get_channel", || platform.get_channel(id))
                    .await
                {
                    Ok(channel) => Ok(Some(channel)),
                    Err(PlatformError::NotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            }
            ChannelRef::Name(name) => {
                let all = self.all_channels().await?;
                Ok(find_entry(&all, Lookup::Name(name)).cloned())
            }
        }
    }

    async fn all_schedules(&self) -> PlatformResult<Arc<Vec<Schedule>>> {
        let mut cached = self.schedules.lock().await;
        if let Some(all) = cached.as_ref() {
            return Ok(all.clone());
        }
        debug!("Collecting all PagerDuty schedules");
        let all = Arc::new(self.remotes.list_schedules().await?);
        *cached = Some(all.clone());
        Ok(all)
    }

    async fn all_channels(&self) -> PlatformResult<Arc<Vec<Channel>>> {
        let mut cached = self.channels.lock().await;
        if let Some(all) = cached.as_ref() {
            return Ok(all.clone());
        }
        debug!("Collecting all Slack channels");
        let all = Arc::new(self.remotes.list_channels().await?);
        *cached = Some(all.clone());
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, name: &str, handle: &str) -> DirectoryGroup {
        DirectoryGroup {
            id: id.into(),
            name: name.into(),
            handle: handle.into(),
        }
    }

    #[test]
    fn test_resolve_group_by_each_key() {
        let groups = vec![
            group("S1", "Backend On-Call", "backend-oncall"),
            group("S2", "Frontend On-Call", "frontend-oncall"),
        ];

        assert_eq!(resolve_group(&groups, &GroupRef::Id("S2".into())).unwrap().id, "S2");
        assert_eq!(
            resolve_group(&groups, &GroupRef::Name("Backend On-Call".into())).unwrap().id,
            "S1"
        );
        assert_eq!(
            resolve_group(&groups, &GroupRef::Handle("frontend-oncall".into())).unwrap().id,
            "S2"
        );
        assert!(resolve_group(&groups, &GroupRef::Name("Nope".into())).is_none());
    }

    #[test]
    fn test_id_lookup_never_matches_on_name() {
        // A group whose *name* equals the requested ID must not match.
        let groups = vec![group("S1", "S2", "s2")];
        assert!(resolve_group(&groups, &GroupRef::Id("S2".into())).is_none());
    }

    #[test]
    fn test_duplicates_resolve_to_first_entry() {
        let groups = vec![
            group("S1", "dup", "a"),
            group("S2", "dup", "b"),
        ];
        for _ in 0..3 {
            assert_eq!(resolve_group(&groups, &GroupRef::Name("dup".into())).unwrap().id, "S1");
        }
    }

    #[test]
    fn test_schedule_and_channel_have_no_handle() {
        let schedule = Schedule {
            id: "P1".into(),
            name: "Backend".into(),
        };
        assert!(!schedule.matches(Lookup::Handle("Backend")));
        assert!(schedule.matches(Lookup::Name("Backend")));
    }
}
