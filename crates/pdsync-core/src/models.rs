//! Domain types shared by the reconciliation engine and the remote clients.

use std::fmt;

use chrono::{DateTime, Utc};

/// A configured pointer to an on-call schedule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ScheduleRef {
    Id(String),
    Name(String),
}

impl fmt::Display for ScheduleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{{ID:{id}}}"),
            Self::Name(name) => write!(f, "{{Name:{name:?}}}"),
        }
    }
}

/// A configured pointer to a notification (user) group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupRef {
    Id(String),
    Name(String),
    Handle(String),
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{{ID:{id}}}"),
            Self::Name(name) => write!(f, "{{Name:{name:?}}}"),
            Self::Handle(handle) => write!(f, "{{Handle:{handle}}}"),
        }
    }
}

/// A configured pointer to the channel whose topic carries the status.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    Id(String),
    Name(String),
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{{ID:{id}}}"),
            Self::Name(name) => write!(f, "{{Name:{name:?}}}"),
        }
    }
}

/// A schedule reference together with the groups its on-call person joins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleBinding {
    pub schedule: ScheduleRef,
    pub groups: Vec<GroupRef>,
}

impl ScheduleBinding {
    #[must_use]
    pub fn new(schedule: ScheduleRef) -> Self {
        Self {
            schedule,
            groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_group(mut self, group: GroupRef) -> Self {
        self.groups.push(group);
        self
    }
}

/// One named synchronization job, already validated.
#[derive(Debug, Clone)]
pub struct SyncUnit {
    /// Unique name across a run.
    pub name: String,
    pub schedules: Vec<ScheduleBinding>,
    /// Present if and only if `template` is present.
    pub channel: Option<ChannelRef>,
    pub template: Option<crate::render::StatusTemplate>,
    pub dry_run: bool,
    /// Escape account references in the rendered topic so nobody gets pinged.
    pub pretend_users: bool,
}

/// A schedule as known by the scheduling source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub id: String,
    pub name: String,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ID:{} Name:{:?}}}", self.id, self.name)
    }
}

/// The person currently on call for a schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnCallIdentity {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl fmt::Display for OnCallIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {} Name: {} Email: {}", self.id, self.name, self.email)
    }
}

/// A human account on the communication platform.
///
/// `name` and `real_name` are stored lowercased so that name matching can
/// compare against a lowercased on-call name directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryAccount {
    pub id: String,
    /// Handle / username, lowercased.
    pub name: String,
    /// Full display name, lowercased.
    pub real_name: String,
    pub email: String,
}

impl DirectoryAccount {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: &str,
        real_name: &str,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.to_lowercase(),
            real_name: real_name.to_lowercase(),
            email: email.into(),
        }
    }
}

/// A notification group on the communication platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryGroup {
    pub id: String,
    pub name: String,
    pub handle: String,
}

impl fmt::Display for DirectoryGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ID:{} Name:{:?} Handle:{}}}",
            self.id, self.name, self.handle
        )
    }
}

/// A channel on the communication platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: String,
    pub name: String,
    /// Current topic text; the "status" this tool maintains.
    pub topic: String,
}

/// Outcome of asking the platform to add the bot to a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
    /// The channel type does not allow joining (typically private).
    NotPermitted,
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Opaque cursor for the next page; `None` on the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Accounts and groups fetched together from the platform.
///
/// Published as an immutable value; a refresh replaces the whole snapshot.
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    pub accounts: Vec<DirectoryAccount>,
    pub groups: Vec<DirectoryGroup>,
    pub fetched_at: DateTime<Utc>,
}

impl DirectorySnapshot {
    #[must_use]
    pub fn new(accounts: Vec<DirectoryAccount>, groups: Vec<DirectoryGroup>) -> Self {
        Self {
            accounts,
            groups,
            fetched_at: Utc::now(),
        }
    }
}
