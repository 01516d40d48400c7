//! Interfaces the engine consumes from the outside world.
//!
//! Implementations are plain transport: they do not retry, do not paginate
//! beyond a single page and do not cache. The engine layers all of that on
//! top (see [`crate::retry`], [`crate::remote`] and [`crate::resolve`]).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PlatformResult;
use crate::models::{
    Channel, DirectoryAccount, DirectoryGroup, JoinOutcome, OnCallIdentity, Page, Schedule,
};

/// The rostering system that knows who is on call.
#[async_trait]
pub trait ScheduleSource: Send + Sync {
    /// Look up a schedule by ID. Returns `Ok(None)` if it does not exist.
    async fn get_schedule(&self, id: &str) -> PlatformResult<Option<Schedule>>;

    /// Fetch one page of the full schedule listing.
    async fn list_schedules_page(&self, cursor: Option<&str>) -> PlatformResult<Page<Schedule>>;

    /// List everyone on call for `schedule_id` within `[since, until]`.
    async fn list_on_call(
        &self,
        schedule_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> PlatformResult<Vec<OnCallIdentity>>;
}

/// The communication platform holding accounts, groups and channels.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Fetch one page of human, active accounts.
    async fn list_accounts_page(
        &self,
        cursor: Option<&str>,
    ) -> PlatformResult<Page<DirectoryAccount>>;

    async fn list_groups(&self) -> PlatformResult<Vec<DirectoryGroup>>;

    /// Fetch one page of non-archived channels.
    async fn list_channels_page(&self, cursor: Option<&str>) -> PlatformResult<Page<Channel>>;

    async fn get_channel(&self, id: &str) -> PlatformResult<Channel>;

    async fn join_channel(&self, id: &str) -> PlatformResult<JoinOutcome>;

    async fn get_group_members(&self, group_id: &str) -> PlatformResult<Vec<String>>;

    /// Replace the full membership of a group.
    async fn replace_group_members(&self, group_id: &str, members: &[String])
        -> PlatformResult<()>;

    async fn set_channel_status(&self, channel_id: &str, text: &str) -> PlatformResult<()>;
}
