//! Retrying, paginating access to the remote clients.

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{PlatformResult, SyncError, SyncResult};
use crate::models::{
    Channel, DirectoryAccount, DirectorySnapshot, OnCallIdentity, Page, Schedule,
};
use crate::retry::RetryPolicy;
use crate::traits::{ChatPlatform, ScheduleSource};

/// Both remote clients plus the retry policy and cancellation signal that
/// govern every call made through them.
#[derive(Clone)]
pub struct Remotes {
    pub source: Arc<dyn ScheduleSource>,
    pub platform: Arc<dyn ChatPlatform>,
    pub source_retry: RetryPolicy,
    pub platform_retry: RetryPolicy,
    pub cancel: CancellationToken,
}

impl Remotes {
    /// Bundle clients with the default PagerDuty and Slack retry policies.
    pub fn new(
        source: Arc<dyn ScheduleSource>,
        platform: Arc<dyn ChatPlatform>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            platform,
            source_retry: RetryPolicy::pagerduty(),
            platform_retry: RetryPolicy::slack(),
            cancel,
        }
    }

    /// Run a scheduling-source call under its retry policy.
    pub async fn source_call<F, Fut, T>(&self, operation: &str, f: F) -> PlatformResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        self.source_retry.execute(&self.cancel, operation, f).await
    }

    /// Run a chat-platform call under its retry policy.
    pub async fn platform_call<F, Fut, T>(&self, operation: &str, f: F) -> PlatformResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PlatformResult<T>>,
    {
        self.platform_retry.execute(&self.cancel, operation, f).await
    }

    /// Every schedule known to the source, across all pages.
    pub async fn list_schedules(&self) -> PlatformResult<Vec<Schedule>> {
        let source = &*self.source;
        paginate(&self.source_retry, &self.cancel, "list_schedules", |cursor| async move {
            source.list_schedules_page(cursor.as_deref()).await
        })
        .await
    }

    /// Every active human account, across all pages.
    pub async fn list_accounts(&self) -> PlatformResult<Vec<DirectoryAccount>> {
        let platform = &*self.platform;
        paginate(&self.platform_retry, &self.cancel, "list_accounts", |cursor| async move {
            platform.list_accounts_page(cursor.as_deref()).await
        })
        .await
    }

    /// Every non-archived channel visible to the client, across all pages.
    pub async fn list_channels(&self) -> PlatformResult<Vec<Channel>> {
        let platform = &*self.platform;
        paginate(&self.platform_retry, &self.cancel, "list_channels", |cursor| async move {
            platform.list_channels_page(cursor.as_deref()).await
        })
        .await
    }

    /// Fetch accounts and groups as one snapshot.
    pub async fn fetch_directory_snapshot(&self) -> PlatformResult<DirectorySnapshot> {
        debug!("Fetching Slack users");
        let accounts = self.list_accounts().await?;
        debug!("Fetching Slack user groups");
        let platform = &*self.platform;
        let groups = self
            .platform_call("list_groups", || platform.list_groups())
            .await?;

        info!(
            users = accounts.len(),
            user_groups = groups.len(),
            "Fetched Slack directory data"
        );
        Ok(DirectorySnapshot::new(accounts, groups))
    }

    /// The single person currently on call for `schedule`.
    ///
    /// Anything other than exactly one result is an error, never coerced.
    pub async fn current_on_call(&self, schedule: &Schedule) -> SyncResult<OnCallIdentity> {
        let until = Utc::now();
        let since = until - ChronoDuration::seconds(1);
        let source = &*self.source;
        let mut users = self
            .source_call("list_on_call", || source.list_on_call(&schedule.id, since, until))
            .await
            .map_err(|e| {
                SyncError::remote(
                    format!("failed to get on call user for schedule {:?}", schedule.name),
                    e,
                )
            })?;

        if users.len() != 1 {
            return Err(SyncError::UnexpectedOnCallCount {
                schedule: schedule.name.clone(),
                count: users.len(),
            });
        }
        let user = users.remove(0);
        debug!(
            schedule = %schedule,
            user = %user.name,
            user_id = %user.id,
            "Got on-call user"
        );
        Ok(user)
    }
}

/// Walk a cursor-paginated listing, retrying each page on its own.
async fn paginate<T, F, Fut>(
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    operation: &str,
    mut fetch: F,
) -> PlatformResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = PlatformResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages: u32 = 0;

    loop {
        let page = retry
            .execute(cancel, operation, || fetch(cursor.clone()))
            .await?;
        pages += 1;
        items.extend(page.items);

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    debug!(operation, pages, items = items.len(), "Finished paginated listing");
    Ok(items)
}
