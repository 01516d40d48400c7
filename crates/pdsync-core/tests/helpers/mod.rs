//! In-memory scheduling source and chat platform for engine tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use pdsync_core::models::{
    Channel, ChannelRef, DirectoryAccount, DirectoryGroup, DirectorySnapshot, GroupRef,
    JoinOutcome, OnCallIdentity, Page, Schedule, ScheduleBinding, ScheduleRef, SyncUnit,
};
use pdsync_core::render::StatusTemplate;
use pdsync_core::{ChatPlatform, PlatformError, PlatformResult, Remotes, ScheduleSource, Syncer};

#[derive(Default)]
pub struct FakeSource {
    pub schedules: Vec<Schedule>,
    pub on_call: Mutex<HashMap<String, Vec<OnCallIdentity>>>,
    pub rate_limit_on_call: AtomicBool,
    /// Fired from inside `list_on_call`, as a signal arriving mid-unit would.
    pub cancel_on_call: Mutex<Option<CancellationToken>>,
    pub get_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl FakeSource {
    pub fn with_schedule(mut self, id: &str, name: &str) -> Self {
        self.schedules.push(Schedule {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    pub fn set_on_call(&self, schedule_id: &str, people: Vec<OnCallIdentity>) {
        self.on_call
            .lock()
            .unwrap()
            .insert(schedule_id.to_string(), people);
    }
}

#[async_trait]
impl ScheduleSource for FakeSource {
    async fn get_schedule(&self, id: &str) -> PlatformResult<Option<Schedule>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.schedules.iter().find(|s| s.id == id).cloned())
    }

    async fn list_schedules_page(&self, cursor: Option<&str>) -> PlatformResult<Page<Schedule>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        // One schedule per page to exercise pagination.
        let offset: usize = cursor.map_or(0, |c| c.parse().unwrap());
        let items: Vec<Schedule> = self.schedules.iter().skip(offset).take(1).cloned().collect();
        let next_cursor = (offset + 1 < self.schedules.len()).then(|| (offset + 1).to_string());
        Ok(Page { items, next_cursor })
    }

    async fn list_on_call(
        &self,
        schedule_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> PlatformResult<Vec<OnCallIdentity>> {
        assert!(since < until);
        if self.rate_limit_on_call.load(Ordering::SeqCst) {
            return Err(PlatformError::RateLimited { retry_after: None });
        }
        if let Some(token) = self.cancel_on_call.lock().unwrap().as_ref() {
            token.cancel();
        }
        Ok(self
            .on_call
            .lock()
            .unwrap()
            .get(schedule_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakePlatform {
    pub accounts: Mutex<Vec<DirectoryAccount>>,
    pub groups: Vec<DirectoryGroup>,
    pub channels: Mutex<Vec<Channel>>,
    pub members: Mutex<HashMap<String, Vec<String>>>,
    /// `Some(code)` makes every join fail with that Slack error code.
    pub join_error: Mutex<Option<String>>,
    pub join_not_permitted: AtomicBool,
    pub joined: Mutex<Vec<String>>,
    pub join_calls: AtomicUsize,
    /// Makes `list_groups` fail with a server error.
    pub fail_list_groups: AtomicBool,
    pub list_groups_calls: AtomicUsize,
    pub replaced: Mutex<Vec<(String, Vec<String>)>>,
    pub topics_set: Mutex<Vec<(String, String)>>,
}

impl FakePlatform {
    pub fn with_account(self, id: &str, name: &str, real_name: &str, email: &str) -> Self {
        self.accounts
            .lock()
            .unwrap()
            .push(DirectoryAccount::new(id, name, real_name, email));
        self
    }

    pub fn with_group(mut self, id: &str, name: &str, handle: &str, members: &[&str]) -> Self {
        self.groups.push(DirectoryGroup {
            id: id.into(),
            name: name.into(),
            handle: handle.into(),
        });
        self.members.lock().unwrap().insert(
            id.to_string(),
            members.iter().map(|m| (*m).to_string()).collect(),
        );
        self
    }

    pub fn with_channel(self, id: &str, name: &str, topic: &str) -> Self {
        self.channels.lock().unwrap().push(Channel {
            id: id.into(),
            name: name.into(),
            topic: topic.into(),
        });
        self
    }

    pub fn snapshot(&self) -> DirectorySnapshot {
        DirectorySnapshot::new(self.accounts.lock().unwrap().clone(), self.groups.clone())
    }

    /// Group replacements plus topic writes.
    pub fn mutations(&self) -> usize {
        self.replaced.lock().unwrap().len() + self.topics_set.lock().unwrap().len()
    }

    pub fn topic(&self, channel_id: &str) -> String {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == channel_id)
            .map(|c| c.topic.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn list_accounts_page(
        &self,
        _cursor: Option<&str>,
    ) -> PlatformResult<Page<DirectoryAccount>> {
        Ok(Page::last(self.accounts.lock().unwrap().clone()))
    }

    async fn list_groups(&self) -> PlatformResult<Vec<DirectoryGroup>> {
        self.list_groups_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_groups.load(Ordering::SeqCst) {
            return Err(PlatformError::Http {
                status: 500,
                body: "internal_error".into(),
            });
        }
        Ok(self.groups.clone())
    }

    async fn list_channels_page(&self, _cursor: Option<&str>) -> PlatformResult<Page<Channel>> {
        Ok(Page::last(self.channels.lock().unwrap().clone()))
    }

    async fn get_channel(&self, id: &str) -> PlatformResult<Channel> {
        self.channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound(format!("channel_not_found: {id}")))
    }

    async fn join_channel(&self, id: &str) -> PlatformResult<JoinOutcome> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.join_error.lock().unwrap().clone() {
            return Err(match code.as_str() {
                "missing_scope" => PlatformError::MissingScope(code),
                _ => PlatformError::Api {
                    message: code.clone(),
                    code,
                },
            });
        }
        if self.join_not_permitted.load(Ordering::SeqCst) {
            return Ok(JoinOutcome::NotPermitted);
        }
        let mut joined = self.joined.lock().unwrap();
        if joined.iter().any(|c| c == id) {
            Ok(JoinOutcome::AlreadyMember)
        } else {
            joined.push(id.to_string());
            Ok(JoinOutcome::Joined)
        }
    }

    async fn get_group_members(&self, group_id: &str) -> PlatformResult<Vec<String>> {
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_group_members(&self, group_id: &str, members: &[String]) -> PlatformResult<()> {
        self.replaced
            .lock()
            .unwrap()
            .push((group_id.to_string(), members.to_vec()));
        self.members
            .lock()
            .unwrap()
            .insert(group_id.to_string(), members.to_vec());
        Ok(())
    }

    async fn set_channel_status(&self, channel_id: &str, text: &str) -> PlatformResult<()> {
        self.topics_set
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        let mut channels = self.channels.lock().unwrap();
        if let Some(channel) = channels.iter_mut().find(|c| c.id == channel_id) {
            channel.topic = text.to_string();
        }
        Ok(())
    }
}

pub fn person(name: &str, email: &str) -> OnCallIdentity {
    OnCallIdentity {
        id: format!("P-{name}"),
        name: name.into(),
        email: email.into(),
    }
}

pub fn syncer(source: &Arc<FakeSource>, platform: &Arc<FakePlatform>) -> (Syncer, CancellationToken) {
    let cancel = CancellationToken::new();
    let remotes = Remotes::new(source.clone(), platform.clone(), cancel.clone());
    (Syncer::new(remotes), cancel)
}

pub fn unit(
    name: &str,
    schedules: Vec<ScheduleBinding>,
    channel: Option<ChannelRef>,
    template: Option<&str>,
) -> SyncUnit {
    SyncUnit {
        name: name.into(),
        schedules,
        channel,
        template: template.map(|t| StatusTemplate::parse(t).unwrap()),
        dry_run: false,
        pretend_users: false,
    }
}

/// The `oncall-eng` sync: schedule "Backend" into group handle
/// `backend-oncall`, topic "Backend: {{.Backend}}" in channel "eng".
pub fn oncall_eng() -> (Arc<FakeSource>, Arc<FakePlatform>, SyncUnit) {
    let source = FakeSource::default().with_schedule("P1", "Backend");
    source.set_on_call("P1", vec![person("Alice Smith", "alice@example.com")]);

    let platform = FakePlatform::default()
        .with_account("U1", "alice", "Alice Smith", "alice@example.com")
        .with_account("U2", "bob", "Bob Jones", "bob@example.com")
        .with_group("S1", "Backend On-Call", "backend-oncall", &[])
        .with_channel("C1", "eng", "");

    let unit = unit(
        "oncall-eng",
        vec![ScheduleBinding::new(ScheduleRef::Name("Backend".into()))
            .with_group(GroupRef::Handle("backend-oncall".into()))],
        Some(ChannelRef::Name("eng".into())),
        Some("Backend: {{.Backend}}"),
    );

    (Arc::new(source), Arc::new(platform), unit)
}
