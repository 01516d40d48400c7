//! Slack Web API wire types (the subset pdsync reads).

use serde::Deserialize;

use pdsync_core::models::{Channel, DirectoryAccount, DirectoryGroup};

/// Fields every Web API response carries.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Scope the call needed, present on `missing_scope`.
    #[serde(default)]
    pub needed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub profile: UserProfile,
}

/// Slackbot is not flagged `is_bot` but is never a person.
const SLACKBOT_ID: &str = "USLACKBOT";

impl User {
    #[must_use]
    pub fn is_human(&self) -> bool {
        !self.deleted && !self.is_bot && self.id != SLACKBOT_ID
    }
}

impl From<User> for DirectoryAccount {
    fn from(u: User) -> Self {
        DirectoryAccount::new(u.id, &u.name, &u.real_name, u.profile.email)
    }
}

/// `users.list`
#[derive(Debug, Deserialize)]
pub struct UsersListResponse {
    #[serde(default)]
    pub members: Vec<User>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

#[derive(Debug, Deserialize)]
pub struct UserGroup {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub handle: String,
}

impl From<UserGroup> for DirectoryGroup {
    fn from(g: UserGroup) -> Self {
        Self {
            id: g.id,
            name: g.name,
            handle: g.handle,
        }
    }
}

/// `usergroups.list`
#[derive(Debug, Deserialize)]
pub struct UserGroupsListResponse {
    #[serde(default)]
    pub usergroups: Vec<UserGroup>,
}

/// `usergroups.users.list`
#[derive(Debug, Deserialize)]
pub struct UserGroupUsersResponse {
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub topic: Topic,
}

impl From<Conversation> for Channel {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            name: c.name,
            topic: c.topic.value,
        }
    }
}

/// `conversations.list`
#[derive(Debug, Deserialize)]
pub struct ConversationsListResponse {
    #[serde(default)]
    pub channels: Vec<Conversation>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

/// `conversations.info`
#[derive(Debug, Deserialize)]
pub struct ConversationInfoResponse {
    pub channel: Conversation,
}

/// `conversations.join`
#[derive(Debug, Deserialize)]
pub struct ConversationJoinResponse {
    #[serde(default)]
    pub warning: Option<String>,
    #[serde(default)]
    pub response_metadata: ResponseMetadata,
}

impl ConversationJoinResponse {
    /// Top-level and metadata warnings, deduplicated, empty ones dropped.
    #[must_use]
    pub fn warnings(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for w in self
            .warning
            .iter()
            .map(String::as_str)
            .chain(self.response_metadata.warnings.iter().map(String::as_str))
        {
            if !w.is_empty() && !out.contains(&w) {
                out.push(w);
            }
        }
        out
    }
}
