//! Slack Web API client (reqwest-based).
//!
//! Every method answers HTTP 200 with `{"ok": false, "error": "<code>"}` on
//! failure; those codes are mapped onto [`PlatformError`] here so the engine
//! never sees Slack-specific strings. HTTP 429 carries `Retry-After`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use pdsync_core::models::{Channel, DirectoryAccount, DirectoryGroup, JoinOutcome, Page};
use pdsync_core::{ChatPlatform, PlatformError, PlatformResult};

use crate::models::{
    ConversationInfoResponse, ConversationJoinResponse, ConversationsListResponse, Envelope,
    UserGroupUsersResponse, UserGroupsListResponse, UsersListResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

/// Page size for `users.list` and `conversations.list`.
pub const PAGE_LIMIT: u32 = 200;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const ALREADY_IN_CHANNEL: &str = "already_in_channel";
const NOT_SUPPORTED_FOR_CHANNEL_TYPE: &str = "method_not_supported_for_channel_type";

/// Slack client authenticated with a bot token.
#[derive(Debug, Clone)]
pub struct SlackClient {
    base_url: String,
    token: String,
    http_client: Client,
    include_private_channels: bool,
}

impl SlackClient {
    /// Create a client against the public Slack API.
    pub fn new(token: impl Into<String>, include_private_channels: bool) -> PlatformResult<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("pdsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(DEFAULT_BASE_URL, token, http_client)
            .include_private_channels(include_private_channels))
    }

    /// Create a client with a pre-built `reqwest::Client` (for testing).
    #[must_use]
    pub fn with_http_client(
        base_url: impl Into<String>,
        token: impl Into<String>,
        http_client: Client,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            token: token.into(),
            http_client,
            include_private_channels: false,
        }
    }

    /// Also list private channels the token can see.
    #[must_use]
    pub fn include_private_channels(mut self, include: bool) -> Self {
        self.include_private_channels = include;
        self
    }

    fn channel_types(&self) -> &'static str {
        if self.include_private_channels {
            "public_channel,private_channel"
        } else {
            "public_channel"
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn read<T: DeserializeOwned>(&self, method: &str, query: &[(&str, String)]) -> PlatformResult<T> {
        let request = self.http_client.get(self.url(method)).query(query);
        self.call(method, request).await
    }

    async fn write<T: DeserializeOwned>(&self, method: &str, form: &[(&str, String)]) -> PlatformResult<T> {
        let request = self.http_client.post(self.url(method)).form(form);
        self.call(method, request).await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, request: RequestBuilder) -> PlatformResult<T> {
        debug!(method, "Slack API request");
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        self.handle_response(method, response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> PlatformResult<T> {
        let status = response.status();
        if !status.is_success() {
            return self.handle_error_response(response).await;
        }

        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Transport(e.to_string()))?;
        let envelope: Envelope = serde_json::from_str(&body)
            .map_err(|e| PlatformError::Decode(format!("{method}: {e}")))?;
        if !envelope.ok {
            let code = envelope.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(map_error_code(method, code, envelope.needed));
        }
        serde_json::from_str(&body).map_err(|e| PlatformError::Decode(format!("{method}: {e}")))
    }

    async fn handle_error_response<T>(&self, response: reqwest::Response) -> PlatformResult<T> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(retry_after = ?retry_after, "Slack rate limit hit");
                Err(PlatformError::RateLimited { retry_after })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(PlatformError::PermissionDenied(format!("HTTP {status}: {body}")))
            }
            _ => Err(PlatformError::Http {
                status: status.as_u16(),
                body,
            }),
        }
    }
}

/// Map a Web API `error` code onto the engine's error taxonomy.
#[must_use]
pub fn map_error_code(method: &str, code: String, needed: Option<String>) -> PlatformError {
    match code.as_str() {
        "ratelimited" | "rate_limited" => PlatformError::RateLimited { retry_after: None },
        "channel_not_found" | "no_such_subteam" | "subteam_not_found" | "user_not_found" => {
            PlatformError::NotFound(format!("{method}: {code}"))
        }
        "missing_scope" | "not_allowed_token_type" => {
            PlatformError::MissingScope(needed.unwrap_or(code))
        }
        "not_authed" | "invalid_auth" | "account_inactive" | "token_revoked" | "no_permission" => {
            PlatformError::PermissionDenied(format!("{method}: {code}"))
        }
        _ => PlatformError::Api {
            message: format!("{method} failed"),
            code,
        },
    }
}

fn non_empty(cursor: String) -> Option<String> {
    (!cursor.is_empty()).then_some(cursor)
}

#[async_trait]
impl ChatPlatform for SlackClient {
    async fn list_accounts_page(
        &self,
        cursor: Option<&str>,
    ) -> PlatformResult<Page<DirectoryAccount>> {
        let mut query = vec![("limit", PAGE_LIMIT.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let resp: UsersListResponse = self.read("users.list", &query).await?;
        Ok(Page {
            items: resp
                .members
                .into_iter()
                .filter(|u| u.is_human())
                .map(DirectoryAccount::from)
                .collect(),
            next_cursor: non_empty(resp.response_metadata.next_cursor),
        })
    }

    async fn list_groups(&self) -> PlatformResult<Vec<DirectoryGroup>> {
        let resp: UserGroupsListResponse = self.read("usergroups.list", &[]).await?;
        Ok(resp.usergroups.into_iter().map(DirectoryGroup::from).collect())
    }

    async fn list_channels_page(&self, cursor: Option<&str>) -> PlatformResult<Page<Channel>> {
        let mut query = vec![
            ("exclude_archived", "true".to_string()),
            ("limit", PAGE_LIMIT.to_string()),
            ("types", self.channel_types().to_string()),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }
        let resp: ConversationsListResponse = self.read("conversations.list", &query).await?;
        Ok(Page {
            items: resp.channels.into_iter().map(Channel::from).collect(),
            next_cursor: non_empty(resp.response_metadata.next_cursor),
        })
    }

    async fn get_channel(&self, id: &str) -> PlatformResult<Channel> {
        let resp: ConversationInfoResponse = self
            .read("conversations.info", &[("channel", id.to_string())])
            .await?;
        Ok(resp.channel.into())
    }

    async fn join_channel(&self, id: &str) -> PlatformResult<JoinOutcome> {
        let resp: ConversationJoinResponse = match self
            .write("conversations.join", &[("channel", id.to_string())])
            .await
        {
            Ok(resp) => resp,
            // Typically a private channel; the bot has to be invited.
            Err(PlatformError::Api { code, .. }) if code == NOT_SUPPORTED_FOR_CHANNEL_TYPE => {
                return Ok(JoinOutcome::NotPermitted);
            }
            Err(e) => return Err(e),
        };

        let mut outcome = JoinOutcome::Joined;
        let mut unexpected = Vec::new();
        for warning in resp.warnings() {
            if warning == ALREADY_IN_CHANNEL {
                outcome = JoinOutcome::AlreadyMember;
            } else {
                unexpected.push(warning);
            }
        }

        if !unexpected.is_empty() {
            return Err(PlatformError::Api {
                code: "join_warning".to_string(),
                message: format!("joined channel with warnings: {}", unexpected.join("; ")),
            });
        }
        Ok(outcome)
    }

    async fn get_group_members(&self, group_id: &str) -> PlatformResult<Vec<String>> {
        let resp: UserGroupUsersResponse = self
            .read("usergroups.users.list", &[("usergroup", group_id.to_string())])
            .await?;
        Ok(resp.users)
    }

    async fn replace_group_members(&self, group_id: &str, members: &[String]) -> PlatformResult<()> {
        let _: Envelope = self
            .write(
                "usergroups.users.update",
                &[
                    ("usergroup", group_id.to_string()),
                    ("users", members.join(",")),
                ],
            )
            .await?;
        Ok(())
    }

    async fn set_channel_status(&self, channel_id: &str, text: &str) -> PlatformResult<()> {
        let _: Envelope = self
            .write(
                "conversations.setTopic",
                &[("channel", channel_id.to_string()), ("topic", text.to_string())],
            )
            .await?;
        Ok(())
    }
}
