//! PagerDuty REST API v2 client (reqwest-based).
//!
//! Plain transport: one HTTP request per trait call. Rate limits surface as
//! [`PlatformError::RateLimited`] without a server-supplied delay; the engine
//! decides how long to wait.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use pdsync_core::models::{OnCallIdentity, Page, Schedule};
use pdsync_core::{PlatformError, PlatformResult, ScheduleSource};

use crate::models::{
    ErrorResponse, OnCallUsersResponse, ScheduleListResponse, ScheduleResponse,
};

pub const DEFAULT_BASE_URL: &str = "https://api.pagerduty.com";

const ACCEPT: &str = "application/vnd.pagerduty+json;version=2";

/// Page size for the schedule listing.
pub const PAGE_LIMIT: u64 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// PagerDuty client authenticated with a REST API token.
#[derive(Debug, Clone)]
pub struct PagerDutyClient {
    base_url: String,
    token: String,
    http_client: Client,
}

impl PagerDutyClient {
    /// Create a client against the public PagerDuty API.
    pub fn new(token: impl Into<String>) -> PlatformResult<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("pdsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PlatformError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(DEFAULT_BASE_URL, token, http_client))
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
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> PlatformResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "PagerDuty request");
        let response = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Token token={}", self.token))
            .header("Accept", ACCEPT)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> PlatformResult<T> {
        let status = response.status();
        if status.is_success() {
            let body = response.text().await.map_err(transport_error)?;
            serde_json::from_str(&body)
                .map_err(|e| PlatformError::Decode(format!("failed to parse PagerDuty response: {e}")))
        } else {
            self.handle_error_response(response).await
        }
    }

    async fn handle_error_response<T>(&self, response: reqwest::Response) -> PlatformResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.describe())
            .unwrap_or(body);

        match status {
            StatusCode::TOO_MANY_REQUESTS => {
                warn!("PagerDuty rate limit hit");
                Err(PlatformError::RateLimited { retry_after: None })
            }
            StatusCode::NOT_FOUND => Err(PlatformError::NotFound(message)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(PlatformError::PermissionDenied(format!("HTTP {status}: {message}")))
            }
            _ => Err(PlatformError::Http {
                status: status.as_u16(),
                body: message,
            }),
        }
    }
}

fn transport_error(e: reqwest::Error) -> PlatformError {
    PlatformError::Transport(e.to_string())
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[async_trait]
impl ScheduleSource for PagerDutyClient {
    async fn get_schedule(&self, id: &str) -> PlatformResult<Option<Schedule>> {
        match self.get::<ScheduleResponse>(&format!("/schedules/{id}"), &[]).await {
            Ok(resp) => Ok(Some(resp.schedule.into())),
            Err(PlatformError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_schedules_page(&self, cursor: Option<&str>) -> PlatformResult<Page<Schedule>> {
        let offset: u64 = match cursor {
            Some(c) => c
                .parse()
                .map_err(|_| PlatformError::Decode(format!("invalid schedule page cursor {c:?}")))?,
            None => 0,
        };
        debug!(offset, "Loading PagerDuty schedules page");
        let resp: ScheduleListResponse = self
            .get(
                "/schedules",
                &[("limit", PAGE_LIMIT.to_string()), ("offset", offset.to_string())],
            )
            .await?;

        let next_cursor = resp.more.then(|| (offset + PAGE_LIMIT).to_string());
        Ok(Page {
            items: resp.schedules.into_iter().map(Schedule::from).collect(),
            next_cursor,
        })
    }

    async fn list_on_call(
        &self,
        schedule_id: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> PlatformResult<Vec<OnCallIdentity>> {
        let resp: OnCallUsersResponse = self
            .get(
                &format!("/schedules/{schedule_id}/users"),
                &[("since", timestamp(since)), ("until", timestamp(until))],
            )
            .await?;
        Ok(resp.users.into_iter().map(OnCallIdentity::from).collect())
    }
}
