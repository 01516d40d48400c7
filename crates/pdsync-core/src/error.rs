//! Error types for remote calls, sync units and whole runs.
//!
//! Remote failures carry a transient/permanent classification so the retry
//! wrapper can tell a rate limit apart from everything else.

use std::time::Duration;

use thiserror::Error;

use crate::models::{ChannelRef, GroupRef, ScheduleRef};

/// Error returned by a scheduling source or chat platform client.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The remote API asked us to slow down.
    #[error("rate limited{}", retry_after.map(|d| format!(" (retry after {}s)", d.as_secs())).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The token lacks a scope required for the call.
    #[error("missing scope: {0}")]
    MissingScope(String),

    /// The token is invalid or not allowed to perform the call.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The API answered with an application-level error code.
    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    /// The API answered with an unexpected HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Whether the failure is a rate limit and the call should be retried.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Server-supplied wait before retrying, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Whether the failure is a missing permission rather than a broken call.
    #[must_use]
    pub fn is_permission(&self) -> bool {
        matches!(self, Self::MissingScope(_) | Self::PermissionDenied(_))
    }
}

/// Result type alias for remote calls.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Error that fails a single sync unit.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("schedule {0} not found")]
    ScheduleNotFound(ScheduleRef),

    #[error("user group {0} not found")]
    GroupNotFound(GroupRef),

    #[error("channel {0} not found")]
    ChannelNotFound(ChannelRef),

    #[error("unexpected number of on-call users for schedule {schedule:?}: {count}")]
    UnexpectedOnCallCount { schedule: String, count: usize },

    #[error("failed to find Slack user for PagerDuty user {name} <{email}>")]
    IdentityNotMatched { name: String, email: String },

    #[error("failed to render template: {0}")]
    Render(String),

    #[error("{context}: {source}")]
    Remote {
        context: String,
        #[source]
        source: PlatformError,
    },

    /// The run was cancelled while this unit was in progress.
    #[error("cancelled")]
    Cancelled,
}

impl SyncError {
    /// Wrap a remote failure with what we were doing at the time.
    pub fn remote(context: impl Into<String>, source: PlatformError) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for sync unit execution.
pub type SyncResult<T> = Result<T, SyncError>;

/// Error that aborts a whole reconciliation run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to run sync {unit}: {source}")]
    UnitFailed {
        unit: String,
        #[source]
        source: SyncError,
    },

    #[error("run cancelled")]
    Cancelled,
}

/// Invalid configuration detected before anything runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0}")]
    Invalid(String),

    #[error("failed to parse template {template:?}: {message}")]
    Template { template: String, message: String },

    #[error("invalid interval: {0}")]
    Interval(String),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
