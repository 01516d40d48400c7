//! On-call reconciliation engine.
//!
//! Keeps notification groups and a channel topic on a communication platform
//! in line with who is currently on call in a scheduling system. The engine
//! talks to both systems only through [`ScheduleSource`] and
//! [`ChatPlatform`]; concrete clients live in their own crates.

pub mod daemon;
pub mod error;
pub mod executor;
pub mod groups;
pub mod matcher;
pub mod models;
pub mod remote;
pub mod render;
pub mod resolve;
pub mod retry;
pub mod traits;

pub use daemon::{Daemon, DaemonSettings};
pub use error::{ConfigError, PlatformError, PlatformResult, RunError, SyncError, SyncResult};
pub use executor::{FailurePolicy, RunSummary, StatusChange, SyncReport, Syncer};
pub use models::{
    Channel, ChannelRef, DirectoryAccount, DirectoryGroup, DirectorySnapshot, GroupRef,
    JoinOutcome, OnCallIdentity, Page, Schedule, ScheduleBinding, ScheduleRef, SyncUnit,
};
pub use remote::Remotes;
pub use render::StatusTemplate;
pub use retry::RetryPolicy;
pub use traits::{ChatPlatform, ScheduleSource};
