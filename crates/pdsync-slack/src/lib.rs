//! Slack chat platform for pdsync.

pub mod client;
pub mod models;

pub use client::SlackClient;
