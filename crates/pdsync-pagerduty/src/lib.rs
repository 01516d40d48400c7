//! PagerDuty schedule source for pdsync.

pub mod client;
pub mod models;

pub use client::PagerDutyClient;
