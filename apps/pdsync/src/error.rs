//! CLI error types and exit codes.

use thiserror::Error;

use pdsync_core::{ConfigError, PlatformError, RunError};

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("failed to create {client} client: {source}")]
    Client {
        client: &'static str,
        #[source]
        source: PlatformError,
    },

    #[error("failed to fetch Slack users and user groups: {0}")]
    Directory(#[source] PlatformError),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

impl CliError {
    /// Process exit code. Every failure exits with 1.
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Print the error to stderr.
    ///
    /// Logging may not be initialized yet, so this bypasses tracing.
    pub fn print(&self) {
        eprintln!("Error: {self}");
    }
}
