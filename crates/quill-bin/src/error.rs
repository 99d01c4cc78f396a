// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Failures of the `quill` binary and their exit codes.
//!
//! | code | meaning |
//! |------|---------|
//! | 1 | configuration could not be loaded or was rejected |
//! | 2 | the listener could not be bound |
//! | 3 | the server stopped with an error |
//! | 4 | a report could not be rendered |
//! | 5 | `validate --strict` found warnings |

use thiserror::Error;
use tokio::task::JoinError;

use quill_api::{ConfigError, ServeError};

/// Result type alias for quill-bin operations.
pub type BinResult<T> = Result<T, BinError>;

/// Errors that end a `quill` command.
#[derive(Debug, Error)]
pub enum BinError {
    /// The configuration file could not be read or parsed.
    #[error("Cannot load configuration: {0}")]
    ConfigFile(String),

    /// An environment override or command-line value is invalid.
    #[error("Invalid setting: {0}")]
    Setting(String),

    /// Configuration rejected by validation or the secret policy.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// `validate --strict` found warnings.
    #[error("Strict mode: {0} warning(s) found")]
    StrictWarnings(usize),

    /// The server could not bind or stopped serving.
    #[error(transparent)]
    Server(#[from] ServeError),

    /// The server task panicked or was cancelled.
    #[error("Server task failed: {0}")]
    ServerTask(#[from] JoinError),

    /// A report could not be rendered.
    #[error("Cannot render output: {0}")]
    Output(String),
}

impl BinError {
    /// Creates an invalid-setting error.
    pub fn setting(msg: impl Into<String>) -> Self {
        Self::Setting(msg.into())
    }

    /// Creates an output error.
    pub fn output(msg: impl Into<String>) -> Self {
        Self::Output(msg.into())
    }

    /// Returns the process exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigFile(_) | Self::Setting(_) | Self::Config(_) => 1,
            Self::Server(ServeError::Bind { .. }) => 2,
            Self::Server(ServeError::Serve(_)) | Self::ServerTask(_) => 3,
            Self::Output(_) => 4,
            Self::StrictWarnings(_) => 5,
        }
    }
}

/// File errors carry their `reading ...`/`parsing ...` context chain.
impl From<anyhow::Error> for BinError {
    fn from(err: anyhow::Error) -> Self {
        Self::ConfigFile(format!("{:#}", err))
    }
}

// =============================================================================
// Error Reporting
// =============================================================================

/// Reports an error with its cause chain on stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {}", error);

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {}", cause);
        source = cause.source();
    }
}

/// Reports an error and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::net::SocketAddr;

    fn bind_error() -> BinError {
        ServeError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        }
        .into()
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(BinError::setting("QUILL_API_PORT").exit_code(), 1);
        assert_eq!(BinError::from(ConfigError::MissingSecret).exit_code(), 1);
        assert_eq!(bind_error().exit_code(), 2);
        assert_eq!(
            BinError::from(ServeError::Serve(io::Error::other("accept failed"))).exit_code(),
            3
        );
        assert_eq!(BinError::output("yaml").exit_code(), 4);
        assert_eq!(BinError::StrictWarnings(2).exit_code(), 5);
    }

    #[test]
    fn test_bind_error_keeps_socket_cause() {
        let err = bind_error();
        assert_eq!(err.to_string(), "Failed to bind 127.0.0.1:8080");
        let cause = std::error::Error::source(&err).map(|c| c.to_string());
        assert_eq!(cause.as_deref(), Some("address in use"));
    }

    #[test]
    fn test_anyhow_keeps_chain() {
        let err = anyhow::anyhow!("disk on fire").context("reading quill.yaml");
        let bin: BinError = err.into();
        assert_eq!(bin.exit_code(), 1);
        assert_eq!(
            bin.to_string(),
            "Cannot load configuration: reading quill.yaml: disk on fire"
        );
    }

    #[tokio::test]
    async fn test_panicked_server_task() {
        let joined = tokio::spawn(async { panic!("boom") }).await.unwrap_err();
        let err = BinError::from(joined);
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().starts_with("Server task failed"));
    }
}
