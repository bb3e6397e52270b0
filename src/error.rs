//! Error types for scanning, prover sessions, configuration and the host protocol

use crate::parser::Position;
use std::io;
use thiserror::Error;

/// Result type for sentence scanning
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type for anything that talks to a prover session
pub type SessionResult<T> = Result<T, SessionError>;

/// Malformed script text that stops the scanner from advancing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("comment opened at {at} is never closed")]
    UnmatchedComment { at: Position },

    #[error("comment close at {at} has no matching open")]
    UnmatchedCommentClose { at: Position },

    #[error("string literal opened at {at} is never closed")]
    UnterminatedString { at: Position },
}

/// Failures of the session itself, as opposed to the prover rejecting a
/// sentence. These are fatal for the current session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no prover session is running")]
    NotRunning,

    #[error("failed to launch prover `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("prover i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed prover reply: {0}")]
    Protocol(String),

    #[error("prover session closed unexpectedly")]
    Disconnected,

    #[error("prover session failed: {message}")]
    Failed { message: String },
}

impl SessionError {
    pub fn failed(message: impl Into<String>) -> Self {
        SessionError::Failed {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        SessionError::Protocol(message.into())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Protocol(err.to_string())
    }
}

/// Problems loading the configuration file or prover command line.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("no prover command configured")]
    EmptyCommand,

    #[error("cannot split prover command `{0}`")]
    BadCommand(String),
}

/// Reasons a host request could not be served.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("unknown document `{0}`")]
    UnknownDocument(String),

    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}
