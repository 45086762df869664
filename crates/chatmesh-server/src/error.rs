//! Error types for the chat router.

use std::path::PathBuf;

use thiserror::Error;

use crate::ipc::DirectoryId;

/// Failures of the shared-state primitives.
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("no unused {0} identifier left")]
    Exhausted(&'static str),

    #[error("directory {0} does not exist")]
    NoSuchDirectory(DirectoryId),
}

/// Fatal errors of a server instance.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("instance is not attached to a directory")]
    NotAttached,

    #[error("instance has no mailbox")]
    NotConnected,

    #[error(transparent)]
    Ipc(#[from] IpcError),

    #[error("server task ended: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
