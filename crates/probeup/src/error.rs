use std::{io::Error as IoError, time::Duration};

use thiserror::Error;

/// Failure to hand an event to the output stream
#[derive(Debug, Clone, Error)]
pub enum EmitError {
    #[error("event reader did not accept an event within {0:?}")]
    Timeout(Duration),
    #[error("event stream closed")]
    Closed,
}

/// Errors that end the daemon
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("{0:#}")]
    Io(#[from] IoError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error("Invalid configuration: {0:#}")]
    Config(anyhow::Error),
}
