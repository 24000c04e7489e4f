// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for socket transport operations.

use std::io;
use std::time::Duration;

use quarry_core::QuarryError;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors surfaced while connecting, exchanging frames, or binding a listener.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("socket io error: {0}")]
    Io(#[from] io::Error),
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },
    #[error("frame exceeds maximum length")]
    FrameTooLarge,
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("reply carried no status")]
    MissingStatus,
    #[error("status {code}: {message}")]
    Status { code: i32, message: String },
    #[error("expected 1 row, got {actual}")]
    RowCount { actual: usize },
    #[error("failed to bind unix listener at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("existing unix socket {path} is already in use")]
    InUse { path: String },
    #[error("unix socket path {path} is not a socket")]
    NotSocket { path: String },
}

impl From<LinesCodecError> for TransportError {
    fn from(err: LinesCodecError) -> Self {
        match err {
            LinesCodecError::MaxLineLengthExceeded => TransportError::FrameTooLarge,
            LinesCodecError::Io(e) => TransportError::Io(e),
        }
    }
}

impl From<TransportError> for QuarryError {
    fn from(err: TransportError) -> Self {
        QuarryError::Transport {
            message: "transport error".to_string(),
            source: Box::new(err),
        }
    }
}
