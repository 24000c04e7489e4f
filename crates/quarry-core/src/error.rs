// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Quarry extension framework.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type used across the extension server and its collaborators.
#[derive(Debug, Error)]
pub enum QuarryError {
    /// A plugin declared a registry outside the fixed category set.
    ///
    /// This is a configuration error: callers are expected to abort rather
    /// than continue with the plugin silently dropped.
    #[error("invalid registry name: {name}")]
    InvalidRegistry { name: String },

    /// The host answered the registration request with a nonzero status.
    #[error("status {code} registering extension: {message}")]
    Registration { code: i32, message: String },

    /// Transport-level failure talking to the host.
    #[error("{message}: {source}")]
    Transport {
        message: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The listening endpoint could not be opened.
    #[error("opening server socket ({}): {source}", path.display())]
    Listen {
        path: PathBuf,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The watchdog could not reach the host.
    #[error("extension ping failed: {source}")]
    Liveness {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The watchdog reached the host but it reported an unhealthy status.
    #[error("ping returned status {code}: {message}")]
    PingStatus { code: i32, message: String },

    /// Plugin registration was attempted after the server started.
    #[error("plugins cannot be registered after the server has started")]
    AlreadyStarted,

    /// A required setting is missing or unusable at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error returned by plugin callbacks (table generation, row mutation,
/// config generation, log delivery).
///
/// Plugin variants translate these into a nonzero status response; the
/// dispatcher never inspects them.
#[derive(Debug, Error)]
pub enum PluginError {
    /// The request was missing a required key or carried a malformed value.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A row identifier did not address an existing row.
    #[error("row {id} out of range (table has {len} rows)")]
    RowOutOfRange { id: i64, len: usize },

    /// JSON payload could not be decoded or encoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Free-form failure reported by plugin business logic.
    #[error("{0}")]
    Failed(String),
}
