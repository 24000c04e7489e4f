// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol types exchanged between the extension and the host.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::PluginError;

/// One result row: column name to stringified value.
pub type Row = BTreeMap<String, String>;

/// One plugin invocation: `action` plus action-specific keys.
pub type PluginRequest = BTreeMap<String, String>;

/// Schema description a plugin exposes to the host (e.g. column definitions).
pub type PluginRoutes = Vec<Row>;

/// Full capability surface: registry category to plugin name to routes.
pub type ExtensionRegistry = BTreeMap<String, BTreeMap<String, PluginRoutes>>;

/// Identifier the host assigns to a registered extension.
pub type ExtensionUuid = u64;

/// The closed set of registries a plugin may be registered under.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RegistryCategory {
    Table,
    Logger,
    Config,
    Distributed,
}

/// Status attached to every reply. Code 0 means success.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtensionStatus {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    /// Set by the host when answering a registration request.
    #[serde(default)]
    pub uuid: ExtensionUuid,
}

impl ExtensionStatus {
    /// Successful status with the conventional "OK" message.
    pub fn ok() -> Self {
        Self {
            code: 0,
            message: "OK".to_string(),
            uuid: 0,
        }
    }

    /// Failure status with code 1.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            message: message.into(),
            uuid: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Result of one plugin invocation: a status and an ordered row set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtensionResponse {
    pub status: ExtensionStatus,
    #[serde(default)]
    pub response: Vec<Row>,
}

impl ExtensionResponse {
    /// Successful response carrying `rows`.
    pub fn ok(rows: Vec<Row>) -> Self {
        Self {
            status: ExtensionStatus::ok(),
            response: rows,
        }
    }

    /// Failed response with code 1 and no rows.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ExtensionStatus::error(message),
            response: Vec::new(),
        }
    }

    /// Converts a plugin callback result into a response, mapping any
    /// [`PluginError`] to a code-1 status carrying its message.
    pub fn from_result(result: Result<Vec<Row>, PluginError>) -> Self {
        match result {
            Ok(rows) => Self::ok(rows),
            Err(e) => Self::error(e.to_string()),
        }
    }
}

/// Identity reported to the host at registration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub sdk_version: String,
    #[serde(default)]
    pub min_sdk_version: String,
}

/// Builds a [`Row`] from string pairs.
pub fn row<K, V, I>(pairs: I) -> Row
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
