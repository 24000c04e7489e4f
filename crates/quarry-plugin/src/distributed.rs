// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distributed plugins hand ad-hoc queries to the host and collect results.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use quarry_core::{
    row, ExtensionResponse, Plugin, PluginError, PluginRequest, PluginRoutes, Row,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Queries for the host to run, keyed by query name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributedQueries {
    pub queries: BTreeMap<String, String>,
    /// Discovery queries gating each named query.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub discovery: BTreeMap<String, String>,
}

/// Outcome of one distributed query as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributedResult {
    pub query_name: String,
    pub status: i32,
    pub rows: Vec<Row>,
    pub message: String,
}

#[async_trait]
pub trait DistributedSource: Send + Sync + 'static {
    async fn queries(&self) -> Result<DistributedQueries, PluginError>;

    async fn write_results(&self, results: Vec<DistributedResult>) -> Result<(), PluginError>;

    async fn shutdown(&self) {}
}

/// Serves a [`DistributedSource`] under the `distributed` registry.
pub struct DistributedPlugin<D> {
    name: String,
    source: D,
}

impl<D: DistributedSource> DistributedPlugin<D> {
    pub fn new(name: impl Into<String>, source: D) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

#[derive(Deserialize)]
struct RawResults {
    #[serde(default)]
    queries: BTreeMap<String, RawRows>,
    #[serde(default)]
    statuses: BTreeMap<String, i32>,
    #[serde(default)]
    messages: BTreeMap<String, String>,
}

// Queries without rows are sent as "".
#[derive(Deserialize)]
#[serde(untagged)]
enum RawRows {
    Rows(Vec<Row>),
    Empty(String),
}

fn parse_results(json: &str) -> Result<Vec<DistributedResult>, PluginError> {
    let mut raw: RawResults = serde_json::from_str(json)?;
    let names: BTreeSet<String> = raw
        .queries
        .keys()
        .chain(raw.statuses.keys())
        .cloned()
        .collect();
    Ok(names
        .into_iter()
        .map(|name| {
            let rows = match raw.queries.remove(&name) {
                Some(RawRows::Rows(rows)) => rows,
                Some(RawRows::Empty(_)) | None => Vec::new(),
            };
            DistributedResult {
                status: raw.statuses.get(&name).copied().unwrap_or_default(),
                message: raw.messages.remove(&name).unwrap_or_default(),
                rows,
                query_name: name,
            }
        })
        .collect())
}

#[async_trait]
impl<D: DistributedSource> Plugin for DistributedPlugin<D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry_name(&self) -> &str {
        "distributed"
    }

    fn routes(&self) -> PluginRoutes {
        Vec::new()
    }

    async fn call(&self, request: PluginRequest) -> ExtensionResponse {
        let action = request.get("action").map(String::as_str).unwrap_or_default();
        let result = match action {
            "getQueries" => match self.source.queries().await {
                Ok(queries) => serde_json::to_string(&queries)
                    .map(|json| vec![row([("results", json)])])
                    .map_err(PluginError::from),
                Err(e) => Err(e),
            },
            "writeResults" => {
                let json = request.get("results").map(String::as_str).unwrap_or("{}");
                match parse_results(json) {
                    Ok(results) => self.source.write_results(results).await.map(|()| Vec::new()),
                    Err(e) => Err(e),
                }
            }
            other => {
                debug!(plugin = %self.name, action = other, "unknown distributed action");
                return ExtensionResponse::error(format!(
                    "distributed plugin got unknown action {other}"
                ));
            }
        };
        ExtensionResponse::from_result(result)
    }

    async fn shutdown(&self) {
        self.source.shutdown().await;
    }
}
