// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Logger plugins receive the host's result and status logs.

use async_trait::async_trait;
use quarry_core::{ExtensionResponse, Plugin, PluginError, PluginRequest, PluginRoutes};
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::debug;

/// Kind of log line delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LogKind {
    String,
    Snapshot,
    Health,
    Init,
    Status,
}

/// Destination for host log lines.
#[async_trait]
pub trait LogSink: Send + Sync + 'static {
    async fn log(&self, kind: LogKind, text: &str) -> Result<(), PluginError>;

    async fn shutdown(&self) {}
}

/// Serves a [`LogSink`] under the `logger` registry.
pub struct LoggerPlugin<L> {
    name: String,
    sink: L,
}

impl<L: LogSink> LoggerPlugin<L> {
    pub fn new(name: impl Into<String>, sink: L) -> Self {
        Self {
            name: name.into(),
            sink,
        }
    }

    async fn deliver(&self, request: &PluginRequest) -> Result<(), PluginError> {
        for kind in [LogKind::String, LogKind::Snapshot, LogKind::Health, LogKind::Init] {
            if let Some(text) = request.get(kind.to_string().as_str()) {
                return self.sink.log(kind, text).await;
            }
        }
        if request.contains_key("status") {
            // Status logs arrive as {"": [entry, ...]} under "log".
            let batch = request.get("log").map(String::as_str).unwrap_or("{}");
            let parsed: Value = serde_json::from_str(batch)?;
            let entries: Vec<&Value> = parsed
                .as_object()
                .into_iter()
                .flat_map(|object| object.values())
                .filter_map(Value::as_array)
                .flatten()
                .collect();
            for entry in entries {
                self.sink.log(LogKind::Status, &entry.to_string()).await?;
            }
            return Ok(());
        }
        Err(PluginError::InvalidRequest("unknown log request".into()))
    }
}

#[async_trait]
impl<L: LogSink> Plugin for LoggerPlugin<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry_name(&self) -> &str {
        "logger"
    }

    fn routes(&self) -> PluginRoutes {
        Vec::new()
    }

    async fn call(&self, request: PluginRequest) -> ExtensionResponse {
        match self.deliver(&request).await {
            Ok(()) => ExtensionResponse::ok(Vec::new()),
            Err(e) => {
                debug!(plugin = %self.name, error = %e, "log delivery failed");
                ExtensionResponse::error(format!("error logging: {e}"))
            }
        }
    }

    async fn shutdown(&self) {
        self.sink.shutdown().await;
    }
}
