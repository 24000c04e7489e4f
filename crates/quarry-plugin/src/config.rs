// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config plugins supply configuration documents to the host.

use std::collections::BTreeMap;

use async_trait::async_trait;
use quarry_core::{ExtensionResponse, Plugin, PluginError, PluginRequest, PluginRoutes, Row};
use tracing::debug;

/// Source of configuration documents, keyed by source name.
#[async_trait]
pub trait ConfigSource: Send + Sync + 'static {
    async fn generate(&self) -> Result<BTreeMap<String, String>, PluginError>;

    /// Called when the host refreshes its configuration.
    async fn refresh(&self, _request: &PluginRequest) -> ExtensionResponse {
        ExtensionResponse::ok(Vec::new())
    }

    async fn shutdown(&self) {}
}

/// Serves a [`ConfigSource`] under the `config` registry.
pub struct ConfigPlugin<S> {
    name: String,
    source: S,
}

impl<S: ConfigSource> ConfigPlugin<S> {
    pub fn new(name: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

#[async_trait]
impl<S: ConfigSource> Plugin for ConfigPlugin<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry_name(&self) -> &str {
        "config"
    }

    fn routes(&self) -> PluginRoutes {
        Vec::new()
    }

    async fn call(&self, request: PluginRequest) -> ExtensionResponse {
        let action = request.get("action").map(String::as_str).unwrap_or_default();
        match action {
            "genConfig" => {
                let result = self.source.generate().await.map(|configs| {
                    let row: Row = configs.into_iter().collect();
                    vec![row]
                });
                ExtensionResponse::from_result(result)
            }
            "refresh" => self.source.refresh(&request).await,
            other => {
                debug!(plugin = %self.name, action = other, "unknown config action");
                ExtensionResponse::error(format!("config plugin got unknown action {other}"))
            }
        }
    }

    async fn shutdown(&self) {
        self.source.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::row;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Sample {
        refreshes: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl ConfigSource for Sample {
        async fn generate(&self) -> Result<BTreeMap<String, String>, PluginError> {
            if self.fail {
                return Err(PluginError::Failed("config backend unavailable".into()));
            }
            Ok(BTreeMap::from([
                ("config1".to_string(), r#"{"options":{}}"#.to_string()),
                ("config2".to_string(), "{}".to_string()),
            ]))
        }

        async fn refresh(&self, _request: &PluginRequest) -> ExtensionResponse {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            ExtensionResponse::ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn gen_config_returns_one_row_of_sources() {
        let plugin = ConfigPlugin::new("example_config", Sample::default());
        let response = plugin.call(row([("action", "genConfig")])).await;
        assert!(response.status.is_ok());
        assert_eq!(response.response.len(), 1);
        assert_eq!(response.response[0]["config2"], "{}");
        assert_eq!(plugin.registry_name(), "config");
    }

    #[tokio::test]
    async fn refresh_is_forwarded() {
        let plugin = ConfigPlugin::new("example_config", Sample::default());
        let response = plugin.call(row([("action", "refresh")])).await;
        assert!(response.status.is_ok());
        assert_eq!(plugin.source.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn generate_failure_becomes_status() {
        let source = Sample {
            fail: true,
            ..Sample::default()
        };
        let plugin = ConfigPlugin::new("example_config", source);
        let response = plugin.call(row([("action", "genConfig")])).await;
        assert_eq!(response.status.code, 1);
        assert_eq!(response.status.message, "config backend unavailable");
    }

    #[tokio::test]
    async fn unknown_action_is_reported() {
        let plugin = ConfigPlugin::new("example_config", Sample::default());
        let response = plugin.call(row([("action", "reload")])).await;
        assert_eq!(response.status.message, "config plugin got unknown action reload");
    }
}
