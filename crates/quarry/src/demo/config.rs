// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::collections::BTreeMap;

use async_trait::async_trait;
use quarry_core::{ExtensionResponse, Plugin, PluginError, PluginRequest};
use quarry_plugin::{ConfigPlugin, ConfigSource};
use tracing::info;

const EXAMPLE_CONFIG: &str = r#"{
  "options": {
    "host_identifier": "hostname",
    "schedule_splay_percent": 10
  },
  "schedule": {
    "macos_kextstat": {
      "query": "SELECT * FROM kernel_extensions;",
      "interval": 10
    },
    "foobar": {
      "query": "SELECT foo, bar, pid FROM foobar_table;",
      "interval": 600
    }
  }
}"#;

pub struct ExampleConfig;

#[async_trait]
impl ConfigSource for ExampleConfig {
    async fn generate(&self) -> Result<BTreeMap<String, String>, PluginError> {
        info!("sending example config");
        Ok(BTreeMap::from([(
            "config1".to_string(),
            EXAMPLE_CONFIG.to_string(),
        )]))
    }

    async fn refresh(&self, request: &PluginRequest) -> ExtensionResponse {
        info!(keys = ?request.keys().collect::<Vec<_>>(), "config refresh requested");
        ExtensionResponse::ok(Vec::new())
    }
}

pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(ConfigPlugin::new("example_config", ExampleConfig))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::row;

    #[tokio::test]
    async fn serves_example_config() {
        let plugins = plugins();
        let response = plugins[0].call(row([("action", "genConfig")])).await;
        assert!(response.status.is_ok());
        assert!(response.response[0]["config1"].contains("host_identifier"));
    }
}
