// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Routing of host calls to registered plugins.

use std::sync::Arc;

use quarry_core::{ExtensionResponse, PluginRequest};
use quarry_plugin::Registry;
use quarry_prometheus::CallTimer;
use tracing::{debug, warn};

/// Resolves `(registry, item)` against the [`Registry`] and invokes the
/// plugin, optionally recording call metrics.
///
/// Unknown registries and items are answered with status code 1. Plugin
/// responses, failed or not, are returned unchanged.
pub struct Dispatcher {
    registry: Arc<Registry>,
    metrics: bool,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, metrics: bool) -> Self {
        Self { registry, metrics }
    }

    pub async fn dispatch(
        &self,
        registry: &str,
        item: &str,
        request: PluginRequest,
    ) -> ExtensionResponse {
        let plugin = match self.registry.lookup(registry, item) {
            Ok(plugin) => plugin,
            Err(miss) => {
                warn!(registry, item, "{miss}");
                return ExtensionResponse::error(miss.to_string());
            }
        };

        let action = request.get("action").cloned().unwrap_or_default();
        debug!(registry, item, action = %action, "dispatching plugin call");

        let timer = self.metrics.then(|| CallTimer::start(item, &action));
        let response = plugin.call(request).await;
        if let Some(timer) = timer {
            timer.finish(response.response.len());
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use quarry_core::{row, ExtensionStatus};
    use quarry_test_utils::RecordingPlugin;
    use tracing_test::traced_test;

    fn dispatcher_with(plugin: &RecordingPlugin, metrics: bool) -> Dispatcher {
        let mut registry = Registry::new();
        registry.register(Box::new(plugin.clone())).unwrap();
        Dispatcher::new(Arc::new(registry), metrics)
    }

    #[tokio::test]
    #[traced_test]
    async fn unknown_registry_invokes_nothing() {
        let plugin = RecordingPlugin::new("table", "users");
        let dispatcher = dispatcher_with(&plugin, false);

        let response = dispatcher
            .dispatch("tables", "users", row([("action", "generate")]))
            .await;
        assert_eq!(response.status.code, 1);
        assert_eq!(response.status.message, "Unknown registry: tables");
        assert!(response.response.is_empty());
        assert_eq!(plugin.call_count(), 0);
        assert!(logs_contain("Unknown registry: tables"));
    }

    #[tokio::test]
    async fn unknown_item_invokes_nothing() {
        let plugin = RecordingPlugin::new("table", "users");
        let dispatcher = dispatcher_with(&plugin, false);

        let response = dispatcher
            .dispatch("table", "groups", PluginRequest::new())
            .await;
        assert_eq!(response.status.code, 1);
        assert_eq!(response.status.message, "Unknown registry item: groups");
        assert_eq!(plugin.call_count(), 0);
    }

    #[tokio::test]
    async fn plugin_response_is_returned_unchanged() {
        let canned = ExtensionResponse {
            status: ExtensionStatus {
                code: 7,
                message: "partial".into(),
                uuid: 0,
            },
            response: vec![row([("a", "1")]), row([("a", "2")])],
        };
        let plugin = RecordingPlugin::new("logger", "sink").with_response(canned.clone());
        let dispatcher = dispatcher_with(&plugin, false);

        let request = row([("action", "anything"), ("k", "v")]);
        let response = dispatcher.dispatch("logger", "sink", request.clone()).await;
        assert_eq!(response, canned);
        assert_eq!(plugin.requests(), vec![request]);
    }

    #[test]
    fn metrics_are_recorded_per_item_and_action() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let plugin = RecordingPlugin::new("table", "users")
            .with_response(ExtensionResponse::ok(vec![row([("a", "1")]); 3]));
        let dispatcher = dispatcher_with(&plugin, true);

        // The local recorder is thread-bound; a current-thread runtime keeps
        // the call on this thread.
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        metrics::with_local_recorder(&recorder, || {
            let request = row([("action", "generate")]);
            runtime.block_on(dispatcher.dispatch("table", "users", request))
        });

        let rendered = handle.render();
        assert!(rendered.contains("plugin_calls"));
        assert!(rendered.contains(r#"plugin_name="users""#));
        assert!(rendered.contains(r#"plugin_action="generate""#));
        assert!(rendered.contains("plugin_results"));
        assert_eq!(plugin.call_count(), 1);
    }
}
