// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin that records what the server asks of it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use quarry_core::{ExtensionResponse, Plugin, PluginRequest, PluginRoutes};
use tokio::sync::Notify;

#[derive(Default)]
struct Recorded {
    requests: Mutex<Vec<PluginRequest>>,
    shutdowns: AtomicUsize,
    entered: Notify,
}

/// A [`Plugin`] that answers every call with a fixed response and records
/// each request.
///
/// Clones share their recordings, so a test can keep a clone after the
/// original has been boxed into a server.
#[derive(Clone)]
pub struct RecordingPlugin {
    name: String,
    registry: String,
    routes: PluginRoutes,
    response: ExtensionResponse,
    delay: Option<Duration>,
    recorded: Arc<Recorded>,
}

impl RecordingPlugin {
    pub fn new(registry: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            registry: registry.to_string(),
            routes: Vec::new(),
            response: ExtensionResponse::ok(Vec::new()),
            delay: None,
            recorded: Arc::default(),
        }
    }

    pub fn with_routes(mut self, routes: PluginRoutes) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_response(mut self, response: ExtensionResponse) -> Self {
        self.response = response;
        self
    }

    /// Makes every call sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<PluginRequest> {
        self.recorded
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests().len()
    }

    pub fn shutdown_count(&self) -> usize {
        self.recorded.shutdowns.load(Ordering::SeqCst)
    }

    /// Resolves once a call has started.
    pub async fn entered(&self) {
        self.recorded.entered.notified().await;
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry_name(&self) -> &str {
        &self.registry
    }

    fn routes(&self) -> PluginRoutes {
        self.routes.clone()
    }

    async fn call(&self, request: PluginRequest) -> ExtensionResponse {
        self.recorded
            .requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        self.recorded.entered.notify_one();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.response.clone()
    }

    async fn shutdown(&self) {
        self.recorded.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}
