// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base trait every registered plugin implements.

use async_trait::async_trait;

use crate::types::{ExtensionResponse, ExtensionStatus, PluginRequest, PluginRoutes};

/// A named, categorized capability served to the host.
///
/// Plugins are owned by the registry once registered and are called
/// concurrently from connection tasks, so implementations take `&self` and
/// guard any mutable state themselves.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Name used by the host to address this plugin (e.g. the table name).
    /// Unique within its registry.
    fn name(&self) -> &str;

    /// Registry the plugin belongs to. Must be one of `table`, `logger`,
    /// `config` or `distributed`; anything else is rejected at registration.
    fn registry_name(&self) -> &str;

    /// Schema description sent to the host at registration time.
    fn routes(&self) -> PluginRoutes;

    /// Plugin-level health check.
    fn ping(&self) -> ExtensionStatus {
        ExtensionStatus::ok()
    }

    /// Performs the requested action. Must not block indefinitely; the host
    /// enforces its own deadline.
    async fn call(&self, request: PluginRequest) -> ExtensionResponse;

    /// Advisory cleanup, invoked once after the server stops.
    async fn shutdown(&self) {}
}
