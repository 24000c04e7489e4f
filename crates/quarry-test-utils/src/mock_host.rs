// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted host for exercising the extension lifecycle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use quarry_core::{
    ExtensionInfo, ExtensionRegistry, ExtensionResponse, ExtensionStatus, ExtensionUuid,
    PluginRequest, Row,
};
use quarry_transport::{ExtensionManager, TransportError};

/// Outcome of one scripted host call.
#[derive(Debug, Clone)]
pub enum HostReply {
    /// The host answers with this status.
    Status(ExtensionStatus),
    /// The host cannot be reached.
    Unreachable,
}

impl HostReply {
    fn into_result(self) -> Result<ExtensionStatus, TransportError> {
        match self {
            HostReply::Status(status) => Ok(status),
            HostReply::Unreachable => Err(TransportError::Closed),
        }
    }
}

/// An [`ExtensionManager`] answering from a script.
///
/// Registration succeeds with uuid 42 unless scripted otherwise. Pings pop
/// queued replies and fall back to a default (healthy unless changed).
pub struct MockHost {
    registration: Mutex<HostReply>,
    pings: Mutex<VecDeque<HostReply>>,
    default_ping: Mutex<HostReply>,
    query_rows: Mutex<Vec<Row>>,
    registered: Mutex<Vec<(ExtensionInfo, ExtensionRegistry)>>,
    streamed: Mutex<Vec<(String, Vec<Row>)>>,
    deregistered: Mutex<Vec<ExtensionUuid>>,
    ping_count: AtomicUsize,
    shutdown_count: AtomicUsize,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            registration: Mutex::new(HostReply::Status(ExtensionStatus {
                uuid: 42,
                ..ExtensionStatus::ok()
            })),
            pings: Mutex::new(VecDeque::new()),
            default_ping: Mutex::new(HostReply::Status(ExtensionStatus::ok())),
            query_rows: Mutex::new(Vec::new()),
            registered: Mutex::new(Vec::new()),
            streamed: Mutex::new(Vec::new()),
            deregistered: Mutex::new(Vec::new()),
            ping_count: AtomicUsize::new(0),
            shutdown_count: AtomicUsize::new(0),
        }
    }

    /// Sets the reply to `register_extension`.
    pub fn with_registration(self, reply: HostReply) -> Self {
        *lock(&self.registration) = reply;
        self
    }

    /// Sets the reply used once the ping queue is empty.
    pub fn with_default_ping(self, reply: HostReply) -> Self {
        *lock(&self.default_ping) = reply;
        self
    }

    /// Sets the rows answered to `query`.
    pub fn with_query_rows(self, rows: Vec<Row>) -> Self {
        *lock(&self.query_rows) = rows;
        self
    }

    /// Queues a reply for the next ping.
    pub fn push_ping(&self, reply: HostReply) {
        lock(&self.pings).push_back(reply);
    }

    pub fn ping_count(&self) -> usize {
        self.ping_count.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdown_count.load(Ordering::SeqCst)
    }

    pub fn registration_count(&self) -> usize {
        lock(&self.registered).len()
    }

    /// Every registration received, in order.
    pub fn registrations(&self) -> Vec<(ExtensionInfo, ExtensionRegistry)> {
        lock(&self.registered).clone()
    }

    /// Every `stream_events` batch received, in order.
    pub fn streamed(&self) -> Vec<(String, Vec<Row>)> {
        lock(&self.streamed).clone()
    }

    pub fn deregistered(&self) -> Vec<ExtensionUuid> {
        lock(&self.deregistered).clone()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

// Test helper: a poisoned lock means a test already panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ExtensionManager for MockHost {
    async fn ping(&self) -> Result<ExtensionStatus, TransportError> {
        self.ping_count.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.pings).pop_front();
        next.unwrap_or_else(|| lock(&self.default_ping).clone())
            .into_result()
    }

    async fn call(
        &self,
        registry: &str,
        item: &str,
        _request: PluginRequest,
    ) -> Result<ExtensionResponse, TransportError> {
        Ok(ExtensionResponse::error(format!(
            "mock host has no plugin {registry}/{item}"
        )))
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.shutdown_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn register_extension(
        &self,
        info: &ExtensionInfo,
        registry: &ExtensionRegistry,
    ) -> Result<ExtensionStatus, TransportError> {
        lock(&self.registered).push((info.clone(), registry.clone()));
        lock(&self.registration).clone().into_result()
    }

    async fn deregister_extension(
        &self,
        uuid: ExtensionUuid,
    ) -> Result<ExtensionStatus, TransportError> {
        lock(&self.deregistered).push(uuid);
        Ok(ExtensionStatus::ok())
    }

    async fn query(&self, _sql: &str) -> Result<ExtensionResponse, TransportError> {
        Ok(ExtensionResponse::ok(lock(&self.query_rows).clone()))
    }

    async fn get_query_columns(&self, _sql: &str) -> Result<ExtensionResponse, TransportError> {
        Ok(ExtensionResponse::ok(Vec::new()))
    }

    async fn stream_events(
        &self,
        name: &str,
        events: Vec<Row>,
    ) -> Result<ExtensionStatus, TransportError> {
        lock(&self.streamed).push((name.to_string(), events));
        Ok(ExtensionStatus::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_core::row;

    #[tokio::test]
    async fn pings_pop_queue_then_fall_back() {
        let host = MockHost::new();
        host.push_ping(HostReply::Status(ExtensionStatus::error("down")));
        host.push_ping(HostReply::Unreachable);

        assert_eq!(host.ping().await.unwrap().code, 1);
        assert!(host.ping().await.is_err());
        assert!(host.ping().await.unwrap().is_ok());
        assert_eq!(host.ping_count(), 3);
    }

    #[tokio::test]
    async fn registration_is_recorded_and_scripted() {
        let host = MockHost::new().with_registration(HostReply::Status(ExtensionStatus::error(
            "duplicate extension",
        )));
        let status = host
            .register_extension(&ExtensionInfo::default(), &ExtensionRegistry::new())
            .await
            .unwrap();
        assert_eq!(status.code, 1);
        assert_eq!(host.registration_count(), 1);
    }

    #[tokio::test]
    async fn deregistrations_are_recorded_in_order() {
        let host = MockHost::new();
        assert!(host.deregistered().is_empty());

        host.deregister_extension(42).await.unwrap();
        host.deregister_extension(7).await.unwrap();
        assert_eq!(host.deregistered(), vec![42, 7]);
    }

    #[tokio::test]
    async fn query_helpers_use_scripted_rows() {
        let host = MockHost::new().with_query_rows(vec![row([("version", "5.0")])]);
        let only = host.query_row("select version from osquery_info").await.unwrap();
        assert_eq!(only["version"], "5.0");

        let empty = MockHost::new();
        assert!(matches!(
            empty.query_row("select 1").await,
            Err(TransportError::RowCount { actual: 0 })
        ));
    }
}
