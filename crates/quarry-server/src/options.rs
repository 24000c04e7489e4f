// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Construction options of an extension server.

use std::path::PathBuf;
use std::time::Duration;

use quarry_config::{ExtensionConfig, QuarryConfig};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Extension name reported to the host.
    pub name: String,
    /// Host socket. The server listens on `<socket>.<uuid>`.
    pub socket: PathBuf,
    pub version: Option<String>,
    /// Socket I/O deadline.
    pub timeout: Duration,
    /// Watchdog period.
    pub ping_interval: Duration,
    /// Port of the `/metrics` endpoint; `None` disables metrics.
    pub prometheus_port: Option<u16>,
}

impl ServerOptions {
    pub fn new(name: impl Into<String>, socket: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            socket: socket.into(),
            version: None,
            timeout: DEFAULT_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            prometheus_port: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Enables metrics on `port`. Port 0 disables them.
    pub fn prometheus_port(mut self, port: u16) -> Self {
        self.prometheus_port = (port > 0).then_some(port);
        self
    }

    pub fn metrics_enabled(&self) -> bool {
        self.prometheus_port.is_some()
    }
}

impl From<&ExtensionConfig> for ServerOptions {
    fn from(config: &ExtensionConfig) -> Self {
        let options = ServerOptions::new(&config.name, &config.socket)
            .timeout(Duration::from_secs(config.timeout_secs))
            .ping_interval(Duration::from_secs(config.ping_interval_secs));
        match config.version.as_deref() {
            Some(version) if !version.is_empty() => options.version(version),
            _ => options,
        }
    }
}

impl From<&QuarryConfig> for ServerOptions {
    fn from(config: &QuarryConfig) -> Self {
        ServerOptions::from(&config.extension).prometheus_port(config.metrics.prometheus_port)
    }
}
