// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Quarry extension framework.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Quarry configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QuarryConfig {
    /// Extension identity and host connection settings.
    #[serde(default)]
    pub extension: ExtensionConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Extension identity and host connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExtensionConfig {
    /// Name reported to the host at registration.
    #[serde(default = "default_extension_name")]
    pub name: String,

    /// Path of the host's extension socket. Required at runtime.
    #[serde(default)]
    pub socket: String,

    /// Socket I/O deadline in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Seconds between watchdog pings to the host.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,

    /// Version string reported at registration.
    #[serde(default)]
    pub version: Option<String>,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            name: default_extension_name(),
            socket: String::new(),
            timeout_secs: default_timeout_secs(),
            ping_interval_secs: default_ping_interval_secs(),
            version: None,
        }
    }
}

fn default_extension_name() -> String {
    "quarry".to_string()
}

fn default_timeout_secs() -> u64 {
    1
}

fn default_ping_interval_secs() -> u64 {
    5
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Port for the `/metrics` endpoint. Zero disables metrics entirely.
    #[serde(default)]
    pub prometheus_port: u16,
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = QuarryConfig::default();
        assert_eq!(config.extension.name, "quarry");
        assert_eq!(config.extension.timeout_secs, 1);
        assert_eq!(config.extension.ping_interval_secs, 5);
        assert!(config.extension.socket.is_empty());
        assert!(config.extension.version.is_none());
        assert_eq!(config.metrics.prometheus_port, 0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_section_fills_defaults() {
        let config: QuarryConfig = toml::from_str(
            r#"
[extension]
socket = "/var/osquery/osquery.em"
"#,
        )
        .unwrap();
        assert_eq!(config.extension.socket, "/var/osquery/osquery.em");
        assert_eq!(config.extension.ping_interval_secs, 5);
    }
}
