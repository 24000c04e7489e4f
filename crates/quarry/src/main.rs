// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quarry - example extensions for an osquery-compatible host.
//!
//! Each subcommand registers a demo plugin set with the host listening on
//! `--socket` and serves it until the host goes away.

mod demo;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use quarry_config::QuarryConfig;
use quarry_core::QuarryError;
use quarry_server::{ExtensionManagerServer, ServerOptions};
use tracing::{error, info};

/// Quarry - example extensions for an osquery-compatible host.
#[derive(Parser, Debug)]
#[command(name = "quarry", version, about, long_about = None)]
struct Cli {
    /// Path to the host's extensions socket.
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Seconds to wait on socket I/O.
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Seconds between host connectivity checks.
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Log at debug level.
    #[arg(long, global = true)]
    verbose: bool,

    /// Serve Prometheus metrics on this port (0 disables).
    #[arg(long, global = true)]
    prometheus_port: Option<u16>,

    /// Configuration file to load instead of the default locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available demo extensions.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Serve a static table and an in-memory mutable table.
    Table,
    /// Serve a config plugin.
    Config,
    /// Serve an events table and stream generated events to the host.
    Events,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => quarry_config::load_and_validate_path(path),
        None => quarry_config::load_and_validate(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            quarry_config::render_errors(&errors);
            std::process::exit(1);
        }
    };
    apply_overrides(&mut config, &cli);
    init_tracing(&config.logging.level);

    if let Err(e) = run(cli.command, &config).await {
        error!(error = %e, "extension exited with error");
        std::process::exit(1);
    }
}

/// Command-line flags win over configuration files and environment.
fn apply_overrides(config: &mut QuarryConfig, cli: &Cli) {
    if let Some(socket) = &cli.socket {
        config.extension.socket = socket.display().to_string();
    }
    if let Some(timeout) = cli.timeout {
        config.extension.timeout_secs = timeout;
    }
    if let Some(interval) = cli.interval {
        config.extension.ping_interval_secs = interval;
    }
    if let Some(port) = cli.prometheus_port {
        config.metrics.prometheus_port = port;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
}

/// The host socket is the one setting with no usable default.
fn require_socket(config: &QuarryConfig) -> Result<PathBuf, QuarryError> {
    if config.extension.socket.is_empty() {
        return Err(QuarryError::Config(
            "Missing required --socket argument".to_string(),
        ));
    }
    Ok(PathBuf::from(&config.extension.socket))
}

async fn run(command: Commands, config: &QuarryConfig) -> Result<(), QuarryError> {
    let socket = require_socket(config)?;
    let options = ServerOptions::from(config);
    let timeout = options.timeout;
    let mut server = ExtensionManagerServer::new(options).await?;
    match command {
        Commands::Table => server.register_plugins(demo::table::plugins())?,
        Commands::Config => server.register_plugins(demo::config::plugins())?,
        Commands::Events => {
            server.register_plugins(demo::events::plugins())?;
            tokio::spawn(demo::events::stream(socket, timeout, Duration::from_secs(5)));
        }
    }

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            handle.shutdown();
        }
    });

    info!(demo = ?command, "starting extension");
    server.run().await
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quarry={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "quarry",
            "--socket",
            "/var/osquery/osquery.em",
            "--timeout",
            "3",
            "--interval",
            "4",
            "--prometheus-port",
            "3000",
            "--verbose",
            "table",
        ]);
        let mut config = QuarryConfig::default();
        apply_overrides(&mut config, &cli);

        assert_eq!(cli.command, Commands::Table);
        assert_eq!(config.extension.socket, "/var/osquery/osquery.em");
        assert_eq!(config.extension.timeout_secs, 3);
        assert_eq!(config.extension.ping_interval_secs, 4);
        assert_eq!(config.metrics.prometheus_port, 3000);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn absent_flags_keep_config_values() {
        let cli = Cli::parse_from(["quarry", "events"]);
        let mut config = QuarryConfig::default();
        config.extension.socket = "/tmp/host.em".into();
        apply_overrides(&mut config, &cli);

        assert_eq!(cli.command, Commands::Events);
        assert_eq!(config.extension.socket, "/tmp/host.em");
        assert_eq!(config.extension.timeout_secs, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn flags_are_accepted_after_the_subcommand() {
        let cli = Cli::parse_from(["quarry", "config", "--socket", "/tmp/s"]);
        assert_eq!(cli.command, Commands::Config);
        assert_eq!(cli.socket, Some(PathBuf::from("/tmp/s")));
    }

    #[test]
    fn empty_socket_is_a_config_error() {
        let config = QuarryConfig::default();
        let err = require_socket(&config).unwrap_err();
        assert!(matches!(err, QuarryError::Config(_)));
        assert_eq!(
            err.to_string(),
            "configuration error: Missing required --socket argument"
        );
    }

    #[test]
    fn socket_flag_satisfies_the_requirement() {
        let cli = Cli::parse_from(["quarry", "--socket", "/tmp/host.em", "table"]);
        let mut config = QuarryConfig::default();
        apply_overrides(&mut config, &cli);
        assert_eq!(require_socket(&config).unwrap(), PathBuf::from("/tmp/host.em"));
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config =
            quarry_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.extension.name, "quarry");
    }
}
