// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./quarry.toml` > `~/.config/quarry/quarry.toml` > `/etc/quarry/quarry.toml`
//! with environment variable overrides via `QUARRY_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::QuarryConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/quarry/quarry.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_PATH: &str = "quarry.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/quarry/quarry.toml` (system-wide)
/// 3. `~/.config/quarry/quarry.toml` (user XDG config)
/// 4. `./quarry.toml` (local directory)
/// 5. `QUARRY_*` environment variables
pub fn load_config() -> Result<QuarryConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<QuarryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(QuarryConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<QuarryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(QuarryConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(QuarryConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Path of the per-user configuration file, if a config dir is known.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("quarry/quarry.toml"))
}

/// Environment provider mapping `QUARRY_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `QUARRY_EXTENSION_PING_INTERVAL_SECS` must map to
/// `extension.ping_interval_secs`.
fn env_provider() -> Env {
    Env::prefixed("QUARRY_").map(|key| {
        let mapped = key
            .as_str()
            .replacen("extension_", "extension.", 1)
            .replacen("metrics_", "metrics.", 1)
            .replacen("logging_", "logging.", 1);
        mapped.into()
    })
}
