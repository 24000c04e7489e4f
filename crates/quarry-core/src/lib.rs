// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Quarry extension framework.
//!
//! This crate provides the protocol types exchanged with the host process,
//! the workspace error types, and the [`Plugin`] trait every registered
//! capability implements.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{PluginError, QuarryError};
pub use traits::Plugin;
pub use types::{
    row, ExtensionInfo, ExtensionRegistry, ExtensionResponse, ExtensionStatus, ExtensionUuid,
    PluginRequest, PluginRoutes, RegistryCategory, Row,
};
