// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait definitions for the Quarry plugin architecture.

pub mod plugin;

pub use plugin::Plugin;
