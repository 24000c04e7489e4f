// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Quarry integration tests.
//!
//! Provides a scripted host and a recording plugin for fast, deterministic
//! tests without a real host process.
//!
//! # Components
//!
//! - [`MockHost`] - Scripted [`ExtensionManager`](quarry_transport::ExtensionManager)
//!   with queued ping outcomes and call counters
//! - [`RecordingPlugin`] - Plugin that records requests and shutdowns

pub mod mock_host;
pub mod recording_plugin;

pub use mock_host::{HostReply, MockHost};
pub use recording_plugin::RecordingPlugin;
