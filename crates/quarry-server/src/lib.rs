// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extension manager server.
//!
//! An [`ExtensionManagerServer`] registers its plugins with the host, listens
//! on a per-instance socket, dispatches the host's calls to plugins, and
//! watches the host with periodic pings. Either the serve loop ending or the
//! host becoming unreachable shuts the server down.

pub mod dispatch;
pub mod lifecycle;
pub mod options;
pub mod server;
mod watchdog;

pub use dispatch::Dispatcher;
pub use lifecycle::LifecycleState;
pub use options::ServerOptions;
pub use server::{ExtensionManagerServer, ServerHandle};
