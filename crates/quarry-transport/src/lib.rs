// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local socket transport between an extension and its host.
//!
//! Frames are single-line JSON objects over a Unix domain socket: the caller
//! writes one [`Request`](protocol::Request) per line and reads back one
//! [`Reply`](protocol::Reply). Two seams are exposed:
//!
//! - [`ExtensionManager`]: the typed client used to talk to the host
//!   (registration, liveness pings, queries, event streaming).
//!   [`SocketClient`] is the socket-backed implementation.
//! - [`ExtensionHandler`]: what an extension implements to answer the host.
//!   [`SocketServer`] accepts connections and routes frames to it.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::{ExtensionManager, SocketClient};
pub use error::TransportError;
pub use protocol::{Reply, Request};
pub use server::{ExtensionHandler, ServerHandle, SocketServer};

/// Upper bound on a single encoded frame.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const TRANSPORT_TARGET: &str = "quarry_transport::socket";
