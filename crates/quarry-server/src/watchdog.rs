// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic liveness check of the host.

use std::sync::Arc;
use std::time::Duration;

use quarry_core::QuarryError;
use quarry_transport::ExtensionManager;
use tracing::{debug, error};

/// Pings the host every `interval` until a ping fails or reports a nonzero
/// status, and returns the reason. The first failure ends the loop.
pub(crate) async fn watch_host(
    client: Arc<dyn ExtensionManager>,
    interval: Duration,
) -> QuarryError {
    loop {
        tokio::time::sleep(interval).await;
        match client.ping().await {
            Ok(status) if status.is_ok() => debug!("host ping ok"),
            Ok(status) => {
                error!(
                    code = status.code,
                    message = %status.message,
                    "host ping returned error status"
                );
                return QuarryError::PingStatus {
                    code: status.code,
                    message: status.message,
                };
            }
            Err(e) => {
                error!(error = %e, "host ping failed");
                return QuarryError::Liveness {
                    source: Box::new(e),
                };
            }
        }
    }
}
