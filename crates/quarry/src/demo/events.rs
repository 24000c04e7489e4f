// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events table fed by pushing generated events to the host.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use quarry_core::{Plugin, PluginError, Row};
use quarry_plugin::{ColumnDefinition, QueryContext, Table, TablePlugin};
use quarry_transport::{ExtensionManager, SocketClient, TransportError};
use tracing::{debug, warn};

pub const EVENTS_TABLE: &str = "example_events";
const BATCH_SIZE: i64 = 100;
const BATCH_INTERVAL: Duration = Duration::from_secs(2);

/// Columns of the host-side events table. The host stores streamed events
/// itself, so generation is never asked of this table.
pub struct EventsTable;

#[async_trait]
impl Table for EventsTable {
    fn columns(&self) -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::text("text"),
            ColumnDefinition::integer("integer"),
            ColumnDefinition::big_int("big_int"),
            ColumnDefinition::double("double"),
        ]
    }

    async fn generate(&self, _context: &QueryContext) -> Result<Vec<Row>, PluginError> {
        Ok(Vec::new())
    }
}

pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(TablePlugin::new(EVENTS_TABLE, EventsTable))]
}

fn event(index: i64) -> Row {
    Row::from([
        ("text".to_string(), format!("event {index}")),
        ("integer".to_string(), index.to_string()),
        ("big_int".to_string(), (index * 1_000_000).to_string()),
        ("double".to_string(), (index as f64 / 10.0).to_string()),
    ])
}

/// Pushes the next batch of events, advancing `next_index`.
pub(crate) async fn publish(
    client: &dyn ExtensionManager,
    next_index: &mut i64,
) -> Result<(), TransportError> {
    let events: Vec<Row> = (*next_index..*next_index + BATCH_SIZE).map(event).collect();
    let status = client.stream_events(EVENTS_TABLE, events).await?;
    *next_index += BATCH_SIZE;
    if !status.is_ok() {
        return Err(TransportError::Status {
            code: status.code,
            message: status.message,
        });
    }
    Ok(())
}

/// After `delay`, streams a batch of events to the host every two seconds
/// until the host can no longer be reached.
pub async fn stream(socket: PathBuf, timeout: Duration, delay: Duration) {
    tokio::time::sleep(delay).await;
    let client = match SocketClient::connect(&socket, timeout).await {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "cannot stream events");
            return;
        }
    };

    let mut next_index = 0;
    loop {
        match publish(&client, &mut next_index).await {
            Ok(()) => debug!(streamed = next_index, "event batch streamed"),
            Err(TransportError::Status { code, message }) => {
                warn!(code, message = %message, "host rejected event batch");
            }
            Err(e) => {
                warn!(error = %e, "event streaming stopped");
                return;
            }
        }
        tokio::time::sleep(BATCH_INTERVAL).await;
    }
}
