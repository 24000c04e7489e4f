// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client side of the extension socket: talking to the host.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use quarry_core::{
    ExtensionInfo, ExtensionRegistry, ExtensionResponse, ExtensionStatus, ExtensionUuid,
    PluginRequest, Row,
};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::{self, Reply, Request};
use crate::{MAX_FRAME_BYTES, TRANSPORT_TARGET};

type Connection = Framed<UnixStream, LinesCodec>;

/// Typed calls the extension makes against the host's extension manager.
///
/// [`SocketClient`] implements this over the host socket; tests substitute
/// scripted implementations.
#[async_trait]
pub trait ExtensionManager: Send + Sync {
    /// Liveness check of the host.
    async fn ping(&self) -> Result<ExtensionStatus, TransportError>;

    /// Invokes a plugin registered with the peer.
    async fn call(
        &self,
        registry: &str,
        item: &str,
        request: PluginRequest,
    ) -> Result<ExtensionResponse, TransportError>;

    /// Asks the peer to stop.
    async fn shutdown(&self) -> Result<(), TransportError>;

    /// Announces the extension and its full route table. The returned status
    /// carries the uuid assigned by the host.
    async fn register_extension(
        &self,
        info: &ExtensionInfo,
        registry: &ExtensionRegistry,
    ) -> Result<ExtensionStatus, TransportError>;

    async fn deregister_extension(
        &self,
        uuid: ExtensionUuid,
    ) -> Result<ExtensionStatus, TransportError>;

    /// Runs a query on the host.
    async fn query(&self, sql: &str) -> Result<ExtensionResponse, TransportError>;

    /// Describes the columns a query would return.
    async fn get_query_columns(&self, sql: &str) -> Result<ExtensionResponse, TransportError>;

    /// Pushes event rows into a host-side events table.
    async fn stream_events(
        &self,
        name: &str,
        events: Vec<Row>,
    ) -> Result<ExtensionStatus, TransportError>;

    /// Runs a query and returns its rows, treating a nonzero status as an error.
    async fn query_rows(&self, sql: &str) -> Result<Vec<Row>, TransportError> {
        let response = self.query(sql).await?;
        if !response.status.is_ok() {
            return Err(TransportError::Status {
                code: response.status.code,
                message: response.status.message,
            });
        }
        Ok(response.response)
    }

    /// Like [`query_rows`](Self::query_rows) but requires exactly one row.
    async fn query_row(&self, sql: &str) -> Result<Row, TransportError> {
        let rows = self.query_rows(sql).await?;
        let actual = rows.len();
        match <[Row; 1]>::try_from(rows) {
            Ok([row]) => Ok(row),
            Err(_) => Err(TransportError::RowCount { actual }),
        }
    }
}

/// [`ExtensionManager`] over a Unix domain socket.
///
/// Holds one connection, serialized behind an async mutex. A connection that
/// fails or times out mid-exchange is dropped and re-established on the next
/// call.
pub struct SocketClient {
    path: PathBuf,
    timeout: Duration,
    connection: Mutex<Option<Connection>>,
}

impl SocketClient {
    /// Connects to the socket at `path`, failing if it cannot be reached
    /// within `timeout`.
    pub async fn connect(
        path: impl AsRef<Path>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        let connection = open(&path, timeout).await?;
        Ok(Self {
            path,
            timeout,
            connection: Mutex::new(Some(connection)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn round_trip(&self, request: &Request) -> Result<Reply, TransportError> {
        let line = protocol::encode(request)?;
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(open(&self.path, self.timeout).await?);
        }
        let Some(connection) = guard.as_mut() else {
            return Err(TransportError::Closed);
        };

        let result = match tokio::time::timeout(self.timeout, exchange(connection, line)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                duration: self.timeout,
            }),
        };
        if result.is_err() {
            debug!(
                target: TRANSPORT_TARGET,
                method = request.method(),
                "dropping connection after failed exchange"
            );
            *guard = None;
        }
        protocol::decode(&result?)
    }
}

async fn open(path: &Path, timeout: Duration) -> Result<Connection, TransportError> {
    let stream = match tokio::time::timeout(timeout, UnixStream::connect(path)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(TransportError::Connect {
                path: path.display().to_string(),
                source,
            })
        }
        Err(_) => return Err(TransportError::Timeout { duration: timeout }),
    };
    Ok(Framed::new(
        stream,
        LinesCodec::new_with_max_length(MAX_FRAME_BYTES),
    ))
}

async fn exchange(connection: &mut Connection, line: String) -> Result<String, TransportError> {
    connection.send(line).await?;
    match connection.next().await {
        Some(Ok(reply)) => Ok(reply),
        Some(Err(e)) => Err(e.into()),
        None => Err(TransportError::Closed),
    }
}

#[async_trait]
impl ExtensionManager for SocketClient {
    async fn ping(&self) -> Result<ExtensionStatus, TransportError> {
        self.round_trip(&Request::Ping).await?.into_status()
    }

    async fn call(
        &self,
        registry: &str,
        item: &str,
        request: PluginRequest,
    ) -> Result<ExtensionResponse, TransportError> {
        self.round_trip(&Request::Call {
            registry: registry.to_string(),
            item: item.to_string(),
            request,
        })
        .await?
        .into_response()
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.round_trip(&Request::Shutdown).await?.into_status()?;
        Ok(())
    }

    async fn register_extension(
        &self,
        info: &ExtensionInfo,
        registry: &ExtensionRegistry,
    ) -> Result<ExtensionStatus, TransportError> {
        self.round_trip(&Request::RegisterExtension {
            info: info.clone(),
            registry: registry.clone(),
        })
        .await?
        .into_status()
    }

    async fn deregister_extension(
        &self,
        uuid: ExtensionUuid,
    ) -> Result<ExtensionStatus, TransportError> {
        self.round_trip(&Request::DeregisterExtension { uuid })
            .await?
            .into_status()
    }

    async fn query(&self, sql: &str) -> Result<ExtensionResponse, TransportError> {
        self.round_trip(&Request::Query {
            sql: sql.to_string(),
        })
        .await?
        .into_response()
    }

    async fn get_query_columns(&self, sql: &str) -> Result<ExtensionResponse, TransportError> {
        self.round_trip(&Request::GetQueryColumns {
            sql: sql.to_string(),
        })
        .await?
        .into_response()
    }

    async fn stream_events(
        &self,
        name: &str,
        events: Vec<Row>,
    ) -> Result<ExtensionStatus, TransportError> {
        self.round_trip(&Request::StreamEvents {
            name: name.to_string(),
            events,
        })
        .await?
        .into_status()
    }
}
