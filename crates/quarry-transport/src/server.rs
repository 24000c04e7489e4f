// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server side of the extension socket: answering the host.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use quarry_core::{ExtensionResponse, ExtensionStatus, PluginRequest};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportError;
use crate::protocol::{self, Reply, Request};
use crate::{MAX_FRAME_BYTES, TRANSPORT_TARGET};

const ERROR_BACKOFF: Duration = Duration::from_millis(150);

/// Calls the host makes into an extension.
#[async_trait]
pub trait ExtensionHandler: Send + Sync + 'static {
    async fn ping(&self) -> ExtensionStatus;

    async fn call(&self, registry: &str, item: &str, request: PluginRequest) -> ExtensionResponse;

    /// Host-initiated stop. Invoked from inside a connection task, so it must
    /// not wait for the server it is running in to finish.
    async fn shutdown(&self);
}

/// Listening socket bound at a filesystem path.
pub struct SocketServer {
    path: PathBuf,
    listener: UnixListener,
    timeout: Duration,
    cancel: CancellationToken,
    closed: watch::Sender<bool>,
}

/// Stops a running [`SocketServer`] from any task.
#[derive(Clone)]
pub struct ServerHandle {
    cancel: CancellationToken,
    closed: watch::Receiver<bool>,
}

impl ServerHandle {
    /// Stops accepting connections and waits until the accept loop has
    /// drained its connections and removed the socket file.
    ///
    /// Waiting from inside a request handler of the same server deadlocks;
    /// spawn the call instead.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        // A dropped sender means the server is gone already.
        let _ = self.closed.wait_for(|closed| *closed).await;
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl SocketServer {
    /// Binds the listening socket. A stale socket file nobody listens on is
    /// removed first; one that accepts connections is refused.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self, TransportError> {
        let path = path.into();
        remove_stale_socket(&path)?;
        let listener = UnixListener::bind(&path).map_err(|source| TransportError::Bind {
            path: path.display().to_string(),
            source,
        })?;
        let (closed, _) = watch::channel(false);
        Ok(Self {
            path,
            listener,
            timeout,
            cancel: CancellationToken::new(),
            closed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            cancel: self.cancel.clone(),
            closed: self.closed.subscribe(),
        }
    }

    /// Accepts connections until stopped through a [`ServerHandle`], one task
    /// per connection. Requests already read complete before the server exits.
    pub async fn serve(self, handler: Arc<dyn ExtensionHandler>) {
        let SocketServer {
            path,
            listener,
            timeout,
            cancel,
            closed,
        } = self;

        info!(target: TRANSPORT_TARGET, path = %path.display(), "extension socket listening");
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        connections.spawn(serve_connection(
                            stream,
                            Arc::clone(&handler),
                            cancel.clone(),
                            timeout,
                        ));
                    }
                    Err(error) => {
                        warn!(target: TRANSPORT_TARGET, error = %error, "socket accept error");
                        tokio::time::sleep(ERROR_BACKOFF).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        while connections.join_next().await.is_some() {}
        cleanup_socket(&path);
        closed.send_replace(true);
        info!(target: TRANSPORT_TARGET, path = %path.display(), "extension socket closed");
    }
}

async fn serve_connection(
    stream: UnixStream,
    handler: Arc<dyn ExtensionHandler>,
    cancel: CancellationToken,
    timeout: Duration,
) {
    let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_FRAME_BYTES));
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = framed.next() => match frame {
                Some(Ok(line)) => line,
                Some(Err(error)) => {
                    let error = TransportError::from(error);
                    warn!(target: TRANSPORT_TARGET, error = %error, "connection read error");
                    break;
                }
                None => break,
            },
        };

        let reply = match protocol::decode::<Request>(&line) {
            Ok(request) => route(handler.as_ref(), request).await,
            Err(error) => Reply::from_status(ExtensionStatus::error(format!(
                "malformed request: {error}"
            ))),
        };
        let encoded = match protocol::encode(&reply) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(target: TRANSPORT_TARGET, error = %error, "failed to encode reply");
                break;
            }
        };
        match tokio::time::timeout(timeout, framed.send(encoded)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                let error = TransportError::from(error);
                warn!(target: TRANSPORT_TARGET, error = %error, "connection write error");
                break;
            }
            Err(_) => {
                warn!(target: TRANSPORT_TARGET, timeout = ?timeout, "reply write timed out");
                break;
            }
        }
    }
}

async fn route(handler: &dyn ExtensionHandler, request: Request) -> Reply {
    debug!(target: TRANSPORT_TARGET, method = request.method(), "request received");
    match request {
        Request::Ping => Reply::from_status(handler.ping().await),
        Request::Call {
            registry,
            item,
            request,
        } => Reply::from_response(handler.call(&registry, &item, request).await),
        Request::Shutdown => {
            handler.shutdown().await;
            Reply::from_status(ExtensionStatus::ok())
        }
        other => Reply::from_status(ExtensionStatus::error(format!(
            "Unsupported method: {}",
            other.method()
        ))),
    }
}

fn remove_stale_socket(path: &Path) -> Result<(), TransportError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(error) => return Err(TransportError::Io(error)),
    };
    if !metadata.file_type().is_socket() {
        return Err(TransportError::NotSocket {
            path: path.display().to_string(),
        });
    }
    match std::os::unix::net::UnixStream::connect(path) {
        Ok(_stream) => Err(TransportError::InUse {
            path: path.display().to_string(),
        }),
        Err(error)
            if error.kind() == io::ErrorKind::ConnectionRefused
                || error.kind() == io::ErrorKind::NotFound =>
        {
            fs::remove_file(path)?;
            Ok(())
        }
        Err(error) => Err(TransportError::Connect {
            path: path.display().to_string(),
            source: error,
        }),
    }
}

fn cleanup_socket(path: &Path) {
    if let Err(error) = fs::remove_file(path) {
        if error.kind() != io::ErrorKind::NotFound {
            warn!(
                target: TRANSPORT_TARGET,
                error = %error,
                path = %path.display(),
                "failed to remove unix socket file"
            );
        }
    }
}
