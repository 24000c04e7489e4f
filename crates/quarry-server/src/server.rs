// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The extension manager server and its lifecycle driver.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use quarry_core::{
    ExtensionInfo, ExtensionResponse, ExtensionStatus, Plugin, PluginRequest, QuarryError,
};
use quarry_plugin::Registry;
use quarry_transport::{ExtensionHandler, ExtensionManager, SocketClient, SocketServer};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::dispatch::Dispatcher;
use crate::lifecycle::{Lifecycle, LifecycleState};
use crate::options::ServerOptions;
use crate::watchdog;

const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serves registered plugins to a host.
///
/// Plugins are registered on a constructed server; [`start`](Self::start) or
/// [`run`](Self::run) then consume it. Other tasks observe and stop a running
/// server through a [`ServerHandle`].
pub struct ExtensionManagerServer {
    options: ServerOptions,
    registry: Arc<Registry>,
    client: Arc<dyn ExtensionManager>,
    lifecycle: Arc<Lifecycle>,
}

/// Cloneable view of a server for other tasks.
#[derive(Clone)]
pub struct ServerHandle {
    lifecycle: Arc<Lifecycle>,
}

impl ServerHandle {
    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Waits until the server accepts connections. Fails if the server
    /// reached a terminal state without ever serving.
    pub async fn wait_started(&self) -> Result<(), QuarryError> {
        let mut states = self.lifecycle.subscribe();
        let reached = states
            .wait_for(|state| {
                matches!(state, LifecycleState::Serving | LifecycleState::ShuttingDown)
                    || state.is_terminal()
            })
            .await
            .map(|state| *state);
        match reached {
            Ok(_) if self.lifecycle.is_started() => Ok(()),
            Ok(state) => Err(QuarryError::Internal(format!(
                "server ended in state {state} without serving"
            ))),
            Err(_) => Err(QuarryError::Internal("server dropped".into())),
        }
    }

    /// Waits for a terminal state and returns it.
    pub async fn wait_stopped(&self) -> LifecycleState {
        let mut states = self.lifecycle.subscribe();
        match states.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.lifecycle.state(),
        }
    }

    /// Stops the server. Returns immediately; safe to call from a plugin
    /// handling a request, and more than once.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }
}

/// Answers the host on the listening socket.
struct ExtensionService {
    dispatcher: Dispatcher,
    lifecycle: Arc<Lifecycle>,
}

#[async_trait]
impl ExtensionHandler for ExtensionService {
    async fn ping(&self) -> ExtensionStatus {
        ExtensionStatus::ok()
    }

    async fn call(&self, registry: &str, item: &str, request: PluginRequest) -> ExtensionResponse {
        self.dispatcher.dispatch(registry, item, request).await
    }

    async fn shutdown(&self) {
        info!("host requested shutdown");
        self.lifecycle.shutdown();
    }
}

impl ExtensionManagerServer {
    /// Creates a server talking to the host at `options.socket`. Fails if the
    /// host socket cannot be reached within `options.timeout`.
    pub async fn new(options: ServerOptions) -> Result<Self, QuarryError> {
        let client = SocketClient::connect(&options.socket, options.timeout)
            .await
            .map_err(|e| QuarryError::Transport {
                message: format!("connecting to host socket {}", options.socket.display()),
                source: Box::new(e),
            })?;
        Ok(Self::with_client(options, Arc::new(client)))
    }

    /// Creates a server using an existing host client.
    pub fn with_client(options: ServerOptions, client: Arc<dyn ExtensionManager>) -> Self {
        Self {
            options,
            registry: Arc::new(Registry::new()),
            client,
            lifecycle: Arc::new(Lifecycle::new()),
        }
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Client used to call the host, e.g. to stream events.
    pub fn client(&self) -> Arc<dyn ExtensionManager> {
        Arc::clone(&self.client)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    /// Registers a plugin. An invalid registry name is an error and leaves
    /// the server's plugins unchanged.
    pub fn register_plugin(&mut self, plugin: Box<dyn Plugin>) -> Result<(), QuarryError> {
        self.registry_mut()?.register(plugin)
    }

    /// Registers several plugins, all or none.
    pub fn register_plugins(
        &mut self,
        plugins: impl IntoIterator<Item = Box<dyn Plugin>>,
    ) -> Result<(), QuarryError> {
        self.registry_mut()?.register_all(plugins)
    }

    fn registry_mut(&mut self) -> Result<&mut Registry, QuarryError> {
        if self.lifecycle.state() != LifecycleState::Constructed {
            return Err(QuarryError::AlreadyStarted);
        }
        Arc::get_mut(&mut self.registry).ok_or(QuarryError::AlreadyStarted)
    }

    /// Registers with the host and serves until shut down, without watching
    /// the host.
    pub async fn start(self) -> Result<(), QuarryError> {
        let listener = self.open().await?;
        let metrics = self.start_metrics();
        self.serve(listener).await;
        if let Some(metrics) = metrics {
            metrics.cancel();
        }
        self.finish(Ok(())).await
    }

    /// Registers with the host, serves, and pings the host every
    /// `ping_interval`. Returns when the server is shut down (`Ok`) or the
    /// host stops answering (`Err`).
    pub async fn run(self) -> Result<(), QuarryError> {
        let listener = self.open().await?;
        let metrics = self.start_metrics();
        let server = Arc::new(self);

        let (done_tx, mut done_rx) = mpsc::channel::<Result<(), QuarryError>>(2);
        let serve_task = {
            let server = Arc::clone(&server);
            let done_tx = done_tx.clone();
            tokio::spawn(async move {
                server.serve(listener).await;
                let _ = done_tx.send(Ok(())).await;
            })
        };
        let watchdog_task = {
            let client = Arc::clone(&server.client);
            let interval = server.options.ping_interval;
            tokio::spawn(async move {
                let failure = watchdog::watch_host(client, interval).await;
                let _ = done_tx.send(Err(failure)).await;
            })
        };

        let outcome = done_rx.recv().await.unwrap_or(Ok(()));
        if let Some(metrics) = metrics {
            metrics.cancel();
        }
        server.lifecycle.shutdown();
        if let Err(e) = serve_task.await {
            warn!(error = %e, "serve task ended abnormally");
        }
        watchdog_task.abort();
        server.finish(outcome).await
    }

    /// Registers with the host and opens the per-instance listening socket.
    async fn open(&self) -> Result<SocketServer, QuarryError> {
        let result = self.register_and_listen().await;
        if let Err(e) = &result {
            error!(error = %e, "extension failed to start");
            self.lifecycle.transition(LifecycleState::Failed);
        }
        result
    }

    async fn register_and_listen(&self) -> Result<SocketServer, QuarryError> {
        if !self.lifecycle.transition(LifecycleState::Registering) {
            return Err(QuarryError::AlreadyStarted);
        }
        let info = ExtensionInfo {
            name: self.options.name.clone(),
            version: self.options.version.clone().unwrap_or_default(),
            sdk_version: SDK_VERSION.to_string(),
            min_sdk_version: SDK_VERSION.to_string(),
        };
        let status = self
            .client
            .register_extension(&info, &self.registry.routes())
            .await
            .map_err(|e| QuarryError::Transport {
                message: "registering extension".to_string(),
                source: Box::new(e),
            })?;
        if !status.is_ok() {
            return Err(QuarryError::Registration {
                code: status.code,
                message: status.message,
            });
        }

        let path = listen_path(&self.options, status.uuid);
        info!(
            uuid = status.uuid,
            path = %path.display(),
            plugins = self.registry.len(),
            "extension registered"
        );
        self.lifecycle.transition(LifecycleState::Listening);
        SocketServer::open(&path, self.options.timeout).map_err(|e| QuarryError::Listen {
            path,
            source: Box::new(e),
        })
    }

    fn start_metrics(&self) -> Option<CancellationToken> {
        let port = self.options.prometheus_port?;
        let handle = match quarry_prometheus::install_recorder() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "metrics disabled");
                return None;
            }
        };
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = quarry_prometheus::serve(port, handle, token).await {
                warn!(error = %e, "metrics endpoint stopped");
            }
        });
        Some(cancel)
    }

    async fn serve(&self, listener: SocketServer) {
        let service = Arc::new(ExtensionService {
            dispatcher: Dispatcher::new(Arc::clone(&self.registry), self.options.metrics_enabled()),
            lifecycle: Arc::clone(&self.lifecycle),
        });
        self.lifecycle.attach(listener.handle());
        listener.serve(service).await;
    }

    /// Shuts plugins down and settles the final state.
    async fn finish(&self, outcome: Result<(), QuarryError>) -> Result<(), QuarryError> {
        self.registry.shutdown_all().await;
        match &outcome {
            Ok(()) => {
                self.lifecycle.transition(LifecycleState::Stopped);
                info!("extension server stopped");
            }
            Err(e) => {
                self.lifecycle.transition(LifecycleState::Failed);
                error!(error = %e, "extension server failed");
            }
        }
        outcome
    }
}

fn listen_path(options: &ServerOptions, uuid: u64) -> PathBuf {
    let mut path = options.socket.clone().into_os_string();
    path.push(format!(".{uuid}"));
    PathBuf::from(path)
}
