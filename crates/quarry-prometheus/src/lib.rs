// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for Quarry extensions.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The rendered
//! text format is served on `GET /metrics` by [`serve`].

pub mod recording;

use std::net::SocketAddr;
use std::sync::Mutex;

use axum::{extract::State, routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use quarry_core::QuarryError;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use recording::{register_metrics, CallTimer};

static RECORDER: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the Prometheus recorder globally and returns its handle.
///
/// Only one recorder can exist per process; later calls return the handle of
/// the recorder installed first.
pub fn install_recorder() -> Result<PrometheusHandle, QuarryError> {
    let mut installed = RECORDER
        .lock()
        .map_err(|_| QuarryError::Internal("metrics recorder lock poisoned".into()))?;
    if let Some(handle) = installed.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        QuarryError::Internal(format!("failed to install Prometheus recorder: {e}"))
    })?;
    recording::register_metrics();
    tracing::info!("prometheus metrics recorder installed");

    *installed = Some(handle.clone());
    Ok(handle)
}

/// Router exposing the recorder's metrics on `GET /metrics`.
pub fn router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Serves `/metrics` on `0.0.0.0:port` until `cancel` fires.
pub async fn serve(
    port: u16,
    handle: PrometheusHandle,
    cancel: CancellationToken,
) -> Result<(), QuarryError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| QuarryError::Transport {
            message: format!("failed to bind metrics endpoint to {addr}"),
            source: Box::new(e),
        })?;
    serve_on(listener, handle, cancel).await
}

/// Like [`serve`] but on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    handle: PrometheusHandle,
    cancel: CancellationToken,
) -> Result<(), QuarryError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "metrics endpoint listening");
    }
    axum::serve(listener, router(handle))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| QuarryError::Transport {
            message: "metrics endpoint error".to_string(),
            source: Box::new(e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn metrics_endpoint_serves_rendered_text_and_stops_on_cancel() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            CallTimer::start("users", "generate").finish(3);
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();
        let server = tokio::spawn(serve_on(listener, handle, cancel.clone()));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /metrics HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).await.unwrap();
        assert!(body.starts_with("HTTP/1.1 200"));
        assert!(body.contains("plugin_calls"));
        assert!(body.contains(r#"plugin_name="users""#));

        cancel.cancel();
        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn serve_reports_bind_failure() {
        let taken = TcpListener::bind("0.0.0.0:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let result = serve(port, handle, CancellationToken::new()).await;
        assert!(matches!(result, Err(QuarryError::Transport { .. })));
    }
}
