//! Listener lifecycle: start, stop with a grace period, and a port probe.
//!
//! The socket is bound before the server task is spawned so that a port
//! conflict surfaces to the caller as [`SpanlinkError::Bind`] instead of
//! failing later inside the task.

use super::query::TraceQueryServer;
use super::OtelReceiver;
use crate::core::{Result, SpanlinkError};
use crate::storage::TraceStore;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

/// Running listener serving ingestion and query on one port.
///
/// Dropping the handle signals shutdown without waiting for it.
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl ListenerHandle {
    /// Address actually bound; reports the real port when started on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals graceful shutdown and waits up to `grace` for in-flight calls,
    /// then aborts the server task.
    pub async fn stop(mut self, grace: Duration) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        match tokio::time::timeout(grace, &mut self.task).await {
            Ok(joined) => {
                tracing::info!(addr = %self.local_addr, "Trace listener stopped");
                joined?
            },
            Err(_) => {
                tracing::warn!(
                    addr = %self.local_addr,
                    grace_ms = grace.as_millis() as u64,
                    "Trace listener did not drain in time, aborting"
                );
                self.task.abort();
                Ok(())
            },
        }
    }

    /// Serves until `signal` resolves, then stops with `grace`. Returns early
    /// if the server task exits on its own.
    pub async fn run_until<F>(mut self, signal: F, grace: Duration) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let exited = tokio::select! {
            joined = &mut self.task => Some(joined),
            () = signal => None,
        };

        match exited {
            Some(joined) => joined?,
            None => {
                tracing::info!("Received shutdown signal, stopping...");
                self.stop(grace).await
            },
        }
    }
}

/// Binds `host:port` and serves the OTLP trace service plus the query
/// endpoint on it. Port 0 picks an ephemeral port.
pub async fn start_listener(
    host: &str,
    port: u16,
    store: Arc<TraceStore>,
    echo_spans: bool,
) -> Result<ListenerHandle> {
    let addr = resolve_addr(host, port).await?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| SpanlinkError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;

    let ingest = OtelReceiver::new(Arc::clone(&store)).with_echo(echo_spans).into_server();
    let query = TraceQueryServer::new(store);
    let (tx, rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        Server::builder()
            .add_service(ingest)
            .add_service(query)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                let _ = rx.await;
            })
            .await
            .map_err(|e| {
                tracing::error!("GRPC server error: {} (bound to {})", e, local_addr);
                SpanlinkError::from(e)
            })
    });

    tracing::info!(addr = %local_addr, "Trace listener started (OTLP gRPC + query)");

    Ok(ListenerHandle {
        local_addr,
        shutdown: Some(tx),
        task,
    })
}

async fn resolve_addr(host: &str, port: u16) -> Result<SocketAddr> {
    if let Ok(ip) = host.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| SpanlinkError::config(format!("Cannot resolve host {}: {}", host, e)))?
        .next()
        .ok_or_else(|| SpanlinkError::config(format!("Host {} resolved to no addresses", host)))
}

/// True when something already holds `port` on the loopback interface.
pub fn is_port_bound(port: u16) -> bool {
    std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
}
