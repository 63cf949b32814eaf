use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Extension, Router, extract::ConnectInfo};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use metra_prometheus::PrometheusExporter;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::handler::MetricsHandler;
use crate::http::router;

/// A running dev server.
///
/// Dropping the handle starts a graceful shutdown without waiting for it.
pub struct MetricsServer {
    local_addr: SocketAddr,
    path: String,
    shutdown: CancellationToken,
    force: CancellationToken,
    join: JoinHandle<()>,
}

impl MetricsServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Full URL of the metrics endpoint.
    pub fn url(&self) -> String {
        format!("http://{}{}", self.local_addr, self.path)
    }
}

impl Drop for MetricsServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Bind `config.host:config.port` and serve `exporter`.
pub async fn start_metrics_server(
    exporter: Arc<PrometheusExporter>,
    config: ServerConfig,
) -> Result<MetricsServer, ApiError> {
    serve(MetricsHandler::new(exporter, config)).await
}

/// Like [`start_metrics_server`], for a handler carrying hooks.
pub async fn serve(handler: MetricsHandler) -> Result<MetricsServer, ApiError> {
    let config = handler.config().clone();
    config.validate()?;

    let addr = config.bind_addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(source) => {
            error!(%addr, error = %source, "metrics server failed to bind");
            return Err(ApiError::Bind { addr, source });
        }
    };
    let local_addr = listener
        .local_addr()
        .map_err(|source| ApiError::Bind { addr, source })?;

    let shutdown = CancellationToken::new();
    let force = CancellationToken::new();
    let join = tokio::spawn(accept_loop(
        listener,
        router(Arc::new(handler)),
        shutdown.clone(),
        force.clone(),
    ));

    info!(%local_addr, path = %config.path, "metrics server listening");
    Ok(MetricsServer {
        local_addr,
        path: config.path,
        shutdown,
        force,
        join,
    })
}

/// Shut `server` down gracefully, force-closing every open connection after `timeout`.
///
/// A forced close is reported as [`ApiError::ShutdownTimeout`]. The sockets are closed by the
/// time this returns in either case.
pub async fn stop_metrics_server(mut server: MetricsServer, timeout: Duration) -> Result<(), ApiError> {
    let addr = server.local_addr;
    server.shutdown.cancel();

    match tokio::time::timeout(timeout, &mut server.join).await {
        Ok(Ok(())) => {
            info!(%addr, "metrics server stopped");
            Ok(())
        }
        Ok(Err(e)) => Err(ApiError::Server(e.to_string())),
        Err(_) => {
            warn!(%addr, ?timeout, "graceful shutdown timed out; forcing close");
            server.force.cancel();
            if let Err(e) = (&mut server.join).await {
                debug!(%addr, error = %e, "server task ended abnormally during forced close");
            }
            Err(ApiError::ShutdownTimeout { addr, timeout })
        }
    }
}

/// Accept connections until `shutdown`, then drain them.
///
/// Every connection lives in one `JoinSet`; cancelling `force` aborts the whole set, which
/// drops each socket whether or not a request was ever fully read.
async fn accept_loop(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    force: CancellationToken,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    connections.spawn(connection(stream, remote, app.clone(), shutdown.clone()));
                }
                Err(e) => warn!(error = %e, "metrics server accept failed"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
    drop(listener);

    tokio::select! {
        _ = async { while connections.join_next().await.is_some() {} } => {}
        _ = force.cancelled() => {
            debug!(open = connections.len(), "aborting metrics connections");
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }
    }
}

async fn connection(stream: TcpStream, remote: SocketAddr, app: Router, shutdown: CancellationToken) {
    let service = TowerToHyperService::new(app.layer(Extension(ConnectInfo(remote))));
    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    tokio::select! {
        result = conn.as_mut() => {
            if let Err(e) = result {
                debug!(%remote, error = %e, "metrics connection error");
            }
            return;
        }
        _ = shutdown.cancelled() => {}
    }

    conn.as_mut().graceful_shutdown();
    if let Err(e) = conn.await {
        debug!(%remote, error = %e, "metrics connection error during shutdown");
    }
}
