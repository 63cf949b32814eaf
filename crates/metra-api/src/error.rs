use std::net::SocketAddr;
use std::time::Duration;

use metra_prometheus::ExporterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid server config: {0}")]
    InvalidConfig(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server on {addr} did not shut down within {timeout:?}")]
    ShutdownTimeout { addr: SocketAddr, timeout: Duration },

    #[error("server error: {0}")]
    Server(String),

    #[error("exporter error: {0}")]
    Exporter(#[from] ExporterError),
}
