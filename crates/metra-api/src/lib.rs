//! HTTP exposition for a [`metra_prometheus::PrometheusExporter`].
//!
//! [`MetricsHandler`] implements the scrape contract without tying it to a framework:
//! - `404 Not Found` for any other path (query strings are ignored)
//! - `401 Unauthorized` with `WWW-Authenticate: Bearer` when the [`Authenticate`] hook refuses
//! - `429 Too Many Requests` with `Retry-After: 60` when the [`RateLimit`] hook refuses
//! - `500` with `Error: <message>` when refreshing or rendering fails
//! - `200` with exposition text otherwise
//!
//! With the `http` feature (default) the handler is also available as an axum [`router`] and
//! as a small standalone server ([`start_metrics_server`] / [`stop_metrics_server`]).

mod config;
pub use config::{DEFAULT_HOST, DEFAULT_PATH, DEFAULT_PORT, ServerConfig};

mod error;
pub use error::ApiError;

mod handler;
pub use handler::{CONTENT_TYPE, MetricsHandler, ScrapeRequest, ScrapeResponse, UNMATCHED_PATH};

mod hooks;
pub use hooks::{Authenticate, BearerToken, RateLimit};

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::router;

#[cfg(feature = "http")]
mod server;

#[cfg(feature = "http")]
pub use server::{MetricsServer, serve, start_metrics_server, stop_metrics_server};

#[cfg(feature = "http")]
pub use axum;
