use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use metra_prometheus::PrometheusExporter;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::hooks::{Authenticate, RateLimit};

/// Content type of exposition text format 0.0.4.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Path label recorded for requests outside the metrics path.
pub const UNMATCHED_PATH: &str = "unmatched";

const RETRY_AFTER_SECS: &str = "60";

/// Transport-neutral view of an incoming request.
#[derive(Debug, Clone, Default)]
pub struct ScrapeRequest {
    pub method: String,
    /// Path plus optional query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub remote_addr: Option<SocketAddr>,
}

impl ScrapeRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// URL without its query string.
    pub fn path(&self) -> &str {
        self.url.split_once('?').map_or(self.url.as_str(), |(p, _)| p)
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ScrapeResponse {
    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serves exposition text for one exporter, independent of any HTTP framework.
///
/// Checks run in order: path, authentication, rate limit, optional refresh, render. The handler
/// never fails; every error becomes a response.
pub struct MetricsHandler {
    exporter: Arc<PrometheusExporter>,
    config: ServerConfig,
    authenticate: Option<Arc<dyn Authenticate>>,
    rate_limit: Option<Arc<dyn RateLimit>>,
}

impl MetricsHandler {
    pub fn new(exporter: Arc<PrometheusExporter>, config: ServerConfig) -> Self {
        Self {
            exporter,
            config,
            authenticate: None,
            rate_limit: None,
        }
    }

    pub fn with_authenticate(mut self, hook: Arc<dyn Authenticate>) -> Self {
        self.authenticate = Some(hook);
        self
    }

    pub fn with_rate_limit(mut self, hook: Arc<dyn RateLimit>) -> Self {
        self.rate_limit = Some(hook);
        self
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn exporter(&self) -> &Arc<PrometheusExporter> {
        &self.exporter
    }

    pub async fn handle(&self, request: &ScrapeRequest) -> ScrapeResponse {
        let started = Instant::now();

        if request.path() != self.config.path {
            let response = ScrapeResponse::text(404, "Not Found");
            self.finish(request, &response, UNMATCHED_PATH, started);
            return response;
        }

        if let Some(hook) = &self.authenticate
            && !hook.authenticate(request).await
        {
            let response =
                ScrapeResponse::text(401, "Unauthorized").with_header("WWW-Authenticate", "Bearer");
            self.finish(request, &response, &self.config.path, started);
            return response;
        }

        if let Some(hook) = &self.rate_limit
            && !hook.allow(request).await
        {
            let response = ScrapeResponse::text(429, "Too Many Requests")
                .with_header("Retry-After", RETRY_AFTER_SECS);
            self.finish(request, &response, &self.config.path, started);
            return response;
        }

        let response = match self.render().await {
            Ok(body) => {
                let length = body.len().to_string();
                ScrapeResponse::text(200, body)
                    .with_header("Content-Type", CONTENT_TYPE)
                    .with_header("Content-Length", length)
            }
            Err(message) => {
                warn!(error = %message, "metrics scrape failed");
                ScrapeResponse::text(500, format!("Error: {message}"))
            }
        };
        self.finish(request, &response, &self.config.path, started);
        response
    }

    async fn render(&self) -> Result<String, String> {
        if self.config.refresh_on_scrape {
            self.exporter.refresh().await.map_err(|e| e.to_string())?;
        }
        self.exporter.get_metrics().await.map_err(|e| e.to_string())
    }

    fn finish(&self, request: &ScrapeRequest, response: &ScrapeResponse, path: &str, started: Instant) {
        if !self.config.instrument {
            return;
        }
        let is_error = matches!(response.status, 401 | 500);
        self.exporter
            .record_http_request(response.status, path, is_error);

        let remote = request
            .remote_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(
            status = response.status,
            path = %request.path(),
            method = %request.method,
            duration_ms = started.elapsed().as_secs_f64() * 1000.0,
            remote = %remote,
            "metrics request completed"
        );
    }
}
