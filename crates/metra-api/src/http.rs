use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::handler::{MetricsHandler, ScrapeRequest, ScrapeResponse};

/// Axum router serving `handler` for every route.
///
/// The handler is mounted as the fallback so that unmatched paths still reach it and get
/// counted. Remote addresses are picked up from a `ConnectInfo<SocketAddr>` request extension
/// when the serving loop provides one.
pub fn router(handler: Arc<MetricsHandler>) -> Router {
    Router::new().fallback(scrape).with_state(handler)
}

async fn scrape(State(handler): State<Arc<MetricsHandler>>, request: Request) -> Response {
    let scrape = scrape_request(&request);
    into_response(handler.handle(&scrape).await)
}

fn scrape_request(request: &Request) -> ScrapeRequest {
    let uri = request.uri();
    let url = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    let headers = request
        .headers()
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|v| (k.as_str().to_string(), v.to_string()))
        })
        .collect();
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    ScrapeRequest {
        method: request.method().as_str().to_string(),
        url,
        headers,
        remote_addr,
    }
}

fn into_response(response: ScrapeResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut headers = HeaderMap::new();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name.as_str()),
            HeaderValue::try_from(value.as_str()),
        ) {
            headers.insert(name, value);
        }
    }
    (status, headers, response.body).into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::header;

    use super::*;

    #[test]
    fn converts_request_parts() {
        let request = axum::http::Request::builder()
            .method("GET")
            .uri("/metrics?x=1")
            .header("Authorization", "Bearer t")
            .body(axum::body::Body::empty())
            .unwrap();

        let scrape = scrape_request(&request);
        assert_eq!(scrape.method, "GET");
        assert_eq!(scrape.url, "/metrics?x=1");
        assert_eq!(scrape.path(), "/metrics");
        assert_eq!(scrape.header("authorization"), Some("Bearer t"));
        assert!(scrape.remote_addr.is_none());
    }

    #[test]
    fn response_headers_override_defaults() {
        let response = into_response(ScrapeResponse {
            status: 200,
            headers: vec![("Content-Type".into(), "text/plain; version=0.0.4".into())],
            body: "up 1\n".into(),
        });
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; version=0.0.4"
        );
    }
}
