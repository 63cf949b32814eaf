use async_trait::async_trait;

use crate::handler::ScrapeRequest;

/// Decides whether a scrape is allowed to see metrics. `false` answers 401.
#[async_trait]
pub trait Authenticate: Send + Sync + 'static {
    async fn authenticate(&self, request: &ScrapeRequest) -> bool;
}

/// Decides whether a scrape fits the caller's budget. `false` answers 429.
#[async_trait]
pub trait RateLimit: Send + Sync + 'static {
    async fn allow(&self, request: &ScrapeRequest) -> bool;
}

#[async_trait]
impl<F> Authenticate for F
where
    F: Fn(&ScrapeRequest) -> bool + Send + Sync + 'static,
{
    async fn authenticate(&self, request: &ScrapeRequest) -> bool {
        self(request)
    }
}

#[async_trait]
impl<F> RateLimit for F
where
    F: Fn(&ScrapeRequest) -> bool + Send + Sync + 'static,
{
    async fn allow(&self, request: &ScrapeRequest) -> bool {
        self(request)
    }
}

/// Accepts requests carrying `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authenticate for BearerToken {
    async fn authenticate(&self, request: &ScrapeRequest) -> bool {
        request
            .header("authorization")
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|t| t.trim() == self.token)
    }
}
