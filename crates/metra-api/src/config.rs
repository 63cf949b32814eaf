use crate::error::ApiError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9464;
pub const DEFAULT_PATH: &str = "/metrics";

/// Exposition endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    /// `0` picks a free port.
    pub port: u16,
    pub path: String,
    /// Run a full refresh before every successful scrape.
    pub refresh_on_scrape: bool,
    /// Log and count every request.
    pub instrument: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            refresh_on_scrape: false,
            instrument: true,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.host.trim().is_empty() {
            return Err(ApiError::InvalidConfig("host cannot be empty".into()));
        }
        if !self.path.starts_with('/') {
            return Err(ApiError::InvalidConfig(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        if self.path.contains('?') {
            return Err(ApiError::InvalidConfig(
                "path must not contain a query string".into(),
            ));
        }
        Ok(())
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
