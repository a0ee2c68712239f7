//! Server configuration.

use crate::session::DEFAULT_TOKEN_TTL_SECS;

/// Default listen port.
const DEFAULT_PORT: u16 = 8080;

/// Default page size for feed and comment listings.
const DEFAULT_PAGE_SIZE: usize = 10;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// HMAC secret for session tokens. Every signed token dies with it,
    /// so rotating the secret logs everyone out.
    pub secret: String,
    pub session_ttl_secs: i64,
    /// Items per page when the client does not specify a limit.
    pub page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secret: "change-me".to_string(),
            session_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_ttl_secs, 7 * 24 * 3600);
        assert_eq!(config.page_size, 10);
    }
}
