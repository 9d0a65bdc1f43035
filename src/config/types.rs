use serde::Deserialize;

/// Default login endpoint of the ZoomEye API
pub const DEFAULT_LOGIN_URL: &str = "https://api.zoomeye.org/user/login";

/// Default search endpoint of the ZoomEye API
pub const DEFAULT_SEARCH_URL: &str = "https://api.zoomeye.org/host/search";

/// Main configuration structure for the leecher
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub leech: LeechConfig,
}

/// Remote API endpoints and HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// URL the login payload is POSTed to
    #[serde(rename = "login-url")]
    pub login_url: String,

    /// URL search pages are fetched from
    #[serde(rename = "search-url")]
    pub search_url: String,

    /// Whole-request deadline applied to every call (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// TCP connect deadline (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            login_url: DEFAULT_LOGIN_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("zoomeye-leecher/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Worker pool and pagination settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeechConfig {
    /// Number of concurrent workers
    pub connections: u32,

    /// Highest page number queued by the bulk policy
    #[serde(rename = "page-ceiling")]
    pub page_ceiling: u32,

    /// Highest page number handed out by the streaming policy
    #[serde(rename = "page-limit")]
    pub page_limit: u32,
}

impl Default for LeechConfig {
    fn default() -> Self {
        Self {
            connections: 32,
            page_ceiling: 999,
            page_limit: 100,
        }
    }
}
