use crate::config::types::{ApiConfig, Config, LeechConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on the worker pool size
pub const MAX_CONNECTIONS: u32 = 1024;

/// Upper bound on the bulk page ceiling; every page is queued before workers start
pub const MAX_PAGE_CEILING: u32 = 10_000;

/// Upper bound on the streaming page limit
pub const MAX_PAGE_LIMIT: u32 = 100_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_leech_config(&config.leech)?;
    Ok(())
}

/// Validates endpoint URLs, timeouts and user agent
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_endpoint("login-url", &config.login_url)?;
    validate_endpoint("search-url", &config.search_url)?;

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.connect_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "connect-timeout-secs must be >= 1, got {}",
            config.connect_timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates worker pool and pagination settings
pub fn validate_leech_config(config: &LeechConfig) -> Result<(), ConfigError> {
    if config.connections < 1 || config.connections > MAX_CONNECTIONS {
        return Err(ConfigError::Validation(format!(
            "connections must be between 1 and {}, got {}",
            MAX_CONNECTIONS, config.connections
        )));
    }

    if config.page_ceiling < 1 || config.page_ceiling > MAX_PAGE_CEILING {
        return Err(ConfigError::Validation(format!(
            "page-ceiling must be between 1 and {}, got {}",
            MAX_PAGE_CEILING, config.page_ceiling
        )));
    }

    if config.page_limit < 1 || config.page_limit > MAX_PAGE_LIMIT {
        return Err(ConfigError::Validation(format!(
            "page-limit must be between 1 and {}, got {}",
            MAX_PAGE_LIMIT, config.page_limit
        )));
    }

    Ok(())
}

/// Checks that an endpoint parses and speaks HTTP(S)
fn validate_endpoint(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("{} '{}': {}", name, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}
