//! ZoomEye leecher: a concurrent client for a paginated search API
//!
//! This crate authenticates once against a token-protected search API and then
//! fans out a bounded pool of workers to pull successive result pages, either
//! buffering every match for a final dump or streaming matches as pages arrive.

pub mod config;
pub mod leech;
pub mod output;
pub mod state;

use thiserror::Error;

/// Main error type for leech operations
#[derive(Debug, Error)]
pub enum LeechError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Session is already running")]
    AlreadyRunning,

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: state::SessionState,
        to: state::SessionState,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),
}

/// Login-specific errors
///
/// Any of these aborts the session before a single page is requested.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login endpoint responded with HTTP {status}")]
    Rejected { status: u16 },

    #[error("malformed login response: {0}")]
    MalformedBody(String),

    #[error("login request failed: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for leech operations
pub type Result<T> = std::result::Result<T, LeechError>;

// Re-export commonly used types
pub use config::Config;
pub use leech::{
    LeechReport, Match, PageBatch, PageOutcome, Pagination, Session, StopReason, StopSignal,
};
pub use state::SessionState;
