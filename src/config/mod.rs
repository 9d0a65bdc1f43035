//! Configuration module for the leecher
//!
//! This module handles loading, parsing, and validating the optional TOML
//! configuration file. Every key has a default, so an empty file (or no file
//! at all) yields a working configuration against the public ZoomEye API.
//!
//! # Example
//!
//! ```no_run
//! use zoomeye_leecher::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("leecher.toml")).unwrap();
//! println!("Search endpoint: {}", config.api.search_url);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{ApiConfig, Config, LeechConfig, DEFAULT_LOGIN_URL, DEFAULT_SEARCH_URL};

// Re-export parser and validation functions
pub use parser::{load_config, parse_config};
pub use validation::{
    validate, validate_leech_config, MAX_CONNECTIONS, MAX_PAGE_CEILING, MAX_PAGE_LIMIT,
};
