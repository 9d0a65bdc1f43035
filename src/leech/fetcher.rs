//! HTTP page fetcher
//!
//! This module handles all search requests, including:
//! - Building the shared HTTP client with timeouts and user agent
//! - Encoding the query and page number into the search URL
//! - Attaching the bearer credential
//! - Classifying the response into a `PageOutcome`

use crate::config::ApiConfig;
use crate::leech::credentials::Credential;
use crate::leech::distributor::PageRequest;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// One record from a page's result set, passed through untouched
pub type Match = serde_json::Value;

/// Result of fetching a single page
///
/// Only `Matches` lets a worker continue; every other variant ends that worker.
#[derive(Debug)]
pub enum PageOutcome {
    /// HTTP 200 with a decodable `matches` array
    Matches(Vec<Match>),

    /// Any status other than 200
    Rejected {
        /// The HTTP status code
        status: u16,
    },

    /// HTTP 200 whose body was not the expected JSON shape
    Malformed(String),

    /// Network error (connection refused, timeout, truncated body, etc.)
    Transport(String),
}

#[derive(Deserialize)]
struct SearchResponse {
    matches: Vec<Match>,
}

/// Builds the HTTP client shared by login and every worker
///
/// # Arguments
///
/// * `config` - API settings (timeouts, user agent)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use zoomeye_leecher::config::ApiConfig;
/// use zoomeye_leecher::leech::build_http_client;
///
/// let client = build_http_client(&ApiConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Issues search requests against one endpoint
///
/// Cloning is cheap: the underlying client shares its connection pool.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    search_url: Url,
}

impl PageFetcher {
    /// Creates a fetcher for the given search endpoint
    pub fn new(client: Client, search_url: Url) -> Self {
        Self { client, search_url }
    }

    /// The shared HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Builds the URL for one page request
    ///
    /// The query is form-urlencoded as the `query` parameter and the page
    /// number is appended as `page`.
    pub fn page_url(&self, request: &PageRequest) -> Url {
        let mut url = self.search_url.clone();
        url.query_pairs_mut()
            .append_pair("query", &request.query)
            .append_pair("page", &request.page.to_string());
        url
    }

    /// Fetches one page of search results
    ///
    /// # Arguments
    ///
    /// * `credential` - Bearer credential from the login exchange
    /// * `request` - The query and page number to fetch
    ///
    /// # Returns
    ///
    /// A `PageOutcome`; failures are values, never errors
    pub async fn fetch(&self, credential: &Credential, request: &PageRequest) -> PageOutcome {
        let url = self.page_url(request);

        let response = match self
            .client
            .get(url)
            .header(AUTHORIZATION, credential.authorization_header())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_transport_error(&e),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return PageOutcome::Rejected {
                status: status.as_u16(),
            };
        }

        match response.text().await {
            Ok(body) => parse_search_response(&body),
            Err(e) => PageOutcome::Transport(e.to_string()),
        }
    }
}

/// Decodes the `matches` array from a search response body
fn parse_search_response(body: &str) -> PageOutcome {
    match serde_json::from_str::<SearchResponse>(body) {
        Ok(parsed) => PageOutcome::Matches(parsed.matches),
        Err(e) => PageOutcome::Malformed(e.to_string()),
    }
}

fn classify_transport_error(e: &reqwest::Error) -> PageOutcome {
    if e.is_timeout() {
        PageOutcome::Transport("Request timeout".to_string())
    } else if e.is_connect() {
        PageOutcome::Transport(format!("Connection failed: {}", e))
    } else {
        PageOutcome::Transport(e.to_string())
    }
}
