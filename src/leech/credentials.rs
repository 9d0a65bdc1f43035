//! Login exchange and bearer credential handling
//!
//! The API hands out a JWT on login. It is obtained once per session, never
//! refreshed, and attached to every search request as `Authorization: JWT <token>`.

use crate::AuthError;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque bearer token returned by the login endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns the raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header of search requests
    pub fn authorization_header(&self) -> String {
        format!("JWT {}", self.0)
    }
}

// Tokens end up in log lines through `{:?}` on session structs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// JSON body POSTed to the login endpoint
///
/// Built fresh for every login; deliberately not `Debug`.
#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// Performs the login exchange and returns the bearer credential
///
/// # Arguments
///
/// * `client` - The shared HTTP client
/// * `login_url` - Login endpoint
/// * `username` - Account login (email)
/// * `password` - Account password
///
/// # Returns
///
/// * `Ok(Credential)` - HTTP 200 with a non-empty `access_token`
/// * `Err(AuthError)` - Any other status, a malformed body, or a transport failure
pub async fn authenticate(
    client: &Client,
    login_url: &str,
    username: &str,
    password: &str,
) -> Result<Credential, AuthError> {
    let payload = LoginRequest { username, password };

    tracing::debug!("Logging in as {} via {}", username, login_url);

    let response = client
        .post(login_url)
        .json(&payload)
        .send()
        .await
        .map_err(AuthError::Transport)?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(AuthError::Rejected {
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(AuthError::Transport)?;
    parse_login_response(&body)
}

/// Extracts the access token from a login response body
fn parse_login_response(body: &str) -> Result<Credential, AuthError> {
    let parsed: LoginResponse =
        serde_json::from_str(body).map_err(|e| AuthError::MalformedBody(e.to_string()))?;

    if parsed.access_token.is_empty() {
        return Err(AuthError::MalformedBody(
            "access_token is empty".to_string(),
        ));
    }

    Ok(Credential(parsed.access_token))
}
