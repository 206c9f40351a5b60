//! QuickBooks transport session
//!
//! One session per process, created at startup. It owns the HTTP client and
//! the OAuth2 token state, injects the company (realm) prefix into every
//! route, and exposes the single call primitive the dispatcher uses. Token
//! refresh happens lazily: the cached access token is reused until shortly
//! before expiry, then re-acquired with the refresh-token grant.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::catalog::HttpMethod;
use crate::config::Config;
use crate::{Error, Result};

/// Intuit OAuth2 bearer token endpoint (also used by the authorize flow)
pub const TOKEN_ENDPOINT: &str = "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer";

/// Access tokens are refreshed this long before their reported expiry
const EXPIRY_SKEW: Duration = Duration::from_secs(60);

/// The single call primitive the dispatcher and mutation tools depend on.
///
/// Implementations must be `Send + Sync` so the session handle can be shared
/// across tool invocations. Tests substitute a recording fake.
#[async_trait]
pub trait ApiSession: Send + Sync + 'static {
    /// Execute one API request. `body: None` means no request body at all,
    /// distinct from an empty JSON object.
    async fn execute(
        &self,
        method: HttpMethod,
        route: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value>;

    /// Run a SQL-like query statement against the `/query` endpoint
    async fn query(&self, statement: &str) -> Result<Value> {
        self.execute(
            HttpMethod::Get,
            "/query",
            &[("query".to_string(), statement.to_string())],
            None,
        )
        .await
    }
}

/// OAuth token response from the Intuit token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
}

/// Mutable token state behind the session handle
struct TokenState {
    access_token: Option<String>,
    expires_at: Instant,
    refresh_token: String,
}

/// Live session against the QuickBooks Online API
pub struct QuickBooksSession {
    client: Client,
    client_id: String,
    client_secret: String,
    company_id: String,
    base_url: String,
    minor_version: String,
    token_endpoint: String,
    token: Mutex<TokenState>,
}

impl QuickBooksSession {
    /// Create a session from configuration.
    ///
    /// Fails fast on missing credentials so startup can record the session
    /// as absent and every tool can report it.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate_credentials()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            company_id: config.company_id.clone(),
            base_url: config.resolved_base_url(),
            minor_version: config.minor_version.clone(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            token: Mutex::new(TokenState {
                access_token: None,
                expires_at: Instant::now(),
                refresh_token: config.refresh_token.clone(),
            }),
        })
    }

    /// Return a valid access token, refreshing it when missing or near expiry
    async fn ensure_token(&self) -> Result<String> {
        let mut state = self.token.lock().await;

        if let Some(ref token) = state.access_token {
            if state.expires_at > Instant::now() + EXPIRY_SKEW {
                return Ok(token.clone());
            }
        }

        debug!("Refreshing QuickBooks access token");

        let response = self
            .client
            .post(&self.token_endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header("Accept", "application/json")
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", state.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Token refresh failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "Token refresh failed: HTTP {status} - {body}"
            )));
        }

        let token_response: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Failed to parse token response: {e}")))?;

        state.access_token = Some(token_response.access_token.clone());
        state.expires_at =
            Instant::now() + Duration::from_secs(token_response.expires_in.unwrap_or(3600));
        // Intuit rotates the refresh token; keep the newest one for next time
        if let Some(rotated) = token_response.refresh_token {
            state.refresh_token = rotated;
        }

        info!("QuickBooks access token refreshed");
        Ok(token_response.access_token)
    }
}

/// Prepend the default `minorversion` unless the routed query already
/// carries one; a duplicated key would be ambiguous to the remote API.
fn merged_query(minor_version: &str, query: &[(String, String)]) -> Vec<(String, String)> {
    let mut merged = Vec::with_capacity(query.len() + 1);
    if !query.iter().any(|(name, _)| name == "minorversion") {
        merged.push(("minorversion".to_string(), minor_version.to_string()));
    }
    merged.extend_from_slice(query);
    merged
}

#[async_trait]
impl ApiSession for QuickBooksSession {
    async fn execute(
        &self,
        method: HttpMethod,
        route: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let token = self.ensure_token().await?;

        // The realmId placeholder elided from every registered route comes
        // back here, supplied by the session rather than the caller.
        let url = format!("{}/v3/company/{}{}", self.base_url, self.company_id, route);

        debug!(%method, %url, has_body = body.is_some(), "QuickBooks API request");

        let reqwest_method = match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };

        let mut request = self
            .client
            .request(reqwest_method, &url)
            .bearer_auth(&token)
            .header("Accept", "application/json")
            .query(&merged_query(&self.minor_version, query));

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            // Truncate to keep error results readable in tool output
            return Err(Error::Transport(format!(
                "QuickBooks API returned {status}: {}",
                text.chars().take(500).collect::<String>()
            )));
        }

        match serde_json::from_str(&text) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merged_query_prepends_default_minor_version() {
        let query = vec![("query".to_string(), "SELECT * FROM Bill".to_string())];
        assert_eq!(
            merged_query("75", &query),
            vec![
                ("minorversion".to_string(), "75".to_string()),
                ("query".to_string(), "SELECT * FROM Bill".to_string())
            ]
        );
    }

    #[test]
    fn test_merged_query_defers_to_caller_minor_version() {
        let query = vec![("minorversion".to_string(), "70".to_string())];
        assert_eq!(
            merged_query("75", &query),
            vec![("minorversion".to_string(), "70".to_string())]
        );
    }
}
