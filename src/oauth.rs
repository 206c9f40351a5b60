//! One-shot OAuth2 authorization-code flow
//!
//! Used once at setup time by the `authorize` subcommand, never by the
//! running server. Opens the Intuit consent page in a browser, receives the
//! redirect on a local listener, exchanges the code for tokens, and prints
//! the `.env` values the session needs. Intuit sends the company (realm) id
//! alongside the authorization code, so both come out of the same flow.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State},
    response::Html,
    routing::get,
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::Client;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::session::TOKEN_ENDPOINT;
use crate::{Error, Result};

/// Intuit authorization (consent) endpoint
const AUTH_ENDPOINT: &str = "https://appcenter.intuit.com/connect/oauth2";

/// Scope covering the accounting API
const SCOPE: &str = "com.intuit.quickbooks.accounting";

/// Query parameters Intuit appends to the redirect
#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    #[serde(rename = "realmId")]
    realm_id: Option<String>,
    error: Option<String>,
}

/// Outcome of a successful callback
#[derive(Debug)]
struct CallbackResult {
    code: String,
    realm_id: String,
}

struct CallbackState {
    expected_state: String,
    tx: Option<oneshot::Sender<Result<CallbackResult>>>,
}

/// Token response from the code exchange
#[derive(Debug, Deserialize)]
struct TokenResponse {
    refresh_token: String,
    #[allow(dead_code)]
    access_token: String,
}

/// Run the full authorization flow and print the resulting `.env` values
pub async fn authorize(config: &Config) -> Result<()> {
    if config.client_id.is_empty() || config.client_secret.is_empty() {
        return Err(Error::Config(
            "QUICKBOOKS_CLIENT_ID and QUICKBOOKS_CLIENT_SECRET must be set before authorizing"
                .to_string(),
        ));
    }

    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();

    let redirect_uri = format!("http://localhost:{}/callback", config.oauth_port);
    let auth_url = build_auth_url(&config.client_id, &redirect_uri, &state)?;

    println!("\nOpening browser for QuickBooks authorization...");
    println!("If the browser does not open, visit:\n{auth_url}\n");

    if let Err(e) = open::that(auth_url.as_str()) {
        warn!(error = %e, "Failed to open browser automatically");
    }

    info!(port = config.oauth_port, "Waiting for authorization callback");
    let callback = wait_for_callback(state, config.oauth_port).await?;

    debug!(realm_id = %callback.realm_id, "Received authorization code");

    let tokens = exchange_code(config, &callback.code, &redirect_uri).await?;

    println!("\nAuthorization successful. Update your .env file:\n");
    println!("QUICKBOOKS_REFRESH_TOKEN={}", tokens.refresh_token);
    println!("QUICKBOOKS_COMPANY_ID={}", callback.realm_id);
    println!();

    Ok(())
}

/// Build the consent URL
fn build_auth_url(client_id: &str, redirect_uri: &str, state: &str) -> Result<Url> {
    let mut url = Url::parse(AUTH_ENDPOINT)
        .map_err(|e| Error::Internal(format!("Invalid auth endpoint: {e}")))?;

    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPE)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("state", state);

    Ok(url)
}

/// Serve a single callback on the configured port and return its result
async fn wait_for_callback(expected_state: String, port: u16) -> Result<CallbackResult> {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind callback listener on {addr}: {e}")))?;

    let (tx, rx) = oneshot::channel();
    let state = Arc::new(Mutex::new(CallbackState {
        expected_state,
        tx: Some(tx),
    }));

    let app = Router::new()
        .route("/callback", get(handle_callback))
        .with_state(state);

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let result = rx
        .await
        .map_err(|_| Error::Internal("Callback channel closed unexpectedly".to_string()))?;

    server.abort();
    result
}

async fn handle_callback(
    State(state): State<Arc<Mutex<CallbackState>>>,
    Query(params): Query<CallbackParams>,
) -> Html<String> {
    let mut state = state.lock().await;

    let outcome = validate_callback(&params, &state.expected_state);

    let page = match &outcome {
        Ok(_) => success_page(),
        Err(e) => error_page(&e.to_string()),
    };

    if let Some(tx) = state.tx.take() {
        let _ = tx.send(outcome);
    }

    Html(page)
}

/// Check the redirect parameters against the expected state
fn validate_callback(params: &CallbackParams, expected_state: &str) -> Result<CallbackResult> {
    if let Some(ref error) = params.error {
        return Err(Error::Internal(format!("Authorization denied: {error}")));
    }

    let code = params
        .code
        .clone()
        .ok_or_else(|| Error::Internal("Missing authorization code".to_string()))?;

    match params.state.as_deref() {
        Some(s) if s == expected_state => {}
        _ => return Err(Error::Internal("State mismatch in OAuth callback".to_string())),
    }

    let realm_id = params
        .realm_id
        .clone()
        .ok_or_else(|| Error::Internal("Missing realmId in OAuth callback".to_string()))?;

    Ok(CallbackResult { code, realm_id })
}

/// Exchange the authorization code for tokens at the bearer endpoint
async fn exchange_code(config: &Config, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
    let client = Client::new();

    let response = client
        .post(TOKEN_ENDPOINT)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .header("Accept", "application/json")
        .form(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::Transport(format!("Token request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Transport(format!(
            "Token exchange failed: HTTP {status} - {body}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| Error::Transport(format!("Failed to parse token response: {e}")))
}

fn success_page() -> String {
    "<html><body style=\"font-family: sans-serif; padding: 40px;\">\
     <h1>Authorization successful</h1>\
     <p>Your refresh token and company id were printed to the terminal. \
     You can close this window.</p>\
     </body></html>"
        .to_string()
}

fn error_page(message: &str) -> String {
    format!(
        "<html><body style=\"font-family: sans-serif; padding: 40px;\">\
         <h1>Authorization failed</h1><p>{message}</p></body></html>"
    )
}
