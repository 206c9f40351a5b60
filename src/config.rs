//! Configuration management
//!
//! All settings come from the environment (prefix `QUICKBOOKS_`), optionally
//! seeded from a `.env` file. Credentials are obtained once with the
//! `authorize` subcommand.

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Intuit environment the server talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Sandbox company (default)
    Sandbox,
    /// Production company
    Production,
}

impl Environment {
    /// API base URL for this environment
    #[must_use]
    pub fn base_url(self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox-quickbooks.api.intuit.com",
            Self::Production => "https://quickbooks.api.intuit.com",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OAuth2 client id from the Intuit developer portal
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Long-lived refresh token (from `quickbooks-mcp authorize`)
    pub refresh_token: String,
    /// Company (realm) id the session is bound to
    pub company_id: String,
    /// Sandbox or production
    pub environment: Environment,
    /// Explicit API base URL override; takes precedence over `environment`
    pub base_url: Option<String>,
    /// `minorversion` query parameter sent on every API call
    pub minor_version: String,
    /// Path to the endpoint catalog JSON
    pub api_catalog: PathBuf,
    /// Path to the entity schema JSON
    pub entity_schemas: PathBuf,
    /// Local port for the one-shot OAuth callback listener
    pub oauth_port: u16,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            company_id: String::new(),
            environment: Environment::Sandbox,
            base_url: None,
            minor_version: "75".to_string(),
            api_catalog: PathBuf::from("quickbooks_apis.json"),
            entity_schemas: PathBuf::from("quickbooks_entity_schemas.json"),
            oauth_port: 8080,
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration: `.env` file (if present) into the process
    /// environment, then `QUICKBOOKS_*` variables over the defaults.
    pub fn load(env_file: Option<&std::path::Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path)
                    .map_err(|e| Error::Config(format!("Failed to load env file {path:?}: {e}")))?;
            }
            None => {
                // Best effort: a missing .env is fine, the environment may
                // already be populated.
                dotenvy::dotenv().ok();
            }
        }

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed("QUICKBOOKS_"))
            .extract()
            .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))
    }

    /// Resolved API base URL
    #[must_use]
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.environment.base_url().to_string())
    }

    /// Check that the credentials needed for a live session are present
    pub fn validate_credentials(&self) -> Result<()> {
        for (value, name) in [
            (&self.client_id, "QUICKBOOKS_CLIENT_ID"),
            (&self.client_secret, "QUICKBOOKS_CLIENT_SECRET"),
            (&self.refresh_token, "QUICKBOOKS_REFRESH_TOKEN"),
            (&self.company_id, "QUICKBOOKS_COMPANY_ID"),
        ] {
            if value.is_empty() {
                return Err(Error::Config(format!("{name} is not set")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.minor_version, "75");
        assert_eq!(config.oauth_port, 8080);
        assert_eq!(
            config.resolved_base_url(),
            "https://sandbox-quickbooks.api.intuit.com"
        );
    }

    #[test]
    fn test_base_url_override() {
        let config = Config {
            base_url: Some("http://127.0.0.1:9999".to_string()),
            environment: Environment::Production,
            ..Config::default()
        };
        assert_eq!(config.resolved_base_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_validate_credentials() {
        let mut config = Config::default();
        let err = config.validate_credentials().unwrap_err();
        assert!(err.to_string().contains("QUICKBOOKS_CLIENT_ID"));

        config.client_id = "id".to_string();
        config.client_secret = "secret".to_string();
        config.refresh_token = "token".to_string();
        config.company_id = "123".to_string();
        assert!(config.validate_credentials().is_ok());
    }
}
