//! QuickBooks Online MCP Server Library
//!
//! Model Context Protocol (MCP) server exposing the QuickBooks Online
//! accounting API as tools over stdio.
//!
//! # Features
//!
//! - **Catalog-driven tools**: a JSON catalog of endpoint descriptors is
//!   turned into one MCP tool per endpoint at startup
//! - **Entity mutations**: fixed create/update/delete/batch tools covering
//!   the mutation protocol shared by all entity types
//! - **SQL-like queries**: `query_quickbooks` passes statements to the
//!   QuickBooks query endpoint
//! - **OAuth2**: refresh-token session management plus a one-shot
//!   authorization flow for initial setup
//!
//! # Protocol Version
//!
//! Implements MCP protocol version 2024-11-05 over line-delimited stdio.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod oauth;
pub mod protocol;
pub mod registry;
pub mod routing;
pub mod schema;
pub mod server;
pub mod session;
pub mod tools;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// # Errors
///
/// Currently infallible but returns `Result` so callers treat logging
/// setup like any other fallible startup step.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
        }
        _ => {
            subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
        }
    }

    Ok(())
}
