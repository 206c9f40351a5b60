//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// QuickBooks Online MCP server
#[derive(Parser, Debug)]
#[command(name = "quickbooks-mcp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a .env file with credentials
    #[arg(short, long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "QUICKBOOKS_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "QUICKBOOKS_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the MCP server on stdio (default)
    Serve,

    /// Run the one-time OAuth authorization flow
    Authorize,

    /// API catalog commands
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

/// Catalog subcommands
#[derive(Subcommand, Debug)]
pub enum CatalogCommand {
    /// Validate an API catalog file and report problems
    Validate {
        /// Path to the catalog JSON file
        #[arg(default_value = "quickbooks_apis.json")]
        file: PathBuf,
    },

    /// List the tools a catalog file produces
    List {
        /// Path to the catalog JSON file
        #[arg(default_value = "quickbooks_apis.json")]
        file: PathBuf,
    },
}
