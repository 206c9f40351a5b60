//! QuickBooks Online MCP server
//!
//! Exposes the QuickBooks Online accounting API as MCP tools over stdio.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use quickbooks_mcp::{
    catalog::load_catalog,
    cli::{CatalogCommand, Cli, Command},
    config::Config,
    oauth,
    registry::synthesize,
    schema::SchemaCatalog,
    server::McpServer,
    session::{ApiSession, QuickBooksSession},
    setup_tracing,
    tools::ToolRegistry,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup tracing
    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match cli.command {
        Some(Command::Authorize) => run_authorize(cli.env_file.as_deref()).await,
        Some(Command::Catalog(cmd)) => run_catalog_command(cmd),
        Some(Command::Serve) | None => run_server(cli.env_file.as_deref()).await,
    }
}

/// Run the MCP server on stdio
async fn run_server(env_file: Option<&Path>) -> ExitCode {
    let config = match Config::load(env_file) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    // A failed session leaves the server running; every tool call then
    // reports the initialization problem as its result.
    let session: Option<Arc<dyn ApiSession>> = match QuickBooksSession::new(&config) {
        Ok(session) => {
            info!(
                environment = %config.environment,
                company_id = %config.company_id,
                "QuickBooks session initialized"
            );
            Some(Arc::new(session))
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize QuickBooks session");
            None
        }
    };

    let descriptors = match load_catalog(&config.api_catalog) {
        Ok(descriptors) => descriptors,
        Err(e) => {
            error!(path = %config.api_catalog.display(), error = %e, "Failed to load API catalog");
            return ExitCode::FAILURE;
        }
    };

    let operations = match synthesize(&descriptors) {
        Ok(operations) => operations,
        Err(e) => {
            error!(error = %e, "Failed to synthesize operations from catalog");
            return ExitCode::FAILURE;
        }
    };

    info!(
        endpoints = descriptors.len(),
        operations = operations.len(),
        "API catalog loaded"
    );

    let schemas = match SchemaCatalog::load(&config.entity_schemas) {
        Ok(schemas) => {
            info!(count = schemas.len(), "Entity schemas loaded");
            Some(schemas)
        }
        Err(e) => {
            warn!(
                path = %config.entity_schemas.display(),
                error = %e,
                "Entity schemas unavailable, schema tool will report the problem"
            );
            None
        }
    };

    let registry = match ToolRegistry::new(session, schemas, operations) {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Failed to build tool registry");
            return ExitCode::FAILURE;
        }
    };

    let server = McpServer::new(registry);
    info!("Starting MCP server on stdio");

    match server.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}

/// Run the one-time OAuth authorization flow
async fn run_authorize(env_file: Option<&Path>) -> ExitCode {
    let config = match Config::load(env_file) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match oauth::authorize(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Authorization failed: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run catalog maintenance commands
fn run_catalog_command(cmd: CatalogCommand) -> ExitCode {
    match cmd {
        CatalogCommand::Validate { file } => match load_catalog(&file) {
            Ok(descriptors) => match synthesize(&descriptors) {
                Ok(operations) => {
                    println!(
                        "{} - valid ({} endpoints, {} tools)",
                        file.display(),
                        descriptors.len(),
                        operations.len()
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Validation failed: {e}");
                    ExitCode::FAILURE
                }
            },
            Err(e) => {
                eprintln!("Failed to parse: {e}");
                ExitCode::FAILURE
            }
        },

        CatalogCommand::List { file } => match load_catalog(&file) {
            Ok(descriptors) => match synthesize(&descriptors) {
                Ok(operations) => {
                    if operations.is_empty() {
                        println!("No operations in {}", file.display());
                    } else {
                        println!("Found {} tools in {}:\n", operations.len(), file.display());
                        for op in operations {
                            println!("  {} - {} {}", op.name, op.method, op.route);
                        }
                    }
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Failed to synthesize: {e}");
                    ExitCode::FAILURE
                }
            },
            Err(e) => {
                eprintln!("Failed to load: {e}");
                ExitCode::FAILURE
            }
        },
    }
}
