//! dbadiag MCP Server entry point.
//!
//! This binary starts the MCP server using stdio transport for integration
//! with MCP clients.

use anyhow::{Context, Result};
use dbadiag_mcp_server::{Config, DiagnosticsMcpServer};
use mcpkit::prelude::*;
use mcpkit::transport::stdio::StdioTransport;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for JSON-RPC)
    init_logging();

    let version = env!("CARGO_PKG_VERSION");
    eprintln!("dbadiag MCP Server v{version} starting...");
    eprintln!("Transport: stdio");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] {}", info);
    }));

    let config = Config::from_env().context("invalid configuration")?;
    eprintln!("Configuration loaded successfully");

    let server = DiagnosticsMcpServer::new(config);
    eprintln!("Server initialized. Ready to accept requests...");

    let transport = StdioTransport::new();
    let service = ServerBuilder::new(server.clone())
        .with_tools(server)
        .build()
        .serve(transport);

    tokio::select! {
        result = service => {
            match result {
                Ok(()) => eprintln!("Service stopped"),
                Err(e) => eprintln!("Service error: {e}"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Shutdown signal received");
        }
    }

    eprintln!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,dbadiag_mcp_server=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
