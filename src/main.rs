//! Databricks MCP Server - Main entry point.
//!
//! Serves the Databricks tools over MCP on stdio or streamable HTTP.

use databricks_mcp_server::config::{Config, TransportMode};
use databricks_mcp_server::tools::DatabricksTools;
use databricks_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse_args();
    init_tracing(&config);

    // Nothing is served until the workspace settings are complete
    let settings = match config.databricks_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Usage: databricks-mcp-server --databricks-host <host> --databricks-token <token> --databricks-http-path <path>");
            eprintln!();
            eprintln!("Each flag falls back to its environment variable:");
            eprintln!("  DATABRICKS_HOST       e.g. adb-1234567890123456.7.azuredatabricks.net");
            eprintln!("  DATABRICKS_TOKEN      personal access token");
            eprintln!("  DATABRICKS_HTTP_PATH  e.g. /sql/1.0/warehouses/abc123def456");
            std::process::exit(1);
        }
    };

    info!(
        transport = %config.transport,
        host = %settings.base_url,
        warehouse_id = %settings.warehouse_id,
        query_timeout_secs = settings.query_timeout.as_secs(),
        "Starting Databricks MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let tools = Arc::new(DatabricksTools::from_settings(
        &settings,
        config.history_capacity,
    )?);
    info!(
        session_id = %tools.history().session_id(),
        history_capacity = tools.history().capacity(),
        "Interaction history ready"
    );

    let result = match config.transport {
        TransportMode::Stdio => {
            let transport = StdioTransport::new(tools);
            info!(transport = transport.name(), "Using stdio transport");
            transport.run().await
        }
        TransportMode::Http => {
            info!(
                bind_addr = %config.http_bind_addr(),
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            let transport = HttpTransport::new(
                tools,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            );
            transport.run().await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
