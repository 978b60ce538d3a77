//! Stdio transport for the MCP server.
//!
//! JSON-RPC messages are read from stdin and written to stdout, so nothing
//! else may write to stdout while this transport runs. Logs go to stderr.

use crate::error::{DbxError, DbxResult};
use crate::mcp::DatabricksService;
use crate::tools::DatabricksTools;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use std::sync::Arc;
use tracing::{info, warn};

pub struct StdioTransport {
    tools: Arc<DatabricksTools>,
}

impl StdioTransport {
    pub fn new(tools: Arc<DatabricksTools>) -> Self {
        Self { tools }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbxResult<()> {
        info!("Starting MCP server with stdio transport");

        let service = DatabricksService::new(self.tools.clone());
        let running_service = service
            .serve(stdio())
            .await
            .map_err(|e| DbxError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                match result {
                    Ok(_quit_reason) => info!("Stdio transport completed normally"),
                    Err(e) => {
                        warn!(error = %e, "Stdio transport error");
                        return Err(DbxError::internal(format!("Stdio transport error: {}", e)));
                    }
                }
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!(
            open_connections = self.tools.executor().open_connections(),
            interactions = self.tools.history().len(),
            "Stdio session finished"
        );

        if shutdown_requested {
            // A blocking stdin read cannot be interrupted by select!
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
