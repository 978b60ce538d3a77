//! HTTP transport with Streamable HTTP support for the MCP server.
//!
//! Every MCP session gets its own `DatabricksService`, all sharing one set of
//! tools and therefore one interaction history.

use crate::error::{DbxError, DbxResult};
use crate::mcp::DatabricksService;
use crate::tools::DatabricksTools;
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Time allowed for open SSE streams to finish after a shutdown signal.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpTransport {
    tools: Arc<DatabricksTools>,
    host: String,
    port: u16,
    /// MCP endpoint path
    endpoint: String,
}

impl HttpTransport {
    pub fn new(
        tools: Arc<DatabricksTools>,
        host: impl Into<String>,
        port: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            tools,
            host: host.into(),
            port,
            endpoint: endpoint.into(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn router(&self) -> axum::Router {
        let tools = self.tools.clone();
        let service = StreamableHttpService::new(
            move || Ok(DatabricksService::new(tools.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/", so the root endpoint uses a fallback
        if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        }
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbxResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting MCP server with HTTP transport on {}", bind_addr);

        let app = self.router();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbxError::connection(
                format!("Failed to bind to {}: {}", bind_addr, e),
                "Check that the port is available",
            )
        })?;

        info!(endpoint = %self.endpoint, "MCP endpoint ready");

        let signalled = Arc::new(Notify::new());
        let on_signal = signalled.clone();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            wait_for_signal().await;
            on_signal.notify_one();
        });

        tokio::select! {
            served = server => {
                if let Err(e) = served {
                    error!(error = %e, "HTTP server error");
                    return Err(DbxError::internal(format!("HTTP server error: {}", e)));
                }
                info!("HTTP server stopped");
            }
            _ = force_stop_after(signalled) => {}
        }

        info!(
            open_connections = self.tools.executor().open_connections(),
            interactions = self.tools.history().len(),
            "HTTP transport finished"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// After the first signal, give open SSE streams `GRACEFUL_TIMEOUT` to drain.
/// A second signal cuts the wait short.
async fn force_stop_after(signalled: Arc<Notify>) {
    signalled.notified().await;
    info!(
        timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
        "Draining open streams (send signal again to force exit)"
    );
    tokio::select! {
        _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => warn!("Drain timeout reached, stopping"),
        _ = wait_for_signal() => warn!("Second signal received, stopping now"),
    }
}
