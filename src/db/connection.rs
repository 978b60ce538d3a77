//! Warehouse connection handles.
//!
//! Statement Execution is stateless HTTP, so a "connection" here is a checked-out
//! handle on the warehouse: opening verifies the warehouse is reachable, and the
//! handle owns whatever statement is currently running on it. Every handle is
//! counted so leaks show up in `ConnectionTracker::open_count`.

use crate::db::client::DatabricksClient;
use crate::error::{DbxError, DbxResult};
use crate::models::WarehouseInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Counts open warehouse handles.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    open: AtomicUsize,
    total_opened: AtomicU64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles currently open.
    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Handles opened since start.
    pub fn total_opened(&self) -> u64 {
        self.total_opened.load(Ordering::SeqCst)
    }

    fn acquire(&self) {
        self.open.fetch_add(1, Ordering::SeqCst);
        self.total_opened.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        // Saturating: a double release must not wrap around.
        let _ = self
            .open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

/// One open handle on a SQL warehouse.
///
/// Call [`WarehouseConnection::close`] when done. If the handle is dropped
/// without closing (error path or panic), `Drop` releases the count and cancels
/// any statement still attached.
pub struct WarehouseConnection {
    client: DatabricksClient,
    warehouse_id: String,
    tracker: Arc<ConnectionTracker>,
    active_statement: Option<String>,
    released: bool,
}

impl std::fmt::Debug for WarehouseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConnection")
            .field("warehouse_id", &self.warehouse_id)
            .field("active_statement", &self.active_statement)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl WarehouseConnection {
    /// Verify the warehouse and open a counted handle on it.
    pub async fn open(
        client: &DatabricksClient,
        warehouse_id: &str,
        tracker: Arc<ConnectionTracker>,
    ) -> DbxResult<Self> {
        let path = format!("/api/2.0/sql/warehouses/{}", warehouse_id);
        let info: WarehouseInfo = client.get_json(&path, &[]).await.map_err(|e| match e {
            DbxError::Api { status: 404, .. } => DbxError::connection(
                format!("SQL warehouse '{}' not found", warehouse_id),
                "Check DATABRICKS_HTTP_PATH points at an existing warehouse",
            ),
            other => other,
        })?;

        if !info.is_usable() {
            return Err(DbxError::connection(
                format!(
                    "SQL warehouse '{}' is {}",
                    warehouse_id,
                    info.state.as_deref().unwrap_or("unavailable")
                ),
                "Use a running warehouse or update DATABRICKS_HTTP_PATH",
            ));
        }

        tracker.acquire();
        debug!(
            warehouse_id = %warehouse_id,
            state = ?info.state,
            open = tracker.open_count(),
            "Warehouse connection opened"
        );

        Ok(Self {
            client: client.clone(),
            warehouse_id: warehouse_id.to_string(),
            tracker,
            active_statement: None,
            released: false,
        })
    }

    /// Attach a running statement so closing the handle cancels it.
    pub fn attach_statement(&mut self, statement_id: impl Into<String>) {
        self.active_statement = Some(statement_id.into());
    }

    /// Detach the statement once it reached a terminal state.
    pub fn detach_statement(&mut self) {
        self.active_statement = None;
    }

    /// Close the handle, cancelling any attached statement.
    pub async fn close(mut self) {
        self.released = true;
        if let Some(statement_id) = self.active_statement.take() {
            cancel_statement(&self.client, &statement_id).await;
        }
        self.tracker.release();
        debug!(
            warehouse_id = %self.warehouse_id,
            open = self.tracker.open_count(),
            "Warehouse connection closed"
        );
    }
}

impl Drop for WarehouseConnection {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.tracker.release();

        let Some(statement_id) = self.active_statement.take() else {
            warn!(
                warehouse_id = %self.warehouse_id,
                "Warehouse connection released via Drop - consider using explicit close()"
            );
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move {
                    cancel_statement(&client, &statement_id).await;
                });
            }
            Err(_) => warn!(
                statement_id = %statement_id,
                "No runtime available to cancel statement on drop"
            ),
        }
    }
}

/// Best-effort cancel; failures are logged, never returned.
async fn cancel_statement(client: &DatabricksClient, statement_id: &str) {
    let path = format!("/api/2.0/sql/statements/{}/cancel", statement_id);
    match client
        .post_json::<_, serde_json::Value>(&path, &serde_json::json!({}))
        .await
    {
        Ok(_) => debug!(statement_id = %statement_id, "Statement cancelled"),
        Err(e) => warn!(statement_id = %statement_id, error = %e, "Failed to cancel statement"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_counts() {
        let tracker = ConnectionTracker::new();
        tracker.acquire();
        tracker.acquire();
        assert_eq!(tracker.open_count(), 2);
        tracker.release();
        assert_eq!(tracker.open_count(), 1);
        assert_eq!(tracker.total_opened(), 2);
    }

    #[test]
    fn test_tracker_release_saturates() {
        let tracker = ConnectionTracker::new();
        tracker.release();
        assert_eq!(tracker.open_count(), 0);
    }
}
