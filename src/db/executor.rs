//! Statement execution against a SQL warehouse.
//!
//! Each call opens a warehouse handle, submits the statement through the
//! Statement Execution API, polls until it reaches a terminal state, follows
//! inline result chunks up to the row cap and closes the handle before
//! returning, whatever the outcome.

use crate::config::DatabricksSettings;
use crate::db::client::DatabricksClient;
use crate::db::connection::{ConnectionTracker, WarehouseConnection};
use crate::error::{DbxError, DbxResult};
use crate::models::statement::{ExecuteStatementRequest, ResultData};
use crate::models::{ColumnMetadata, QueryRequest, QueryResult, StatementResponse, StatementState};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

/// Default delay between status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Server-side wait before the submit call returns a pending statement.
const SUBMIT_WAIT_SECS: u64 = 10;

/// Extra time a submit may take past the query deadline so its statement id
/// can still be attached and cancelled.
const SUBMIT_GRACE: Duration = Duration::from_secs(5);

/// Executes guarded queries on one warehouse.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    client: DatabricksClient,
    warehouse_id: String,
    tracker: Arc<ConnectionTracker>,
    query_timeout: Duration,
    poll_interval: Duration,
}

impl StatementExecutor {
    /// Create an executor with default poll interval.
    pub fn new(client: DatabricksClient, warehouse_id: impl Into<String>, query_timeout: Duration) -> Self {
        Self {
            client,
            warehouse_id: warehouse_id.into(),
            tracker: Arc::new(ConnectionTracker::new()),
            query_timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create an executor and its REST client from validated settings.
    pub fn from_settings(settings: &DatabricksSettings) -> DbxResult<Self> {
        let client = DatabricksClient::new(settings)?;
        Ok(Self::new(
            client,
            settings.warehouse_id.clone(),
            settings.query_timeout,
        ))
    }

    /// Set the delay between status polls.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn client(&self) -> &DatabricksClient {
        &self.client
    }

    pub fn warehouse_id(&self) -> &str {
        &self.warehouse_id
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub fn tracker(&self) -> &Arc<ConnectionTracker> {
        &self.tracker
    }

    /// Warehouse handles currently open.
    pub fn open_connections(&self) -> usize {
        self.tracker.open_count()
    }

    /// Execute a guarded query and return at most `row_cap` rows.
    pub async fn execute(&self, request: &QueryRequest) -> DbxResult<QueryResult> {
        let start = Instant::now();
        let deadline = start + self.query_timeout;

        debug!(
            sql = %request.sql(),
            kind = %request.kind(),
            row_cap = request.row_cap(),
            timeout_secs = self.query_timeout.as_secs(),
            "Executing statement"
        );

        let mut conn = self
            .bounded(
                deadline,
                WarehouseConnection::open(&self.client, &self.warehouse_id, self.tracker.clone()),
            )
            .await?;

        let result = self.run(&mut conn, request, start, deadline).await;
        conn.close().await;

        match &result {
            Ok(r) => info!(
                rows = r.row_count(),
                truncated = r.truncated,
                elapsed_ms = r.execution_time_ms,
                "Statement completed"
            ),
            Err(e) => warn!(error = %e, "Statement failed"),
        }
        result
    }

    async fn run(
        &self,
        conn: &mut WarehouseConnection,
        request: &QueryRequest,
        start: Instant,
        deadline: Instant,
    ) -> DbxResult<QueryResult> {
        let cap = request.row_cap();
        let body = ExecuteStatementRequest {
            warehouse_id: &self.warehouse_id,
            statement: request.sql(),
            format: "JSON_ARRAY",
            disposition: "INLINE",
            row_limit: cap as u64 + 1,
            wait_timeout: self.submit_wait(),
            on_wait_timeout: "CONTINUE",
        };

        // A submit abandoned mid-flight leaves a statement nobody can cancel,
        // so it runs past the deadline and the deadline is checked after.
        let mut response: StatementResponse = self
            .bounded(
                deadline + SUBMIT_GRACE,
                self.client.post_json("/api/2.0/sql/statements", &body),
            )
            .await?;
        let statement_id = response.statement_id.clone();
        conn.attach_statement(statement_id.clone());
        if Instant::now() >= deadline && !response.status.state.is_terminal() {
            return Err(self.timed_out());
        }

        let status_path = format!("/api/2.0/sql/statements/{}", statement_id);
        while !response.status.state.is_terminal() {
            let now = Instant::now();
            if now >= deadline {
                return Err(self.timed_out());
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
            response = self
                .bounded(deadline, self.client.get_json(&status_path, &[]))
                .await?;
        }
        conn.detach_statement();

        match response.status.state {
            StatementState::Succeeded => {}
            state => {
                let message = response
                    .status
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| match state {
                        StatementState::Canceled => "Statement was canceled".to_string(),
                        StatementState::Closed => "Statement was closed".to_string(),
                        _ => format!("Statement ended in state {:?}", state),
                    });
                return Err(DbxError::execution(message, Some(statement_id)));
            }
        }

        let manifest = response.manifest.unwrap_or_default();
        let columns: Vec<ColumnMetadata> = manifest
            .schema
            .columns
            .iter()
            .map(|c| ColumnMetadata::new(&c.name, c.display_type()))
            .collect();

        let mut rows = Vec::new();
        let mut next_chunk = None;
        if let Some(data) = response.result {
            next_chunk = data.next_chunk_index;
            rows.extend(data.into_rows());
        }

        while rows.len() <= cap {
            let Some(index) = next_chunk else { break };
            let chunk_path = format!("{}/result/chunks/{}", status_path, index);
            let chunk: ResultData = self
                .bounded(deadline, self.client.get_json(&chunk_path, &[]))
                .await?;
            // Guard against a chunk that points at itself.
            next_chunk = chunk.next_chunk_index.filter(|next| *next > index);
            rows.extend(chunk.into_rows());
        }

        let truncated = rows.len() > cap || manifest.truncated;
        rows.truncate(cap);

        Ok(QueryResult {
            columns,
            rows,
            truncated,
            execution_time_ms: start.elapsed().as_millis() as u64,
            statement_id: Some(statement_id),
        })
    }

    /// Run a request future, failing with a timeout once the query deadline passes.
    async fn bounded<T>(
        &self,
        deadline: Instant,
        fut: impl Future<Output = DbxResult<T>>,
    ) -> DbxResult<T> {
        timeout_at(deadline, fut)
            .await
            .map_err(|_| self.timed_out())?
    }

    fn timed_out(&self) -> DbxError {
        DbxError::timeout("query", self.query_timeout.as_secs())
    }

    fn submit_wait(&self) -> String {
        // The API accepts 0 (async) or 5..=50 seconds. Half the timeout keeps
        // the server-side wait well inside the deadline.
        let secs = (self.query_timeout.as_secs() / 2).min(SUBMIT_WAIT_SECS);
        if secs < 5 {
            "0s".to_string()
        } else {
            format!("{}s", secs)
        }
    }
}
