//! Shared helpers for integration tests against a mocked Databricks workspace.

#![allow(dead_code)]

use databricks_mcp_server::db::{DatabricksClient, StatementExecutor};
use databricks_mcp_server::history::InteractionHistory;
use databricks_mcp_server::tools::DatabricksTools;
use mockito::{Matcher, Mock, ServerGuard};
use serde_json::{Value, json};
use std::time::Duration;

pub const WAREHOUSE_ID: &str = "abc123";
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn executor(server: &ServerGuard, query_timeout: Duration) -> StatementExecutor {
    let client = DatabricksClient::with_timeout(&server.url(), "dapi-test", Duration::from_secs(5))
        .expect("client");
    StatementExecutor::new(client, WAREHOUSE_ID, query_timeout).with_poll_interval(POLL_INTERVAL)
}

pub fn tools(server: &ServerGuard) -> DatabricksTools {
    DatabricksTools::new(
        executor(server, Duration::from_secs(10)),
        InteractionHistory::new(100),
    )
}

/// `GET /api/2.0/sql/warehouses/{id}` reporting a running warehouse.
pub async fn mock_warehouse(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", format!("/api/2.0/sql/warehouses/{}", WAREHOUSE_ID).as_str())
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({ "id": WAREHOUSE_ID, "name": "Starter Warehouse", "state": "RUNNING" })
                .to_string(),
        )
        .create_async()
        .await
}

/// A finished statement with inline rows.
pub fn succeeded(statement_id: &str, columns: &[(&str, &str)], rows: Vec<Value>) -> Value {
    let columns: Vec<Value> = columns
        .iter()
        .enumerate()
        .map(|(i, (name, ty))| json!({ "name": name, "type_name": ty, "type_text": ty, "position": i }))
        .collect();
    json!({
        "statement_id": statement_id,
        "status": { "state": "SUCCEEDED" },
        "manifest": {
            "format": "JSON_ARRAY",
            "schema": { "column_count": columns.len(), "columns": columns },
            "total_row_count": rows.len(),
            "truncated": false
        },
        "result": { "chunk_index": 0, "row_offset": 0, "row_count": rows.len(), "data_array": rows }
    })
}

/// `POST /api/2.0/sql/statements` answering with `body`.
pub async fn mock_statement(server: &mut ServerGuard, body: Value) -> Mock {
    server
        .mock("POST", "/api/2.0/sql/statements")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await
}

/// `n` rows of `[id, reading]`.
pub fn sensor_rows(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!([i.to_string(), format!("{}.5", 20 + i % 10)]))
        .collect()
}

/// Number of markdown data rows (excluding header and separator).
pub fn table_rows(text: &str) -> usize {
    text.lines()
        .filter(|l| l.starts_with('|'))
        .count()
        .saturating_sub(2)
}
