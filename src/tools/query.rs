//! SQL query tools.
//!
//! This module implements `run_sql_query` and `list_databases`. Both go through
//! the query guard, so nothing but SELECT/SHOW/DESCRIBE reaches the warehouse.

use crate::db::StatementExecutor;
use crate::error::DbxResult;
use crate::tools::format::format_query_result;
use crate::tools::guard;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Input for the run_sql_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RunSqlQueryInput {
    /// SQL statement to run. Only SELECT, SHOW and DESCRIBE are allowed, one statement, at most 10,000 characters.
    pub sql: String,
}

/// Handler for SQL query operations.
#[derive(Debug, Clone)]
pub struct QueryToolHandler {
    executor: Arc<StatementExecutor>,
}

impl QueryToolHandler {
    pub fn new(executor: Arc<StatementExecutor>) -> Self {
        Self { executor }
    }

    /// Validate and run a statement, rendering rows as a markdown table.
    pub async fn run_sql_query(&self, sql: &str) -> DbxResult<String> {
        let request = guard::validate(sql)?;
        let result = self.executor.execute(&request).await?;

        info!(
            kind = %request.kind(),
            rows = result.row_count(),
            truncated = result.truncated,
            elapsed_ms = result.execution_time_ms,
            "Query executed"
        );

        Ok(format_query_result(&result))
    }

    /// List catalogs/databases visible on the warehouse.
    pub async fn list_databases(&self) -> DbxResult<String> {
        let request = guard::validate("SHOW DATABASES")?;
        let result = self.executor.execute(&request).await?;

        let names: Vec<&str> = result
            .rows
            .iter()
            .filter_map(|row| row.first().and_then(|v| v.as_deref()))
            .collect();

        if names.is_empty() {
            return Ok("No databases found.".to_string());
        }

        let mut out = String::from("## Available Databases\n\n");
        for name in names {
            out.push_str(&format!("- {}\n", name));
        }
        Ok(out)
    }
}
