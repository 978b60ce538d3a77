//! Schema introspection tools.
//!
//! This module implements:
//! - `describe_table`: columns plus the extended table details
//! - `get_schema`: every table in the warehouse, backing the `schema://tables` resource

use crate::db::StatementExecutor;
use crate::error::DbxResult;
use crate::models::QueryResult;
use crate::tools::format::{markdown_table, or_na};
use crate::tools::guard;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Statement used to enumerate tables for the schema resource.
pub const LIST_TABLES_SQL: &str = "SELECT table_catalog, table_schema, table_name \
     FROM system.information_schema.tables \
     ORDER BY table_catalog, table_schema, table_name";

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table to describe, optionally qualified: `table`, `schema.table` or `catalog.schema.table`
    pub table_name: String,
}

/// Handler for schema introspection operations.
#[derive(Debug, Clone)]
pub struct SchemaToolHandler {
    executor: Arc<StatementExecutor>,
}

impl SchemaToolHandler {
    pub fn new(executor: Arc<StatementExecutor>) -> Self {
        Self { executor }
    }

    /// Describe a table's columns and details.
    pub async fn describe_table(&self, table_name: &str) -> DbxResult<String> {
        let table_name = guard::validate_table_name(table_name)?;
        let request = guard::validate(&format!("DESCRIBE TABLE EXTENDED {}", table_name))?;
        let result = self.executor.execute(&request).await?;
        debug!(table = %table_name, rows = result.row_count(), "Described table");
        Ok(render_description(table_name, &result))
    }

    /// One line per table: `Database: <catalog>, Schema: <schema>, Table: <table>`.
    ///
    /// Failures are rendered as text, since resources have no failure channel
    /// the assistant can read.
    pub async fn get_schema(&self) -> String {
        match self.list_tables().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to list tables for schema resource");
                format!("Error retrieving tables: {}", e)
            }
        }
    }

    async fn list_tables(&self) -> DbxResult<String> {
        let request = guard::validate(LIST_TABLES_SQL)?;
        let result = self.executor.execute(&request).await?;

        if result.is_empty() {
            return Ok("No tables found.".to_string());
        }

        let position = |name: &str, fallback: usize| result.column_index(name).unwrap_or(fallback);
        let catalog = position("table_catalog", 0);
        let schema = position("table_schema", 1);
        let table = position("table_name", 2);

        let mut lines: Vec<String> = (0..result.row_count())
            .map(|row| {
                let cell = |col: usize| or_na(result.cell(row, col)).to_string();
                format!(
                    "Database: {}, Schema: {}, Table: {}",
                    cell(catalog),
                    cell(schema),
                    cell(table)
                )
            })
            .collect();
        if result.truncated {
            lines.push(format!(
                "(listing limited to the first {} tables)",
                result.row_count()
            ));
        }
        Ok(lines.join("\n"))
    }
}

fn text(row: &[Option<String>], i: usize) -> String {
    row.get(i)
        .and_then(|v| v.as_deref())
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Render `DESCRIBE TABLE EXTENDED` output.
///
/// Column rows come first and end at the first blank or `#` row. Rows after
/// `# Detailed Table Information` become key/value bullets.
pub fn render_description(table_name: &str, result: &QueryResult) -> String {
    if result.is_empty() {
        return format!("No schema information found for table: {}", table_name);
    }

    let mut columns: Vec<[String; 3]> = Vec::new();
    let mut details: Vec<(String, String)> = Vec::new();
    let mut in_columns = true;
    let mut in_details = false;

    for row in &result.rows {
        let name = text(row, 0);
        if in_columns {
            if name.is_empty() || name.starts_with('#') {
                in_columns = false;
            } else {
                columns.push([
                    name,
                    or_na(Some(text(row, 1).as_str())).to_string(),
                    text(row, 2),
                ]);
                continue;
            }
        }

        if name.starts_with('#') {
            in_details = name.eq_ignore_ascii_case("# Detailed Table Information");
            continue;
        }
        if in_details && !name.is_empty() {
            details.push((name, text(row, 1)));
        }
    }

    let mut out = format!("## Schema for table: {}\n\n", table_name);
    out.push_str(&markdown_table(&["Column", "Type", "Comment"], columns));

    if !details.is_empty() {
        out.push_str("\n### Table Details\n\n");
        for (key, value) in details {
            out.push_str(&format!("- **{}:** {}\n", key, or_na(Some(value.as_str()))));
        }
    }
    out
}
