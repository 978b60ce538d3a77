//! Query-related data models.
//!
//! This module defines types for SQL query requests and results.

use serde::{Deserialize, Serialize};

/// Maximum number of rows returned to the caller for a single query.
pub const MAX_RESULT_ROWS: usize = 1000;

/// Maximum accepted SQL length, in characters.
pub const MAX_SQL_LENGTH: usize = 10_000;

/// Statement kinds accepted by the query guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    Select,
    Show,
    Describe,
}

impl StatementKind {
    /// Match a leading keyword (already upper-cased) against the allow-list.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "SELECT" => Some(Self::Select),
            "SHOW" => Some(Self::Show),
            "DESCRIBE" => Some(Self::Describe),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Show => "SHOW",
            Self::Describe => "DESCRIBE",
        }
    }
}

impl std::fmt::Display for StatementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A SQL statement that has passed the query guard.
///
/// Fields are private and the only constructor is crate-internal, so holding a
/// `QueryRequest` proves the statement was validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    sql: String,
    kind: StatementKind,
    row_cap: usize,
}

impl QueryRequest {
    pub(crate) fn validated(sql: String, kind: StatementKind) -> Self {
        Self {
            sql,
            kind,
            row_cap: MAX_RESULT_ROWS,
        }
    }

    /// The normalized statement text (trimmed, trailing `;` removed).
    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Maximum rows handed back to the caller.
    pub fn row_cap(&self) -> usize {
        self.row_cap
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Databricks type name (e.g., "STRING", "BIGINT", "DECIMAL(10,2)")
    pub type_name: String,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows returned by a statement, already capped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    /// Row values as text; SQL NULL is `None`
    pub rows: Vec<Vec<Option<String>>>,
    /// True when the warehouse produced more rows than the cap
    pub truncated: bool,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement_id: Option<String>,
}

impl QueryResult {
    /// Create an empty result (statement produced no result set).
    pub fn empty(execution_time_ms: u64) -> Self {
        Self {
            execution_time_ms,
            ..Self::default()
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column by case-insensitive name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Cell text at `(row, col)`, `None` for NULL or out of range.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .and_then(|v| v.as_deref())
    }
}
