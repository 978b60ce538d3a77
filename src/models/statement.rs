//! Wire types for the Databricks SQL Statement Execution API.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Body of `POST /api/2.0/sql/statements`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteStatementRequest<'a> {
    pub warehouse_id: &'a str,
    pub statement: &'a str,
    pub format: &'static str,
    pub disposition: &'static str,
    pub row_limit: u64,
    pub wait_timeout: String,
    pub on_wait_timeout: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
    Closed,
    #[serde(other)]
    Unknown,
}

impl StatementState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementStatus {
    pub state: StatementState,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(default)]
    pub type_text: Option<String>,
    #[serde(default)]
    pub type_name: Option<String>,
}

impl ColumnInfo {
    /// Prefer the full type text (`DECIMAL(10,2)`) over the bare type name.
    pub fn display_type(&self) -> &str {
        self.type_text
            .as_deref()
            .or(self.type_name.as_deref())
            .unwrap_or("UNKNOWN")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultSchema {
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultManifest {
    #[serde(default)]
    pub schema: ResultSchema,
    #[serde(default)]
    pub total_chunk_count: Option<u64>,
    #[serde(default)]
    pub total_row_count: Option<u64>,
    /// Set by the warehouse when `row_limit` cut the result short
    #[serde(default)]
    pub truncated: bool,
}

/// One inline chunk of rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultData {
    #[serde(default)]
    pub chunk_index: Option<u64>,
    #[serde(default)]
    pub data_array: Vec<Vec<JsonValue>>,
    #[serde(default)]
    pub next_chunk_index: Option<u64>,
}

impl ResultData {
    /// Convert JSON cells to text, keeping SQL NULL as `None`.
    pub fn into_rows(self) -> Vec<Vec<Option<String>>> {
        self.data_array
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect()
    }
}

fn cell_text(value: JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Response of statement submit and poll calls.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementResponse {
    pub statement_id: String,
    pub status: StatementStatus,
    #[serde(default)]
    pub manifest: Option<ResultManifest>,
    #[serde(default)]
    pub result: Option<ResultData>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_succeeded_statement() {
        let body = json!({
            "statement_id": "01ef-abc",
            "status": { "state": "SUCCEEDED" },
            "manifest": {
                "format": "JSON_ARRAY",
                "schema": {
                    "column_count": 2,
                    "columns": [
                        { "name": "id", "type_name": "INT", "type_text": "INT", "position": 0 },
                        { "name": "amount", "type_name": "DECIMAL", "type_text": "DECIMAL(10,2)", "position": 1 }
                    ]
                },
                "total_chunk_count": 1,
                "total_row_count": 1,
                "truncated": false
            },
            "result": {
                "chunk_index": 0,
                "row_offset": 0,
                "row_count": 1,
                "data_array": [["1", null]]
            }
        });

        let response: StatementResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.status.state, StatementState::Succeeded);
        let manifest = response.manifest.unwrap();
        assert_eq!(manifest.schema.columns[1].display_type(), "DECIMAL(10,2)");
        let rows = response.result.unwrap().into_rows();
        assert_eq!(rows, vec![vec![Some("1".to_string()), None]]);
    }

    #[test]
    fn test_unknown_state_is_terminal() {
        let status: StatementStatus =
            serde_json::from_value(json!({ "state": "SOMETHING_NEW" })).unwrap();
        assert_eq!(status.state, StatementState::Unknown);
        assert!(status.state.is_terminal());
        assert!(!StatementState::Running.is_terminal());
        assert!(!StatementState::Pending.is_terminal());
    }

    #[test]
    fn test_non_string_cells_are_stringified() {
        let data = ResultData {
            data_array: vec![vec![json!(42), json!(true), json!("x")]],
            ..ResultData::default()
        };
        assert_eq!(
            data.into_rows(),
            vec![vec![
                Some("42".to_string()),
                Some("true".to_string()),
                Some("x".to_string())
            ]]
        );
    }

    #[test]
    fn test_failed_status_carries_error() {
        let status: StatementStatus = serde_json::from_value(json!({
            "state": "FAILED",
            "error": { "error_code": "BAD_REQUEST", "message": "[TABLE_OR_VIEW_NOT_FOUND]" }
        }))
        .unwrap();
        let error = status.error.unwrap();
        assert_eq!(error.error_code.as_deref(), Some("BAD_REQUEST"));
        assert!(error.message.unwrap().contains("TABLE_OR_VIEW_NOT_FOUND"));
    }
}
