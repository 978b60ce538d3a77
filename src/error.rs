//! Error types for the Databricks MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each variant carries a message that can be shown verbatim to the assistant, so
//! tool handlers can turn any failure into readable text instead of a protocol fault.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbxError {
    #[error("Configuration error: {message}")]
    Config {
        /// Names of required environment variables that were not provided
        missing: Vec<String>,
        message: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("{reason}")]
    QueryRejected { reason: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Databricks API error ({status}): {message}")]
    Api {
        status: u16,
        /// e.g., "RESOURCE_DOES_NOT_EXIST"
        error_code: Option<String>,
        message: String,
    },

    #[error("Statement failed: {message}")]
    Execution {
        message: String,
        statement_id: Option<String>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },

    #[error("Unknown resource: {uri}")]
    ResourceNotFound { uri: String },

    #[error("LLM request failed: {message}")]
    Llm { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbxError {
    /// Create a configuration error listing the missing variables.
    pub fn missing_config(missing: Vec<String>) -> Self {
        let message = format!(
            "Missing required configuration: {}. Set them in the environment or pass the matching flags.",
            missing.join(", ")
        );
        Self::Config { missing, message }
    }

    /// Create a configuration error for a present but malformed value.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            missing: Vec::new(),
            message: message.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a query rejection raised by the query guard.
    pub fn query_rejected(reason: impl Into<String>) -> Self {
        Self::QueryRejected {
            reason: reason.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an API error from an HTTP status.
    pub fn api(status: u16, error_code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            error_code,
            message: message.into(),
        }
    }

    /// Create a statement execution error.
    pub fn execution(message: impl Into<String>, statement_id: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            statement_id,
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an error for an MCP resource URI this server does not serve.
    pub fn resource_not_found(uri: impl Into<String>) -> Self {
        Self::ResourceNotFound { uri: uri.into() }
    }

    /// Create an LLM provider error.
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Api { status: 401, .. } | Self::Api { status: 403, .. } => {
                Some("Verify DATABRICKS_TOKEN is valid and has access to this workspace")
            }
            Self::Api { status: 404, .. } => Some("Check that the referenced object exists"),
            Self::Timeout { .. } => {
                Some("Consider narrowing the query or increasing --query-timeout")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Render the error as the text a tool returns to the assistant.
    ///
    /// `context` describes what was being attempted, e.g. "listing jobs".
    pub fn to_tool_text(&self, context: &str) -> String {
        if let Self::QueryRejected { reason } = self {
            return format!("Error: {}", reason);
        }
        match self.suggestion() {
            Some(suggestion) => format!("Error {}: {}. {}", context, self, suggestion),
            None => format!("Error {}: {}", context, self),
        }
    }
}

/// Convert reqwest errors to DbxError.
impl From<reqwest::Error> for DbxError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DbxError::connection(
                format!("Request timed out: {}", err),
                "Check network connectivity or increase --request-timeout",
            )
        } else if err.is_connect() {
            DbxError::connection(
                format!("Unable to reach Databricks: {}", err),
                "Verify DATABRICKS_HOST and network connectivity",
            )
        } else if err.is_decode() {
            DbxError::internal(format!("Failed to decode response: {}", err))
        } else if let Some(status) = err.status() {
            DbxError::api(status.as_u16(), None, err.to_string())
        } else {
            DbxError::connection(
                format!("HTTP error: {}", err),
                "Check network connectivity and workspace status",
            )
        }
    }
}

/// Result type alias for Databricks operations.
pub type DbxResult<T> = Result<T, DbxError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbxError to MCP ErrorData for protocol-level faults.
///
/// Tool handlers do not use this: they render failures as text. It is used for
/// requests the protocol itself must refuse, such as unknown resources.
impl From<DbxError> for rmcp::ErrorData {
    fn from(err: DbxError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            DbxError::InvalidInput { .. } | DbxError::QueryRejected { .. } => {
                rmcp::ErrorData::invalid_params(err.to_string(), data)
            }
            DbxError::ResourceNotFound { .. } | DbxError::Api { status: 404, .. } => {
                rmcp::ErrorData::resource_not_found(err.to_string(), data)
            }
            _ => rmcp::ErrorData::internal_error(err.to_string(), data),
        }
    }
}
