//! Tool registry.
//!
//! `DatabricksTools` owns the tool handlers and the interaction history. Every
//! tool call goes through [`DatabricksTools::invoke`], which renders failures
//! as text and appends exactly one history record, whatever the outcome. The
//! MCP service and the chat front-end both call into this type.

use crate::config::DatabricksSettings;
use crate::db::{DatabricksClient, StatementExecutor};
use crate::error::{DbxError, DbxResult};
use crate::history::{InteractionHistory, InteractionStatus};
use crate::tools::clusters::ClusterToolHandler;
use crate::tools::jobs::{JobIdInput, JobsToolHandler};
use crate::tools::query::{QueryToolHandler, RunSqlQueryInput};
use crate::tools::schema::{DescribeTableInput, SchemaToolHandler};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

pub const RUN_SQL_QUERY: &str = "run_sql_query";
pub const LIST_DATABASES: &str = "list_databases";
pub const DESCRIBE_TABLE: &str = "describe_table";
pub const LIST_JOBS: &str = "list_jobs";
pub const GET_JOB_STATUS: &str = "get_job_status";
pub const GET_JOB_DETAILS: &str = "get_job_details";
pub const GET_CLUSTER_INFO: &str = "get_cluster_info";
pub const GET_INTERACTION_HISTORY: &str = "get_interaction_history";

/// Every tool name, in the order they are advertised.
pub const TOOL_NAMES: [&str; 8] = [
    RUN_SQL_QUERY,
    LIST_DATABASES,
    DESCRIBE_TABLE,
    LIST_JOBS,
    GET_JOB_STATUS,
    GET_JOB_DETAILS,
    GET_CLUSTER_INFO,
    GET_INTERACTION_HISTORY,
];

/// URI of the table listing resource.
pub const SCHEMA_RESOURCE_URI: &str = "schema://tables";

/// Result of one tool call as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub status: InteractionStatus,
}

impl ToolOutput {
    pub fn is_success(&self) -> bool {
        self.status == InteractionStatus::Success
    }
}

/// The Databricks tools plus the session's interaction history.
#[derive(Debug, Clone)]
pub struct DatabricksTools {
    executor: Arc<StatementExecutor>,
    query: QueryToolHandler,
    schema: SchemaToolHandler,
    jobs: JobsToolHandler,
    clusters: ClusterToolHandler,
    history: InteractionHistory,
}

impl DatabricksTools {
    /// Build the tools for one workspace.
    pub fn new(executor: StatementExecutor, history: InteractionHistory) -> Self {
        let executor = Arc::new(executor);
        let client: DatabricksClient = executor.client().clone();
        Self {
            query: QueryToolHandler::new(executor.clone()),
            schema: SchemaToolHandler::new(executor.clone()),
            jobs: JobsToolHandler::new(client.clone()),
            clusters: ClusterToolHandler::new(client),
            executor,
            history,
        }
    }

    /// Build the tools from validated settings.
    pub fn from_settings(settings: &DatabricksSettings, history_capacity: usize) -> DbxResult<Self> {
        let executor = StatementExecutor::from_settings(settings)?;
        Ok(Self::new(executor, InteractionHistory::new(history_capacity)))
    }

    pub fn history(&self) -> &InteractionHistory {
        &self.history
    }

    pub fn executor(&self) -> &StatementExecutor {
        &self.executor
    }

    /// Run a tool body, render its outcome and record it.
    async fn invoke<F>(&self, tool: &str, input: String, context: &str, body: F) -> ToolOutput
    where
        F: Future<Output = DbxResult<String>>,
    {
        let (text, status) = match body.await {
            Ok(text) => (text, InteractionStatus::Success),
            Err(e) => {
                warn!(tool = %tool, error = %e, retryable = e.is_retryable(), "Tool call failed");
                (e.to_tool_text(context), InteractionStatus::Failure)
            }
        };
        let sequence = self.history.record(tool, &input, &text, status);
        info!(tool = %tool, sequence, status = %status, "Tool call recorded");
        ToolOutput { text, status }
    }

    pub async fn run_sql_query(&self, sql: &str) -> ToolOutput {
        self.invoke(
            RUN_SQL_QUERY,
            sql.to_string(),
            "executing query",
            self.query.run_sql_query(sql),
        )
        .await
    }

    pub async fn list_databases(&self) -> ToolOutput {
        self.invoke(
            LIST_DATABASES,
            "list_databases()".to_string(),
            "listing databases",
            self.query.list_databases(),
        )
        .await
    }

    pub async fn describe_table(&self, table_name: &str) -> ToolOutput {
        self.invoke(
            DESCRIBE_TABLE,
            format!("describe_table({})", table_name),
            &format!("describing table {}", table_name),
            self.schema.describe_table(table_name),
        )
        .await
    }

    pub async fn list_jobs(&self) -> ToolOutput {
        self.invoke(
            LIST_JOBS,
            "list_jobs()".to_string(),
            "listing jobs",
            self.jobs.list_jobs(),
        )
        .await
    }

    pub async fn get_job_status(&self, job_id: i64) -> ToolOutput {
        self.invoke(
            GET_JOB_STATUS,
            format!("get_job_status({})", job_id),
            "getting job status",
            self.jobs.get_job_status(job_id),
        )
        .await
    }

    pub async fn get_job_details(&self, job_id: i64) -> ToolOutput {
        self.invoke(
            GET_JOB_DETAILS,
            format!("get_job_details({})", job_id),
            "getting job details",
            self.jobs.get_job_details(job_id),
        )
        .await
    }

    pub async fn get_cluster_info(&self) -> ToolOutput {
        self.invoke(
            GET_CLUSTER_INFO,
            "get_cluster_info()".to_string(),
            "getting cluster information",
            self.clusters.get_cluster_info(),
        )
        .await
    }

    /// Render the history, then record this call after the rendering.
    pub async fn get_interaction_history(&self) -> ToolOutput {
        let rendered = self.history.render();
        self.invoke(
            GET_INTERACTION_HISTORY,
            "get_interaction_history()".to_string(),
            "getting interaction history",
            async { Ok(rendered) },
        )
        .await
    }

    /// Table listing for the `schema://tables` resource. Not recorded.
    pub async fn get_schema(&self) -> String {
        self.schema.get_schema().await
    }

    /// Dispatch a call by name with JSON arguments, as requested by an LLM.
    ///
    /// Unknown tools and undecodable arguments are reported as error text
    /// without touching the history, mirroring how the MCP layer refuses them
    /// before any tool runs.
    pub async fn dispatch(&self, name: &str, arguments: &JsonValue) -> ToolOutput {
        match self.try_dispatch(name, arguments).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tool = %name, error = %e, "Rejected tool call");
                ToolOutput {
                    text: format!("Error: {}", e),
                    status: InteractionStatus::Failure,
                }
            }
        }
    }

    async fn try_dispatch(&self, name: &str, arguments: &JsonValue) -> DbxResult<ToolOutput> {
        let output = match name {
            RUN_SQL_QUERY => {
                let input: RunSqlQueryInput = decode_args(name, arguments)?;
                self.run_sql_query(&input.sql).await
            }
            LIST_DATABASES => self.list_databases().await,
            DESCRIBE_TABLE => {
                let input: DescribeTableInput = decode_args(name, arguments)?;
                self.describe_table(&input.table_name).await
            }
            LIST_JOBS => self.list_jobs().await,
            GET_JOB_STATUS => {
                let input: JobIdInput = decode_args(name, arguments)?;
                self.get_job_status(input.job_id).await
            }
            GET_JOB_DETAILS => {
                let input: JobIdInput = decode_args(name, arguments)?;
                self.get_job_details(input.job_id).await
            }
            GET_CLUSTER_INFO => self.get_cluster_info().await,
            GET_INTERACTION_HISTORY => self.get_interaction_history().await,
            other => {
                return Err(DbxError::invalid_input(format!("unknown tool '{}'", other)));
            }
        };
        Ok(output)
    }
}

/// Decode tool arguments; `null` is treated as an empty object.
fn decode_args<T: DeserializeOwned>(tool: &str, arguments: &JsonValue) -> DbxResult<T> {
    let value = if arguments.is_null() {
        JsonValue::Object(Default::default())
    } else {
        arguments.clone()
    };
    serde_json::from_value(value)
        .map_err(|e| DbxError::invalid_input(format!("invalid arguments for {}: {}", tool, e)))
}
