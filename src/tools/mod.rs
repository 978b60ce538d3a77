//! Tool implementations.
//!
//! This module contains the Databricks tool handlers:
//! - `query`: `run_sql_query`, `list_databases`
//! - `schema`: `describe_table` and the `schema://tables` listing
//! - `jobs`: `list_jobs`, `get_job_status`, `get_job_details`
//! - `clusters`: `get_cluster_info`
//! - `guard`: SQL allow-list validation
//! - `registry`: history-recording front door used by MCP and chat

pub mod clusters;
pub mod format;
pub mod guard;
pub mod jobs;
pub mod query;
pub mod registry;
pub mod schema;

pub use clusters::ClusterToolHandler;
pub use jobs::{JobIdInput, JobsToolHandler};
pub use query::{QueryToolHandler, RunSqlQueryInput};
pub use registry::{DatabricksTools, SCHEMA_RESOURCE_URI, TOOL_NAMES, ToolOutput};
pub use schema::{DescribeTableInput, SchemaToolHandler};
