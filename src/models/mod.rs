//! Data models for the Databricks MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod jobs;
pub mod query;
pub mod statement;

pub use jobs::{
    ClusterInfo, ClusterList, Job, JobList, JobRun, JobSettings, JobTask, RunList, RunState,
    WarehouseInfo,
};
pub use query::{
    ColumnMetadata, MAX_RESULT_ROWS, MAX_SQL_LENGTH, QueryRequest, QueryResult, StatementKind,
};
pub use statement::{StatementResponse, StatementState};
