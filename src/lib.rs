//! Databricks MCP Server Library
//!
//! MCP (Model Context Protocol) tools that let AI assistants query a
//! Databricks SQL warehouse and inspect jobs and clusters, plus a terminal
//! chat front-end driving the same tools through Azure OpenAI.

pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::{ChatConfig, Config};
pub use error::{DbxError, DbxResult};
pub use history::InteractionHistory;
pub use mcp::DatabricksService;
pub use tools::DatabricksTools;
