//! MCP protocol layer.
//!
//! This module contains the rmcp-based service and its resources.

pub mod resources;
pub mod service;

pub use service::DatabricksService;
