//! Databricks access layer.
//!
//! This module provides:
//! - An authenticated REST client
//! - Warehouse connection handles with leak tracking
//! - Statement execution with polling, chunk following and timeouts
//! - Jobs and Clusters API calls

pub mod client;
pub mod connection;
pub mod executor;
pub mod jobs;

pub use client::DatabricksClient;
pub use connection::{ConnectionTracker, WarehouseConnection};
pub use executor::StatementExecutor;
pub use jobs::{DEFAULT_RUN_LIMIT, JobListing, MAX_JOB_PAGES};
