//! MCP resources.
//!
//! One static resource is exposed:
//! - `schema://tables` - every table in the warehouse, one per line

use crate::error::DbxError;
use crate::tools::{DatabricksTools, SCHEMA_RESOURCE_URI};
use rmcp::model::{AnnotateAble, RawResource, ReadResourceResult, Resource, ResourceContents};

/// Build the list of available resources.
pub fn build_resource_list() -> Vec<Resource> {
    let mut resource = RawResource::new(SCHEMA_RESOURCE_URI, "Warehouse tables");
    resource.description = Some(
        "All tables in the Databricks SQL warehouse as 'Database: <catalog>, Schema: <schema>, Table: <table>' lines"
            .to_string(),
    );
    resource.mime_type = Some("text/plain".to_string());
    vec![resource.no_annotation()]
}

/// Read a resource by URI.
pub async fn read_resource(
    tools: &DatabricksTools,
    uri: &str,
) -> Result<ReadResourceResult, DbxError> {
    if uri != SCHEMA_RESOURCE_URI {
        return Err(DbxError::resource_not_found(uri));
    }

    let content = tools.get_schema().await;
    Ok(ReadResourceResult {
        contents: vec![ResourceContents::text(content, uri.to_string())],
    })
}
