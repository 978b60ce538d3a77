//! Cluster tool: `get_cluster_info`.

use crate::db::DatabricksClient;
use crate::error::DbxResult;
use crate::models::{ClusterInfo, MAX_RESULT_ROWS};
use crate::tools::format::{markdown_table, or_na, push_truncation_notice};

/// Handler for cluster operations.
#[derive(Debug, Clone)]
pub struct ClusterToolHandler {
    client: DatabricksClient,
}

impl ClusterToolHandler {
    pub fn new(client: DatabricksClient) -> Self {
        Self { client }
    }

    pub async fn get_cluster_info(&self) -> DbxResult<String> {
        let clusters = self.client.list_clusters().await?;
        Ok(render_clusters(&clusters))
    }
}

/// Cluster table, at most [`MAX_RESULT_ROWS`] rows.
pub fn render_clusters(clusters: &[ClusterInfo]) -> String {
    if clusters.is_empty() {
        return "No clusters found.".to_string();
    }
    let rows = clusters.iter().take(MAX_RESULT_ROWS).map(|c| {
        [
            c.cluster_id.clone(),
            or_na(c.cluster_name.as_deref()).to_string(),
            or_na(c.state.as_deref()).to_string(),
            or_na(c.node_type_id.as_deref()).to_string(),
            c.workers(),
            or_na(c.spark_version.as_deref()).to_string(),
        ]
    });
    let mut out = String::from("## Available Clusters\n\n");
    out.push_str(&markdown_table(
        &[
            "Cluster ID",
            "Cluster Name",
            "State",
            "Node Type",
            "Workers",
            "Spark Version",
        ],
        rows,
    ));
    if clusters.len() > MAX_RESULT_ROWS {
        push_truncation_notice(&mut out);
    }
    out
}
