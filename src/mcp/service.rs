//! MCP service implementation using rmcp.
//!
//! This module defines the DatabricksService struct with all Databricks tools
//! exposed via the MCP protocol using the rmcp framework's macros. Each tool
//! delegates to [`DatabricksTools`], which records the call in the session
//! history and turns failures into readable text.

use crate::mcp::resources::{build_resource_list, read_resource};
use crate::tools::{DatabricksTools, DescribeTableInput, JobIdInput, RunSqlQueryInput, ToolOutput};
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{
        CallToolResult, Content, Implementation, ListResourcesResult, PaginatedRequestParam,
        ProtocolVersion, ReadResourceRequestParam, ReadResourceResult, ServerCapabilities,
        ServerInfo, Tool,
    },
    service::{RequestContext, RoleServer},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct DatabricksService {
    /// Shared tools and interaction history
    tools: Arc<DatabricksTools>,
    /// Tool router for MCP tool dispatch (auto-generated)
    tool_router: ToolRouter<Self>,
}

impl DatabricksService {
    /// Create a new DatabricksService instance.
    ///
    /// Services created for separate HTTP sessions share the same `tools`, and
    /// with it the same interaction history.
    pub fn new(tools: Arc<DatabricksTools>) -> Self {
        Self {
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Tool definitions as advertised over MCP.
    pub fn tool_definitions(&self) -> Vec<Tool> {
        self.tool_router.list_all()
    }
}

fn text_result(output: ToolOutput) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(output.text)]))
}

#[tool_router]
impl DatabricksService {
    #[tool(
        description = "Execute a SQL query on the Databricks SQL warehouse.\nOnly SELECT, SHOW and DESCRIBE statements are allowed, one statement per call, up to 10,000 characters.\nResults are returned as a markdown table of at most 1000 rows."
    )]
    async fn run_sql_query(
        &self,
        Parameters(input): Parameters<RunSqlQueryInput>,
    ) -> Result<CallToolResult, McpError> {
        text_result(self.tools.run_sql_query(&input.sql).await)
    }

    #[tool(description = "List all databases (schemas) available on the Databricks SQL warehouse.")]
    async fn list_databases(&self) -> Result<CallToolResult, McpError> {
        text_result(self.tools.list_databases().await)
    }

    #[tool(
        description = "Get the schema of a table: column names, types and comments, plus extended table details.\nAccepts `table`, `schema.table` or `catalog.schema.table`."
    )]
    async fn describe_table(
        &self,
        Parameters(input): Parameters<DescribeTableInput>,
    ) -> Result<CallToolResult, McpError> {
        text_result(self.tools.describe_table(&input.table_name).await)
    }

    #[tool(description = "List all Databricks jobs with their IDs, names and creators.")]
    async fn list_jobs(&self) -> Result<CallToolResult, McpError> {
        text_result(self.tools.list_jobs().await)
    }

    #[tool(
        description = "Get the recent run history of a Databricks job: state, start and end time, and duration of each run."
    )]
    async fn get_job_status(
        &self,
        Parameters(input): Parameters<JobIdInput>,
    ) -> Result<CallToolResult, McpError> {
        text_result(self.tools.get_job_status(input.job_id).await)
    }

    #[tool(
        description = "Get detailed configuration of a Databricks job: creator, creation time, schedule and tasks."
    )]
    async fn get_job_details(
        &self,
        Parameters(input): Parameters<JobIdInput>,
    ) -> Result<CallToolResult, McpError> {
        text_result(self.tools.get_job_details(input.job_id).await)
    }

    #[tool(
        description = "List Databricks clusters with their ID, name, state, node type, workers and Spark version."
    )]
    async fn get_cluster_info(&self) -> Result<CallToolResult, McpError> {
        text_result(self.tools.get_cluster_info().await)
    }

    #[tool(
        description = "Show the history of tool calls made in this session, oldest first, with inputs and abbreviated outputs."
    )]
    async fn get_interaction_history(&self) -> Result<CallToolResult, McpError> {
        text_result(self.tools.get_interaction_history().await)
    }
}

#[tool_handler]
impl ServerHandler for DatabricksService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_owned(),
                title: Some("Databricks MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Databricks tools for querying a SQL warehouse and inspecting jobs and clusters.\n\
                \n\
                ## Workflow\n\
                1. Call `list_databases` to see what is available\n\
                2. Use `describe_table` before writing queries against an unfamiliar table\n\
                3. Run read-only SQL with `run_sql_query`\n\
                \n\
                ## Limits\n\
                - Only SELECT, SHOW and DESCRIBE statements are accepted, one per call\n\
                - Queries are limited to 10,000 characters; results to 1000 rows\n\
                \n\
                ## Jobs and Clusters\n\
                - `list_jobs` gives job IDs for `get_job_status` and `get_job_details`\n\
                - `get_cluster_info` lists clusters and their state\n\
                \n\
                ## Resources\n\
                - `schema://tables` lists every table in the warehouse"
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult {
            resources: build_resource_list(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        debug!(uri = %request.uri, "Reading resource");
        read_resource(&self.tools, &request.uri)
            .await
            .map_err(McpError::from)
    }
}
