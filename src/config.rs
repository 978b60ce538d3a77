//! Configuration handling for the Databricks MCP Server.
//!
//! This module provides configuration management via CLI arguments and environment variables.
//! Required credentials are optional at the clap level so that every missing variable can be
//! reported in a single startup error instead of one at a time.

use crate::error::{DbxError, DbxResult};
use clap::{Args, Parser, ValueEnum};
use std::time::Duration;
use url::Url;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_MCP_ENDPOINT: &str = "/mcp";
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

pub const ENV_DATABRICKS_HOST: &str = "DATABRICKS_HOST";
pub const ENV_DATABRICKS_TOKEN: &str = "DATABRICKS_TOKEN";
pub const ENV_DATABRICKS_HTTP_PATH: &str = "DATABRICKS_HTTP_PATH";
pub const ENV_AZURE_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_AZURE_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_AZURE_DEPLOYMENT: &str = "AZURE_OPENAI_MODEL";
pub const ENV_AZURE_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP with Server-Sent Events (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// Databricks workspace arguments shared by the server and the chat front-end.
#[derive(Debug, Clone, Default, Args)]
pub struct DatabricksArgs {
    /// Workspace host, e.g. adb-1234567890123456.7.azuredatabricks.net
    #[arg(long, env = ENV_DATABRICKS_HOST)]
    pub databricks_host: Option<String>,

    /// Personal access token used for both SQL and REST calls
    #[arg(long, env = ENV_DATABRICKS_TOKEN, hide_env_values = true)]
    pub databricks_token: Option<String>,

    /// SQL warehouse HTTP path, e.g. /sql/1.0/warehouses/abcdef1234567890
    #[arg(long, env = ENV_DATABRICKS_HTTP_PATH)]
    pub databricks_http_path: Option<String>,

    /// Query timeout in seconds; running statements are cancelled after this
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Timeout for a single REST request in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS,
        env = "MCP_REQUEST_TIMEOUT"
    )]
    pub request_timeout: u64,
}

/// Validated Databricks connection settings.
#[derive(Clone)]
pub struct DatabricksSettings {
    /// Base URL of the workspace, without trailing slash
    pub base_url: String,
    pub token: String,
    pub http_path: String,
    /// Warehouse id derived from the HTTP path
    pub warehouse_id: String,
    pub query_timeout: Duration,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for DatabricksSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabricksSettings")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("http_path", &self.http_path)
            .field("warehouse_id", &self.warehouse_id)
            .field("query_timeout", &self.query_timeout)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl DatabricksSettings {
    /// Build settings directly, e.g. for tests against a mock workspace.
    pub fn new(
        host: &str,
        token: impl Into<String>,
        http_path: impl Into<String>,
    ) -> DbxResult<Self> {
        let http_path = http_path.into();
        Ok(Self {
            base_url: normalize_host(host)?,
            token: token.into(),
            warehouse_id: warehouse_id_from_http_path(&http_path)?,
            http_path,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Set the query timeout.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl DatabricksArgs {
    /// Names of required variables that are absent or blank.
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if is_blank(&self.databricks_host) {
            missing.push(ENV_DATABRICKS_HOST.to_string());
        }
        if is_blank(&self.databricks_token) {
            missing.push(ENV_DATABRICKS_TOKEN.to_string());
        }
        if is_blank(&self.databricks_http_path) {
            missing.push(ENV_DATABRICKS_HTTP_PATH.to_string());
        }
        missing
    }

    /// Validate and convert into connection settings.
    pub fn settings(&self) -> DbxResult<DatabricksSettings> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(DbxError::missing_config(missing));
        }
        let (Some(host), Some(token), Some(http_path)) = (
            self.databricks_host.as_deref(),
            self.databricks_token.as_deref(),
            self.databricks_http_path.as_deref(),
        ) else {
            return Err(DbxError::internal("Databricks settings checked but absent"));
        };

        Ok(DatabricksSettings::new(host, token.trim(), http_path.trim())?
            .with_query_timeout(Duration::from_secs(self.query_timeout.max(1)))
            .with_request_timeout(Duration::from_secs(self.request_timeout.max(1))))
    }
}

/// Configuration for the Databricks MCP Server.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "databricks-mcp-server",
    about = "MCP server exposing Databricks SQL, jobs and clusters as tools for AI assistants",
    version,
    author
)]
pub struct Config {
    #[command(flatten)]
    pub databricks: DatabricksArgs,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_HTTP_HOST,
        env = "MCP_HOST"
    )]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(
        long,
        default_value_t = DEFAULT_HTTP_PORT,
        env = "MCP_PORT"
    )]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(
        long,
        default_value = DEFAULT_MCP_ENDPOINT,
        env = "MCP_PATH"
    )]
    pub mcp_endpoint: String,

    /// Maximum number of interaction records kept in memory
    #[arg(
        long,
        default_value_t = DEFAULT_HISTORY_CAPACITY,
        env = "MCP_HISTORY_CAPACITY"
    )]
    pub history_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            databricks: DatabricksArgs {
                query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
                request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
                ..DatabricksArgs::default()
            },
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Validate the Databricks part of the configuration.
    pub fn databricks_settings(&self) -> DbxResult<DatabricksSettings> {
        self.databricks.settings()
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Azure OpenAI arguments for the chat front-end.
#[derive(Debug, Clone, Default, Args)]
pub struct AzureOpenAiArgs {
    /// Azure OpenAI resource endpoint, e.g. https://my-resource.openai.azure.com
    #[arg(long = "azure-endpoint", env = ENV_AZURE_ENDPOINT)]
    pub endpoint: Option<String>,

    /// Azure OpenAI API key
    #[arg(long = "azure-api-key", env = ENV_AZURE_API_KEY, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Deployment name of the chat model
    #[arg(long = "azure-deployment", env = ENV_AZURE_DEPLOYMENT)]
    pub deployment: Option<String>,

    /// API version, e.g. 2024-10-21
    #[arg(long = "azure-api-version", env = ENV_AZURE_API_VERSION)]
    pub api_version: Option<String>,
}

/// Validated Azure OpenAI settings.
#[derive(Clone)]
pub struct AzureOpenAiSettings {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
}

impl std::fmt::Debug for AzureOpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiSettings")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl AzureOpenAiArgs {
    /// Names of required variables that are absent or blank.
    pub fn missing(&self) -> Vec<String> {
        [
            (&self.endpoint, ENV_AZURE_ENDPOINT),
            (&self.api_key, ENV_AZURE_API_KEY),
            (&self.deployment, ENV_AZURE_DEPLOYMENT),
            (&self.api_version, ENV_AZURE_API_VERSION),
        ]
        .into_iter()
        .filter(|(value, _)| is_blank(value))
        .map(|(_, name)| name.to_string())
        .collect()
    }

    /// Validate and convert into client settings.
    pub fn settings(&self) -> DbxResult<AzureOpenAiSettings> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(DbxError::missing_config(missing));
        }
        let field = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();

        let endpoint = field(&self.endpoint).trim_end_matches('/').to_string();
        Url::parse(&endpoint).map_err(|e| {
            DbxError::config(format!("{} is not a valid URL: {}", ENV_AZURE_ENDPOINT, e))
        })?;

        Ok(AzureOpenAiSettings {
            endpoint,
            api_key: field(&self.api_key),
            deployment: field(&self.deployment),
            api_version: field(&self.api_version),
        })
    }
}

/// Configuration for the terminal chat front-end.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "databricks-chat",
    about = "Terminal chat with an Azure OpenAI model that can call the Databricks tools",
    version
)]
pub struct ChatConfig {
    #[command(flatten)]
    pub databricks: DatabricksArgs,

    #[command(flatten)]
    pub azure: AzureOpenAiArgs,

    /// Maximum number of interaction records kept in memory
    #[arg(
        long,
        default_value_t = DEFAULT_HISTORY_CAPACITY,
        env = "MCP_HISTORY_CAPACITY"
    )]
    pub history_capacity: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "MCP_LOG_LEVEL")]
    pub log_level: String,
}

impl ChatConfig {
    /// Validate both credential sets, reporting every missing variable at once.
    pub fn settings(&self) -> DbxResult<(DatabricksSettings, AzureOpenAiSettings)> {
        let mut missing = self.databricks.missing();
        missing.extend(self.azure.missing());
        if !missing.is_empty() {
            return Err(DbxError::missing_config(missing));
        }
        Ok((self.databricks.settings()?, self.azure.settings()?))
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Turn a workspace host into a base URL.
///
/// Bare hosts get an `https://` scheme; explicit schemes are kept so a local
/// mock server can stand in for the workspace.
pub fn normalize_host(host: &str) -> DbxResult<String> {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return Err(DbxError::missing_config(vec![ENV_DATABRICKS_HOST.to_string()]));
    }
    let base = if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    };
    let url = Url::parse(&base).map_err(|e| {
        DbxError::config(format!("{} is not a valid host: {}", ENV_DATABRICKS_HOST, e))
    })?;
    if url.host_str().is_none() {
        return Err(DbxError::config(format!(
            "{} has no host component",
            ENV_DATABRICKS_HOST
        )));
    }
    Ok(base)
}

/// Extract the warehouse id from an HTTP path such as `/sql/1.0/warehouses/<id>`.
pub fn warehouse_id_from_http_path(http_path: &str) -> DbxResult<String> {
    let segments: Vec<&str> = http_path
        .trim()
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        ["sql", _, "warehouses" | "endpoints", id] if is_valid_id(id) => Ok(id.to_string()),
        _ => Err(DbxError::config(format!(
            "{} must look like /sql/1.0/warehouses/<warehouse-id>, got '{}'",
            ENV_DATABRICKS_HTTP_PATH, http_path
        ))),
    }
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_args() -> DatabricksArgs {
        DatabricksArgs {
            databricks_host: Some("adb-123.4.azuredatabricks.net".to_string()),
            databricks_token: Some("dapi-secret".to_string()),
            databricks_http_path: Some("/sql/1.0/warehouses/abc123".to_string()),
            query_timeout: 60,
            request_timeout: 15,
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.mcp_endpoint, DEFAULT_MCP_ENDPOINT);
        assert_eq!(config.history_capacity, DEFAULT_HISTORY_CAPACITY);
    }

    #[test]
    fn test_http_bind_addr() {
        let config = Config {
            http_host: "0.0.0.0".to_string(),
            http_port: 3000,
            ..Config::default()
        };
        assert_eq!(config.http_bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_settings_from_complete_args() {
        let settings = full_args().settings().unwrap();
        assert_eq!(settings.base_url, "https://adb-123.4.azuredatabricks.net");
        assert_eq!(settings.warehouse_id, "abc123");
        assert_eq!(settings.query_timeout, Duration::from_secs(60));
        assert_eq!(settings.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_missing_token_is_config_error() {
        let args = DatabricksArgs {
            databricks_token: None,
            ..full_args()
        };
        let err = args.settings().unwrap_err();
        match err {
            DbxError::Config { missing, .. } => assert_eq!(missing, vec![ENV_DATABRICKS_TOKEN]),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let args = DatabricksArgs {
            databricks_host: Some("   ".to_string()),
            databricks_http_path: Some(String::new()),
            ..full_args()
        };
        assert_eq!(
            args.missing(),
            vec![ENV_DATABRICKS_HOST, ENV_DATABRICKS_HTTP_PATH]
        );
    }

    #[test]
    fn test_default_config_reports_all_missing() {
        let err = Config::default().databricks_settings().unwrap_err();
        let text = err.to_string();
        assert!(text.contains(ENV_DATABRICKS_HOST));
        assert!(text.contains(ENV_DATABRICKS_TOKEN));
        assert!(text.contains(ENV_DATABRICKS_HTTP_PATH));
    }

    #[test]
    fn test_settings_debug_redacts_token() {
        let settings = full_args().settings().unwrap();
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("dapi-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_normalize_host_variants() {
        assert_eq!(
            normalize_host("https://example.cloud.databricks.com/").unwrap(),
            "https://example.cloud.databricks.com"
        );
        assert_eq!(
            normalize_host("http://127.0.0.1:8080").unwrap(),
            "http://127.0.0.1:8080"
        );
        assert!(normalize_host("").is_err());
    }

    #[test]
    fn test_warehouse_id_from_http_path() {
        assert_eq!(
            warehouse_id_from_http_path("/sql/1.0/warehouses/abc123").unwrap(),
            "abc123"
        );
        assert_eq!(
            warehouse_id_from_http_path("sql/1.0/endpoints/legacy-1/").unwrap(),
            "legacy-1"
        );
        assert!(warehouse_id_from_http_path("/sql/protocolv1/o/123/0123-456").is_err());
        assert!(warehouse_id_from_http_path("/sql/1.0/warehouses/").is_err());
    }

    #[test]
    fn test_chat_config_collects_both_missing_sets() {
        let config = ChatConfig {
            databricks: DatabricksArgs {
                databricks_token: None,
                ..full_args()
            },
            azure: AzureOpenAiArgs {
                endpoint: Some("https://res.openai.azure.com/".to_string()),
                api_key: None,
                deployment: Some("gpt-4o".to_string()),
                api_version: Some("2024-10-21".to_string()),
            },
            history_capacity: 10,
            log_level: "warn".to_string(),
        };
        match config.settings().unwrap_err() {
            DbxError::Config { missing, .. } => {
                assert_eq!(missing, vec![ENV_DATABRICKS_TOKEN, ENV_AZURE_API_KEY]);
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_azure_settings_trims_endpoint() {
        let args = AzureOpenAiArgs {
            endpoint: Some("https://res.openai.azure.com/".to_string()),
            api_key: Some("key".to_string()),
            deployment: Some("gpt-4o".to_string()),
            api_version: Some("2024-10-21".to_string()),
        };
        let settings = args.settings().unwrap();
        assert_eq!(settings.endpoint, "https://res.openai.azure.com");
        assert!(!format!("{:?}", settings).contains("\"key\""));
    }

    #[test]
    fn test_parse_explicit_flags() {
        let config = Config::try_parse_from([
            "databricks-mcp-server",
            "--databricks-host",
            "example.cloud.databricks.com",
            "--databricks-token",
            "tok",
            "--databricks-http-path",
            "/sql/1.0/warehouses/w1",
            "--transport",
            "http",
            "--http-port",
            "9000",
        ])
        .unwrap();
        assert_eq!(config.transport, TransportMode::Http);
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.databricks_settings().unwrap().warehouse_id, "w1");
    }
}
