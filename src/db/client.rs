//! Authenticated REST client for a Databricks workspace.

use crate::config::DatabricksSettings;
use crate::error::{DbxError, DbxResult};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Error body returned by Databricks REST endpoints.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Thin JSON client over `reqwest` with bearer authentication.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Clone)]
pub struct DatabricksClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for DatabricksClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabricksClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl DatabricksClient {
    /// Create a client for the workspace described by `settings`.
    pub fn new(settings: &DatabricksSettings) -> DbxResult<Self> {
        Self::with_timeout(&settings.base_url, &settings.token, settings.request_timeout)
    }

    /// Create a client with an explicit base URL and request timeout.
    pub fn with_timeout(base_url: &str, token: &str, timeout: Duration) -> DbxResult<Self> {
        if token.is_empty() {
            return Err(DbxError::missing_config(vec![
                crate::config::ENV_DATABRICKS_TOKEN.to_string(),
            ]));
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| DbxError::config("DATABRICKS_TOKEN contains invalid characters"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .user_agent(concat!("databricks-mcp-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DbxError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET` a JSON document.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> DbxResult<T> {
        debug!(path = %path, "GET");
        let response = self
            .http_client
            .get(self.url(path))
            .query(query)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// `POST` a JSON body and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> DbxResult<T> {
        debug!(path = %path, "POST");
        let response = self
            .http_client
            .post(self.url(path))
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> DbxResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(api_error(status.as_u16(), &text));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            // Some endpoints (cancel) answer with an empty body.
            return serde_json::from_slice(b"{}").map_err(|e| {
                DbxError::internal(format!("Failed to decode empty response: {}", e))
            });
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| DbxError::internal(format!("Failed to decode response: {}", e)))
    }
}

/// Map a non-2xx response body to `DbxError::Api`.
fn api_error(status: u16, text: &str) -> DbxError {
    match serde_json::from_str::<ApiErrorBody>(text) {
        Ok(ApiErrorBody {
            error_code,
            message: Some(message),
        }) => DbxError::api(status, error_code, message),
        Ok(ApiErrorBody {
            error_code: Some(code),
            message: None,
        }) => DbxError::api(status, Some(code.clone()), code),
        _ => {
            let text = text.trim();
            let message = if text.is_empty() {
                format!("HTTP {}", status)
            } else {
                text.chars().take(500).collect()
            };
            DbxError::api(status, None, message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_parses_databricks_body() {
        let err = api_error(
            404,
            r#"{"error_code":"RESOURCE_DOES_NOT_EXIST","message":"Job 42 does not exist."}"#,
        );
        match err {
            DbxError::Api {
                status,
                error_code,
                message,
            } => {
                assert_eq!(status, 404);
                assert_eq!(error_code.as_deref(), Some("RESOURCE_DOES_NOT_EXIST"));
                assert_eq!(message, "Job 42 does not exist.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_api_error_falls_back_to_raw_text() {
        let err = api_error(502, "<html>Bad Gateway</html>");
        assert!(matches!(err, DbxError::Api { status: 502, .. }));
        assert!(err.to_string().contains("Bad Gateway"));
    }

    #[test]
    fn test_api_error_empty_body() {
        let err = api_error(401, "");
        assert_eq!(err.to_string(), "Databricks API error (401): HTTP 401");
    }

    #[test]
    fn test_empty_token_rejected() {
        let err = DatabricksClient::with_timeout("https://x", "", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, DbxError::Config { .. }));
    }

    #[test]
    fn test_url_joining() {
        let client =
            DatabricksClient::with_timeout("https://host/", "t", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "https://host");
        assert_eq!(
            client.url("/api/2.0/clusters/list"),
            "https://host/api/2.0/clusters/list"
        );
    }
}
