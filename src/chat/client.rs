//! Streaming Azure OpenAI chat completions client.

use crate::chat::sse::{SseDecoder, SseEvent};
use crate::chat::types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatMessage, ChatTool, ErrorEnvelope, ToolCall,
    ToolCallAccumulator,
};
use crate::config::AzureOpenAiSettings;
use crate::error::{DbxError, DbxResult};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one streamed completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    /// Assistant text, concatenated from all content deltas
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

#[derive(Clone)]
pub struct AzureOpenAiClient {
    url: Url,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for AzureOpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiClient")
            .field("url", &self.url.as_str())
            .finish_non_exhaustive()
    }
}

impl AzureOpenAiClient {
    pub fn new(settings: &AzureOpenAiSettings) -> DbxResult<Self> {
        let mut url = Url::parse(&format!(
            "{}/openai/deployments/{}/chat/completions",
            settings.endpoint.trim_end_matches('/'),
            settings.deployment
        ))
        .map_err(|e| DbxError::config(format!("Invalid Azure OpenAI endpoint: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("api-version", &settings.api_version);

        let mut api_key = HeaderValue::from_str(&settings.api_key)
            .map_err(|_| DbxError::config("AZURE_OPENAI_API_KEY contains invalid characters"))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert("api-key", api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("databricks-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DbxError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { url, http_client })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Request a streamed completion, passing each text delta to `on_text`.
    ///
    /// Returns once the stream reports `[DONE]` or closes.
    pub async fn stream_completion<F>(
        &self,
        messages: &[ChatMessage],
        tools: &[ChatTool],
        mut on_text: F,
    ) -> DbxResult<Completion>
    where
        F: FnMut(&str),
    {
        let request = ChatCompletionRequest::streaming(messages, tools);
        debug!(messages = messages.len(), tools = tools.len(), "Requesting completion");

        let response = self
            .http_client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| DbxError::llm(format!("Azure OpenAI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_from_body(status.as_u16(), &body));
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut state = StreamState::default();

        'read: while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| DbxError::llm(format!("Completion stream interrupted: {}", e)))?;
            for event in decoder.push(&chunk) {
                if state.apply(event, &mut on_text)? {
                    break 'read;
                }
            }
        }
        if !state.done {
            for event in decoder.finish() {
                state.apply(event, &mut on_text)?;
            }
        }

        let completion = state.into_completion();
        debug!(
            finish_reason = completion.finish_reason.as_deref().unwrap_or("none"),
            tool_calls = completion.tool_calls.len(),
            "Completion finished"
        );
        Ok(completion)
    }
}

#[derive(Default)]
struct StreamState {
    content: String,
    tool_calls: ToolCallAccumulator,
    finish_reason: Option<String>,
    done: bool,
}

impl StreamState {
    /// Apply one event; returns true on the `[DONE]` sentinel.
    fn apply<F: FnMut(&str)>(&mut self, event: SseEvent, on_text: &mut F) -> DbxResult<bool> {
        let data = match event {
            SseEvent::Done => {
                self.done = true;
                return Ok(true);
            }
            SseEvent::Data(data) => data,
        };

        let chunk: ChatCompletionChunk = serde_json::from_str(&data)
            .map_err(|e| DbxError::llm(format!("Malformed completion chunk: {}", e)))?;

        // Azure sends content-filter chunks with no choices
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(false);
        };

        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            on_text(&text);
            self.content.push_str(&text);
        }
        for delta in choice.delta.tool_calls.into_iter().flatten() {
            self.tool_calls.apply(delta)?;
        }
        if let Some(reason) = choice.finish_reason {
            self.finish_reason = Some(reason);
        }
        Ok(false)
    }

    fn into_completion(self) -> Completion {
        if self.finish_reason.as_deref() == Some("tool_calls") && self.tool_calls.is_empty() {
            warn!("Model reported tool_calls without any tool call deltas");
        }
        Completion {
            content: self.content,
            tool_calls: self.tool_calls.finish(),
            finish_reason: self.finish_reason,
        }
    }
}

fn error_from_body(status: u16, body: &str) -> DbxError {
    let detail = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.code {
            Some(code) => format!("{} ({})", envelope.error.message, code),
            None => envelope.error.message,
        },
        Err(_) if body.trim().is_empty() => "no response body".to_string(),
        Err(_) => body.chars().take(500).collect(),
    };
    DbxError::llm(format!("Azure OpenAI returned HTTP {}: {}", status, detail))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str) -> AzureOpenAiSettings {
        AzureOpenAiSettings {
            endpoint: endpoint.to_string(),
            api_key: "secret".to_string(),
            deployment: "gpt-4o".to_string(),
            api_version: "2024-10-21".to_string(),
        }
    }

    #[test]
    fn test_completion_url() {
        let client = AzureOpenAiClient::new(&settings("https://res.openai.azure.com/")).unwrap();
        assert_eq!(
            client.url(),
            "https://res.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-10-21"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = AzureOpenAiClient::new(&settings("https://res.openai.azure.com")).unwrap();
        assert!(!format!("{:?}", client).contains("secret"));
    }

    #[test]
    fn test_error_from_body() {
        let err = error_from_body(
            401,
            r#"{"error":{"code":"401","message":"Access denied due to invalid subscription key."}}"#,
        );
        assert_eq!(
            err.to_string(),
            "LLM request failed: Azure OpenAI returned HTTP 401: Access denied due to invalid subscription key. (401)"
        );
        assert!(error_from_body(500, "").to_string().ends_with("no response body"));
    }

    #[test]
    fn test_stream_state_collects_text_and_finish_reason() {
        let mut state = StreamState::default();
        let mut seen = String::new();
        let mut on_text = |t: &str| seen.push_str(t);
        for data in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
        ] {
            assert!(!state.apply(SseEvent::Data(data.into()), &mut on_text).unwrap());
        }
        assert!(state.apply(SseEvent::Done, &mut on_text).unwrap());
        let completion = state.into_completion();
        assert_eq!(seen, "Hello");
        assert_eq!(completion.content, "Hello");
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert!(!completion.wants_tools());
    }

    #[test]
    fn test_malformed_chunk_is_llm_error() {
        let mut state = StreamState::default();
        let err = state
            .apply(SseEvent::Data("{not json".into()), &mut |_: &str| {})
            .unwrap_err();
        assert!(matches!(err, DbxError::Llm { .. }));
    }
}
