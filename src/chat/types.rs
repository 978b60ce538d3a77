//! Azure OpenAI chat completion wire types.

use crate::error::{DbxError, DbxResult};
use rmcp::model::Tool;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Maximum number of tool-call rounds answered for one user message.
pub const MAX_TOOL_ROUNDS: usize = 8;

/// Highest tool call index accepted in one streamed completion.
pub const MAX_TOOL_CALL_INDEX: usize = MAX_TOOL_ROUNDS * 8;

pub const SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant with direct access to Databricks tools.

When users ask about Databricks data, jobs, or infrastructure, ALWAYS use these tools instead of providing generic SQL examples.

For example:
- \"Show me databases\" -> use the list_databases tool
- \"What tables do I have?\" -> use run_sql_query with \"SHOW TABLES\"
- \"Describe the sales table\" -> use describe_table with \"sales\"
- \"What jobs are running?\" -> use the list_jobs tool

Be direct and actionable: use the tools to get real information from the user's Databricks environment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn new(role: Role, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, Some(content.into()))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, Some(content.into()))
    }

    /// Assistant turn that requested tool calls. Any streamed text is kept.
    pub fn assistant_tool_calls(content: String, calls: Vec<ToolCall>) -> Self {
        let content = (!content.is_empty()).then_some(content);
        Self {
            tool_calls: Some(calls),
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call.id.clone()),
            name: Some(call.function.name.clone()),
            ..Self::new(Role::Tool, Some(content.into()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments exactly as streamed by the model
    pub arguments: String,
}

/// A function tool advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: FunctionDef,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

impl From<&Tool> for ChatTool {
    fn from(tool: &Tool) -> Self {
        let mut schema = (*tool.input_schema).clone();
        // Azure rejects schema metadata it does not understand
        schema.remove("$schema");
        schema.remove("title");
        schema
            .entry("type")
            .or_insert_with(|| JsonValue::String("object".to_string()));
        schema
            .entry("properties")
            .or_insert_with(|| JsonValue::Object(Default::default()));

        Self {
            kind: "function",
            function: FunctionDef {
                name: tool.name.to_string(),
                description: tool.description.as_deref().unwrap_or_default().to_string(),
                parameters: JsonValue::Object(schema),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "<[ChatTool]>::is_empty")]
    pub tools: &'a [ChatTool],
    pub temperature: f32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

impl<'a> ChatCompletionRequest<'a> {
    /// Streaming request with deterministic sampling and one tool call at a time.
    pub fn streaming(messages: &'a [ChatMessage], tools: &'a [ChatTool]) -> Self {
        Self {
            messages,
            tools,
            temperature: 0.0,
            stream: true,
            // Only valid alongside tools
            parallel_tool_calls: (!tools.is_empty()).then_some(false),
        }
    }
}

/// One `data:` payload of a streamed completion.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Delta,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Delta {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: usize,
    pub id: Option<String>,
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionDelta {
    pub name: Option<String>,
    pub arguments: Option<String>,
}

/// Error body returned by Azure OpenAI on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    pub code: Option<String>,
}

/// Rebuilds whole tool calls from streamed fragments keyed by index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: Vec<ToolCall>,
}

impl ToolCallAccumulator {
    /// Merge one fragment. Indexes above [`MAX_TOOL_CALL_INDEX`] are refused.
    pub fn apply(&mut self, delta: ToolCallDelta) -> DbxResult<()> {
        if delta.index > MAX_TOOL_CALL_INDEX {
            return Err(DbxError::llm(format!(
                "Tool call index {} exceeds {}",
                delta.index, MAX_TOOL_CALL_INDEX
            )));
        }
        while self.calls.len() <= delta.index {
            self.calls.push(ToolCall {
                id: String::new(),
                kind: "function".to_string(),
                function: FunctionCall {
                    name: String::new(),
                    arguments: String::new(),
                },
            });
        }
        let call = &mut self.calls[delta.index];
        if let Some(id) = delta.id {
            call.id = id;
        }
        if let Some(function) = delta.function {
            if let Some(name) = function.name {
                call.function.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                call.function.arguments.push_str(&arguments);
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls, skipping slots that never received a name.
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter(|c| !c.function.name.is_empty())
            .collect()
    }
}
