//! Chat session: conversation state, the tool-call loop and the terminal REPL.

use crate::chat::client::AzureOpenAiClient;
use crate::chat::types::{ChatMessage, ChatTool, MAX_TOOL_ROUNDS, SYSTEM_PROMPT, ToolCall};
use crate::error::{DbxError, DbxResult};
use crate::mcp::DatabricksService;
use crate::tools::DatabricksTools;
use serde_json::Value as JsonValue;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

const PROMPT: &str = "> ";

/// One line of user input, interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    History,
    Message(String),
    Empty,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Self::Empty,
            "/exit" | "/quit" => Self::Exit,
            "/history" => Self::History,
            text => Self::Message(text.to_string()),
        }
    }
}

pub struct ChatSession {
    client: AzureOpenAiClient,
    tools: Arc<DatabricksTools>,
    definitions: Vec<ChatTool>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    /// Start a conversation advertising the same tools the MCP server does.
    pub fn new(client: AzureOpenAiClient, tools: Arc<DatabricksTools>) -> Self {
        let definitions = DatabricksService::new(tools.clone())
            .tool_definitions()
            .iter()
            .map(ChatTool::from)
            .collect();
        Self {
            client,
            tools,
            definitions,
            messages: vec![ChatMessage::system(SYSTEM_PROMPT)],
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn tool_definitions(&self) -> &[ChatTool] {
        &self.definitions
    }

    /// Answer one user message, streaming text to `out`.
    ///
    /// On failure the conversation is rolled back to before the message so the
    /// next turn starts from a consistent state.
    pub async fn respond<W: Write>(&mut self, user_input: &str, out: &mut W) -> DbxResult<String> {
        let checkpoint = self.messages.len();
        self.messages.push(ChatMessage::user(user_input));
        let result = self.run_turn(out).await;
        if result.is_err() {
            self.messages.truncate(checkpoint);
        }
        result
    }

    async fn run_turn<W: Write>(&mut self, out: &mut W) -> DbxResult<String> {
        for round in 1..=MAX_TOOL_ROUNDS {
            let mut write_error: Option<std::io::Error> = None;
            let completion = self
                .client
                .stream_completion(&self.messages, &self.definitions, |text| {
                    if write_error.is_some() {
                        return;
                    }
                    if let Err(e) = write!(out, "{}", text).and_then(|_| out.flush()) {
                        warn!(error = %e, "Failed to write streamed text to terminal");
                        write_error = Some(e);
                    }
                })
                .await?;
            if let Some(e) = write_error {
                return Err(io_error(e));
            }

            if !completion.wants_tools() {
                writeln!(out).map_err(io_error)?;
                if !completion.content.is_empty() {
                    self.messages
                        .push(ChatMessage::assistant(completion.content.clone()));
                }
                return Ok(completion.content);
            }

            if !completion.content.is_empty() {
                writeln!(out).map_err(io_error)?;
            }
            info!(round, calls = completion.tool_calls.len(), "Model requested tools");
            self.messages.push(ChatMessage::assistant_tool_calls(
                completion.content,
                completion.tool_calls.clone(),
            ));
            for call in &completion.tool_calls {
                writeln!(out, "[calling {}]", call.function.name).map_err(io_error)?;
                let result = self.call_tool(call).await;
                self.messages.push(ChatMessage::tool(call, result));
            }
        }

        Err(DbxError::llm(format!(
            "No answer after {} rounds of tool calls",
            MAX_TOOL_ROUNDS
        )))
    }

    async fn call_tool(&self, call: &ToolCall) -> String {
        let raw = call.function.arguments.trim();
        let arguments = if raw.is_empty() {
            Ok(JsonValue::Null)
        } else {
            serde_json::from_str::<JsonValue>(raw)
        };
        match arguments {
            Ok(arguments) => self.tools.dispatch(&call.function.name, &arguments).await.text,
            Err(e) => {
                warn!(tool = %call.function.name, error = %e, "Model sent malformed arguments");
                format!("Error: Invalid input: arguments are not valid JSON: {}", e)
            }
        }
    }

    /// Read lines until `/exit` or end of input.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> DbxResult<()>
    where
        R: AsyncBufRead + Unpin,
        W: Write,
    {
        let mut lines = input.lines();
        loop {
            write!(out, "{}", PROMPT).map_err(io_error)?;
            out.flush().map_err(io_error)?;

            let Some(line) = lines.next_line().await.map_err(io_error)? else {
                writeln!(out).map_err(io_error)?;
                break;
            };

            match Command::parse(&line) {
                Command::Exit => break,
                Command::Empty => continue,
                Command::History => {
                    writeln!(out, "{}", self.tools.history().render()).map_err(io_error)?;
                }
                Command::Message(text) => {
                    if let Err(e) = self.respond(&text, out).await {
                        warn!(error = %e, "Chat turn failed");
                        writeln!(out, "Error: {}", e).map_err(io_error)?;
                    }
                }
            }
        }
        info!(interactions = self.tools.history().len(), "Chat session ended");
        Ok(())
    }
}

fn io_error(err: std::io::Error) -> DbxError {
    DbxError::internal(format!("Terminal I/O failed: {}", err))
}
