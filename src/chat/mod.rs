//! Terminal chat front-end.
//!
//! Relays user messages to an Azure OpenAI deployment, runs the tools the
//! model asks for through [`crate::tools::DatabricksTools`], and streams the
//! answer back to the terminal.

pub mod client;
pub mod session;
pub mod sse;
pub mod types;

pub use client::{AzureOpenAiClient, Completion};
pub use session::{ChatSession, Command};
pub use types::{ChatMessage, ChatTool, MAX_TOOL_ROUNDS, SYSTEM_PROMPT};
