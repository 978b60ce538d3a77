//! Databricks chat - terminal front-end.
//!
//! Type a question, the model answers using the Databricks tools.
//! `/history` prints the tool calls made so far, `/exit` or end of input quits.

use clap::Parser;
use databricks_mcp_server::chat::{AzureOpenAiClient, ChatSession};
use databricks_mcp_server::config::ChatConfig;
use databricks_mcp_server::tools::DatabricksTools;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(config: &ChatConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ChatConfig::parse();
    init_tracing(&config);

    let (databricks, azure) = match config.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let tools = Arc::new(DatabricksTools::from_settings(
        &databricks,
        config.history_capacity,
    )?);
    let client = AzureOpenAiClient::new(&azure)?;
    info!(
        deployment = %azure.deployment,
        warehouse_id = %databricks.warehouse_id,
        "Chat session starting"
    );

    println!("Databricks chat. Ask about your data, jobs or clusters.");
    println!("Commands: /history, /exit");

    let mut session = ChatSession::new(client, tools);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    session.run(stdin, &mut stdout).await?;
    Ok(())
}
