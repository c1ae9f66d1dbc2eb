//! AI Gateway command-line probe
//!
//! Usage:
//!   ai-gateway health
//!   ai-gateway embed <text>
//!   ai-gateway chat <prompt>
//!
//! Configuration comes from the TOML file named by `AI_GATEWAY_CONFIG`, or
//! from the `AZURE_OPENAI_*` environment variables when that is unset.

use ai_gateway::{
    chat::ChatMessage,
    config::GatewayConfig,
    observability::init_observability,
    AiGateway,
};
use anyhow::{bail, Context};
use futures::StreamExt;
use serde_json::json;
use std::io::Write;
use tracing::info;

const USAGE: &str = "usage: ai-gateway <health | embed <text> | chat <prompt>>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!(USAGE);
    };
    let input = rest.join(" ");

    let config = match std::env::var("AI_GATEWAY_CONFIG") {
        Ok(path) => GatewayConfig::from_file_with_env(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        Err(_) => GatewayConfig::from_env().context("Failed to load configuration from environment")?,
    };

    init_observability(&config.logging);
    info!("Running '{}'", command);

    let gateway = AiGateway::new(config)?;

    match command.as_str() {
        "health" => {
            let health = gateway.health_checker().check_health_fresh().await;
            println!("{}", serde_json::to_string_pretty(&health)?);
            if !health.overall {
                std::process::exit(1);
            }
        }
        "embed" => {
            if input.trim().is_empty() {
                bail!(USAGE);
            }
            let result = gateway.embeddings().embed(&input).await?;
            let output = json!({
                "text": result.text,
                "dimension": result.embedding.len(),
                "token_count": result.token_count,
                "preview": &result.embedding[..result.embedding.len().min(8)],
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        "chat" => {
            if input.trim().is_empty() {
                bail!(USAGE);
            }
            let streaming = gateway
                .chat()
                .stream_complete(&[ChatMessage::user(input)])
                .await?;

            let mut stream = streaming.stream;
            let mut finish_reason = None;
            let mut stdout = std::io::stdout();
            while let Some(entry) = stream.next().await {
                let entry = entry?;
                if let Some(content) = entry.content {
                    write!(stdout, "{}", content)?;
                    stdout.flush()?;
                }
                if entry.finish_reason.is_some() {
                    finish_reason = entry.finish_reason;
                }
            }
            writeln!(stdout)?;

            let usage = streaming.usage.await?;
            let output = json!({
                "finish_reason": finish_reason,
                "usage": usage,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        other => bail!("unknown command '{}'\n{}", other, USAGE),
    }

    let metrics = gateway.metrics().snapshot();
    info!(
        "Provider calls: {}, attempts: {}, failures: {}",
        metrics.total_calls, metrics.total_attempts, metrics.total_failures
    );

    Ok(())
}
