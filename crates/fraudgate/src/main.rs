use std::io::Read;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fraudgate", about = "Concurrent fraud-risk analysis and decision engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/fraudgate.toml")]
    config: String,

    /// Read transaction JSON from a file instead of stdin
    #[arg(short, long)]
    input: Option<String>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays a single JSON document (respects RUST_LOG)
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let config_str = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config: {}", cli.config))?;
    let config = fraudgate::parse_config(&config_str).context("Failed to parse config")?;

    let input = if let Some(input_path) = &cli.input {
        std::fs::read_to_string(input_path)
            .with_context(|| format!("Failed to read input: {input_path}"))?
    } else {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read from stdin")?;
        buf
    };

    let input: Value = serde_json::from_str(&input).context("Failed to parse transaction JSON")?;

    let orchestrator =
        fraudgate::build_orchestrator(&config).context("Failed to build orchestrator")?;

    let output = match fraudgate::batch_items(&input) {
        Some(items) => {
            let results = fraudgate::evaluate_batch(&orchestrator, items).await;
            serde_json::to_value(results)?
        }
        None => {
            let report = fraudgate::evaluate(&orchestrator, &input)
                .await
                .map_err(|e| anyhow::anyhow!("Evaluation failed: {e}"))?;
            serde_json::to_value(report)?
        }
    };

    let output = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{output}");

    Ok(())
}
