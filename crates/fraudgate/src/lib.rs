//! FraudGate - concurrent fraud-risk analysis and decision aggregation.
//!
//! A transaction is normalized, fanned out to independent risk analyzers
//! running in parallel under per-analyzer timeouts and a global deadline,
//! and their scores are combined into one APPROVE / REVIEW / DECLINE
//! decision with an audit trail.
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use fraudgate::models::FraudGateConfig;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = FraudGateConfig::default();
//! let orchestrator = fraudgate::build_orchestrator(&config)?;
//! let report = fraudgate::evaluate(&orchestrator, &serde_json::json!({"amount": 42.0})).await?;
//! println!("{}", report.decision.decision);
//! # Ok(())
//! # }
//! ```

pub use fraudgate_agents as agents;
pub use fraudgate_models as models;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fraudgate_agents::normalize::generate_transaction_id;
use fraudgate_agents::{
    Analyzer, ClaudeAnalyzer, EvaluationError, HeuristicAnalyzer, Orchestrator, RetryPolicy,
};
use fraudgate_models::{AnalyzerName, AnalyzerProvider, EvaluationReport, FraudGateConfig};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Parse and validate a TOML configuration.
pub fn parse_config(text: &str) -> Result<FraudGateConfig, anyhow::Error> {
    let config: FraudGateConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Timeout for one CLI attempt, so that every retry fits inside the
/// dispatcher's per-analyzer timeout.
pub fn attempt_timeout(config: &FraudGateConfig) -> Duration {
    let attempts = u64::from(config.analyzers.max_retries).saturating_add(1);
    Duration::from_millis((config.engine.analyzer_timeout_ms / attempts).max(1))
}

/// Build one analyzer per enabled analyzer name for the configured provider.
pub fn build_registry(config: &FraudGateConfig) -> HashMap<AnalyzerName, Arc<dyn Analyzer>> {
    let timeout = attempt_timeout(config);
    let retry = RetryPolicy {
        max_retries: config.analyzers.max_retries,
        backoff: Duration::from_millis(config.analyzers.retry_backoff_ms),
    };

    AnalyzerName::ALL
        .into_iter()
        .filter(|name| config.analyzers.is_enabled(*name))
        .map(|name| {
            let analyzer: Arc<dyn Analyzer> = match config.analyzers.provider {
                AnalyzerProvider::Heuristic => Arc::new(HeuristicAnalyzer::new(name)),
                AnalyzerProvider::Claude => Arc::new(ClaudeAnalyzer::new(
                    name,
                    config.analyzers.model_for(name).to_string(),
                    timeout,
                    retry,
                )),
            };
            (name, analyzer)
        })
        .collect()
}

/// Build an Orchestrator from configuration.
pub fn build_orchestrator(config: &FraudGateConfig) -> Result<Orchestrator, anyhow::Error> {
    Ok(Orchestrator::from_config(build_registry(config), config)?)
}

/// Evaluate one transaction using the given orchestrator.
pub async fn evaluate(
    orchestrator: &Orchestrator,
    transaction: &Value,
) -> Result<EvaluationReport, EvaluationError> {
    orchestrator.evaluate(transaction).await
}

/// One entry of a batch result.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Report(Box<EvaluationReport>),
    Error {
        error: String,
        transaction_id: Option<String>,
    },
}

/// The transactions in `input` if it is a batch: a JSON array or an object
/// with a `transactions` array. `None` means a single transaction.
pub fn batch_items(input: &Value) -> Option<&[Value]> {
    match input {
        Value::Array(items) => Some(items),
        Value::Object(map) => match map.get("transactions") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn stated_transaction_id(item: &Value) -> Option<&str> {
    item.get("transaction_id")
        .or_else(|| item.get("transaction").and_then(|t| t.get("transaction_id")))
        .and_then(Value::as_str)
}

/// Evaluate a batch sequentially. A failing item is reported in place and
/// does not stop the rest of the batch.
pub async fn evaluate_batch(orchestrator: &Orchestrator, items: &[Value]) -> Vec<BatchItem> {
    let mut results = Vec::with_capacity(items.len());

    for item in items {
        let mut item = item.clone();
        if let Value::Object(map) = &mut item {
            let has_id = map.contains_key("input_data")
                || map.get("transaction_id").is_some_and(|v| !v.is_null())
                || map
                    .get("transaction")
                    .and_then(|t| t.get("transaction_id"))
                    .is_some_and(|v| !v.is_null());
            if !has_id {
                map.insert(
                    "transaction_id".to_string(),
                    Value::String(generate_transaction_id()),
                );
            }
        }

        match orchestrator.evaluate(&item).await {
            Ok(report) => results.push(BatchItem::Report(Box::new(report))),
            Err(e) => {
                let transaction_id = stated_transaction_id(&item).map(str::to_string);
                warn!(transaction_id = ?transaction_id, error = %e, "Batch item failed");
                results.push(BatchItem::Error {
                    error: e.to_string(),
                    transaction_id,
                });
            }
        }
    }

    results
}
