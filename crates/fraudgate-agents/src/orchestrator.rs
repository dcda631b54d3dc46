use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fraudgate_models::decision::OUTPUT_SCHEMA_VERSION;
use fraudgate_models::{
    AnalyzerName, AnalyzerOutcome, AnalyzerReport, AnalyzerStatus, AnalyzersConfig,
    AuditMetadata, EvaluationReport, FailureReason, FinalDecision, FraudGateConfig, Transaction,
};
use tracing::info;
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::analyzer::Analyzer;
use crate::dispatcher::Dispatcher;
use crate::error::EvaluationError;
use crate::normalize::{StandardNormalizer, TransactionNormalizer};
use crate::result_store::ResultSnapshot;
use crate::selection::select_analyzers;

/// The orchestrator runs one transaction end to end: validate, normalize,
/// select analyzers, fan out, aggregate and attach audit metadata.
pub struct Orchestrator {
    normalizer: Arc<dyn TransactionNormalizer>,
    dispatcher: Dispatcher,
    aggregator: Aggregator,
    analyzers: AnalyzersConfig,
}

impl Orchestrator {
    pub fn new(dispatcher: Dispatcher, aggregator: Aggregator, analyzers: AnalyzersConfig) -> Self {
        Self {
            normalizer: Arc::new(StandardNormalizer),
            dispatcher,
            aggregator,
            analyzers,
        }
    }

    /// Build from a validated configuration and a registry of analyzers.
    pub fn from_config(
        registry: HashMap<AnalyzerName, Arc<dyn Analyzer>>,
        config: &FraudGateConfig,
    ) -> Result<Self, EvaluationError> {
        config.validate()?;
        Ok(Self::new(
            Dispatcher::from_config(registry, &config.engine),
            Aggregator::from_config(&config.engine),
            config.analyzers.clone(),
        ))
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn TransactionNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Evaluate one transaction.
    ///
    /// Only malformed input and duplicate analyzer results are errors;
    /// analyzer failures and insufficient coverage end in a decision.
    pub async fn evaluate(
        &self,
        raw: &serde_json::Value,
    ) -> Result<EvaluationReport, EvaluationError> {
        let start = Instant::now();
        let correlation_id = Uuid::new_v4();

        let transaction = Transaction::from_value(raw)?;
        let enriched = Arc::new(self.normalizer.normalize(&transaction));
        let selected = select_analyzers(&enriched, &self.analyzers);

        info!(
            %correlation_id,
            transaction_id = %enriched.transaction_id,
            analyzers = ?selected,
            risk_factors = ?enriched.risk_factors.active(),
            "Starting evaluation"
        );

        let results = self.dispatcher.run(Arc::clone(&enriched), &selected).await?;
        let decision = self.aggregator.aggregate(&results, &selected);

        info!(
            %correlation_id,
            transaction_id = %enriched.transaction_id,
            decision = %decision.decision,
            score = %decision.aggregated_score,
            coverage = %decision.coverage,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Evaluation complete"
        );

        Ok(build_report(
            enriched.transaction_id.clone(),
            correlation_id,
            decision,
            &selected,
            &results,
            start.elapsed(),
        ))
    }
}

/// Assemble the report for a decided transaction.
pub fn build_report(
    transaction_id: String,
    correlation_id: Uuid,
    decision: FinalDecision,
    selected: &[AnalyzerName],
    results: &ResultSnapshot,
    total_elapsed: Duration,
) -> EvaluationReport {
    let analyzer_reports = selected
        .iter()
        .map(|name| match results.get(name) {
            Some(record) => match &record.outcome {
                AnalyzerOutcome::Success(a) => AnalyzerReport {
                    analyzer: *name,
                    status: AnalyzerStatus::Succeeded,
                    risk_score: Some(a.risk_score),
                    detail: String::new(),
                    elapsed_ms: record.elapsed_ms,
                },
                AnalyzerOutcome::Failed { reason, detail } => AnalyzerReport {
                    analyzer: *name,
                    status: AnalyzerStatus::Failed(*reason),
                    risk_score: None,
                    detail: detail.clone(),
                    elapsed_ms: record.elapsed_ms,
                },
            },
            None => AnalyzerReport {
                analyzer: *name,
                status: AnalyzerStatus::Failed(FailureReason::ExecutionError),
                risk_score: None,
                detail: "no result recorded".to_string(),
                elapsed_ms: 0,
            },
        })
        .collect();

    EvaluationReport {
        id: Uuid::new_v4(),
        schema_version: OUTPUT_SCHEMA_VERSION,
        transaction_id,
        decided_at: chrono::Utc::now(),
        decision,
        audit: AuditMetadata {
            correlation_id,
            selected_analyzers: selected.to_vec(),
            analyzer_reports,
            processing_time_ms: total_elapsed.as_millis() as u64,
        },
    }
}
