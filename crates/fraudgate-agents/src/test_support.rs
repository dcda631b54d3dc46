//! Test support: mock analyzers and transaction fixtures.
//!
//! `MockAnalyzer` returns canned assessments or misbehaves on purpose (fails,
//! hangs, panics, answers late) so dispatch and aggregation can be exercised
//! without the Claude CLI.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fraudgate_models::{
    AnalyzerAssessment, AnalyzerName, AnalyzerOutcome, AnalyzerRecord, EnrichedTransaction,
    FailureReason, Finding, RiskThresholds, Transaction,
};
use rust_decimal::Decimal;

use crate::analyzer::Analyzer;
use crate::error::AnalyzerError;
use crate::normalize::{StandardNormalizer, TransactionNormalizer};
use crate::result_store::ResultSnapshot;

#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Succeed with this assessment.
    Respond(AnalyzerAssessment),
    /// Succeed after sleeping.
    Delayed(Duration, AnalyzerAssessment),
    /// Return an execution error.
    Fail(String),
    /// Never complete.
    Hang,
    /// Panic inside the task.
    Panic,
}

pub struct MockAnalyzer {
    pub name: AnalyzerName,
    pub behavior: MockBehavior,
    calls: AtomicU32,
}

impl MockAnalyzer {
    pub fn new(name: AnalyzerName, behavior: MockBehavior) -> Self {
        Self {
            name,
            behavior,
            calls: AtomicU32::new(0),
        }
    }

    pub fn scoring(name: AnalyzerName, score: Decimal) -> Self {
        Self::new(name, MockBehavior::Respond(assessment(score)))
    }

    pub fn critical(name: AnalyzerName, score: Decimal, finding: &str) -> Self {
        let mut a = assessment(score);
        a.findings.insert(0, Finding::critical(finding));
        Self::new(name, MockBehavior::Respond(a))
    }

    pub fn slow(name: AnalyzerName, delay: Duration, score: Decimal) -> Self {
        Self::new(name, MockBehavior::Delayed(delay, assessment(score)))
    }

    pub fn failing(name: AnalyzerName) -> Self {
        Self::new(name, MockBehavior::Fail(format!("{name} backend unavailable")))
    }

    pub fn hanging(name: AnalyzerName) -> Self {
        Self::new(name, MockBehavior::Hang)
    }

    pub fn panicking(name: AnalyzerName) -> Self {
        Self::new(name, MockBehavior::Panic)
    }

    /// How many times `analyze` was entered.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for MockAnalyzer {
    fn name(&self) -> AnalyzerName {
        self.name
    }

    async fn analyze(
        &self,
        _transaction: &EnrichedTransaction,
    ) -> Result<AnalyzerAssessment, AnalyzerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            MockBehavior::Respond(a) => Ok(a.clone()),
            MockBehavior::Delayed(delay, a) => {
                tokio::time::sleep(*delay).await;
                Ok(a.clone())
            }
            MockBehavior::Fail(msg) => Err(AnalyzerError::Cli(msg.clone())),
            MockBehavior::Hang => {
                std::future::pending::<()>().await;
                Err(AnalyzerError::Cli("unreachable".to_string()))
            }
            MockBehavior::Panic => panic!("{} analyzer panicked", self.name),
        }
    }
}

/// An assessment with one warning finding and the default-threshold recommendation.
pub fn assessment(score: Decimal) -> AnalyzerAssessment {
    AnalyzerAssessment {
        risk_score: score,
        findings: vec![Finding::warning(format!("mock finding at {score}"))],
        recommendation: RiskThresholds::default().classify(score),
        raw_detail: serde_json::Value::Null,
    }
}

/// Build a dispatcher registry from analyzers.
pub fn registry(analyzers: Vec<Arc<dyn Analyzer>>) -> HashMap<AnalyzerName, Arc<dyn Analyzer>> {
    analyzers.into_iter().map(|a| (a.name(), a)).collect()
}

/// A registry where every analyzer in `scores` succeeds with its score.
pub fn scoring_registry(
    scores: &[(AnalyzerName, Decimal)],
) -> HashMap<AnalyzerName, Arc<dyn Analyzer>> {
    registry(
        scores
            .iter()
            .map(|(name, score)| {
                Arc::new(MockAnalyzer::scoring(*name, *score)) as Arc<dyn Analyzer>
            })
            .collect(),
    )
}

/// A result snapshot where every entry succeeded with its score.
pub fn success_snapshot(scores: &[(AnalyzerName, Decimal)]) -> ResultSnapshot {
    scores
        .iter()
        .map(|(name, score)| {
            (
                *name,
                AnalyzerRecord {
                    outcome: AnalyzerOutcome::Success(assessment(*score)),
                    elapsed_ms: 10,
                },
            )
        })
        .collect()
}

/// Mark `name` as failed in `snapshot`.
pub fn fail_in(snapshot: &mut ResultSnapshot, name: AnalyzerName, reason: FailureReason) {
    snapshot.insert(
        name,
        AnalyzerRecord {
            outcome: AnalyzerOutcome::failed(reason, format!("{name} {reason}")),
            elapsed_ms: 10,
        },
    );
}

/// A fully populated transaction that selects all five analyzers.
pub fn sample_transaction_json() -> serde_json::Value {
    serde_json::json!({
        "transaction_id": "TXN-SAMPLE-0001",
        "user_id": "user_sample",
        "user_age_days": 400,
        "total_transactions": 250,
        "amount": 89.99,
        "currency": "USD",
        "time": "13:20",
        "merchant": "Corner Books",
        "merchant_category_code": "5942",
        "merchant_category": "Book Stores",
        "location": "Denver, US",
        "previous_location": "Denver, US",
        "ip_address": "198.51.100.7"
    })
}

pub fn sample_transaction() -> EnrichedTransaction {
    let raw = sample_transaction_json();
    let tx = Transaction::from_value(&raw).unwrap_or_default();
    StandardNormalizer.normalize(&tx)
}
