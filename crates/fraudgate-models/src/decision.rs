use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analyzer::{AnalyzerName, FailureReason};

pub const OUTPUT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Approve,
    Review,
    Decline,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => f.write_str("APPROVE"),
            Decision::Review => f.write_str("REVIEW"),
            Decision::Decline => f.write_str("DECLINE"),
        }
    }
}

/// The verdict produced by aggregation. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalDecision {
    pub decision: Decision,
    /// 0 to 100 weighted risk score.
    pub aggregated_score: Decimal,
    /// Fraction of selected analyzers that succeeded, 0 to 1.
    pub coverage: Decimal,
    /// Risk score of every analyzer that succeeded.
    pub per_analyzer_scores: BTreeMap<AnalyzerName, Decimal>,
    pub reasoning: String,
    pub critical_findings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerStatus {
    Succeeded,
    Failed(FailureReason),
}

/// Per-analyzer audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzerReport {
    pub analyzer: AnalyzerName,
    pub status: AnalyzerStatus,
    pub risk_score: Option<Decimal>,
    /// Failure detail for failed analyzers, empty on success.
    pub detail: String,
    pub elapsed_ms: u64,
}

/// How a decision was reached, for audit trails.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditMetadata {
    pub correlation_id: Uuid,
    pub selected_analyzers: Vec<AnalyzerName>,
    pub analyzer_reports: Vec<AnalyzerReport>,
    pub processing_time_ms: u64,
}

/// The complete output for one evaluated transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvaluationReport {
    pub id: Uuid,
    pub schema_version: u32,
    pub transaction_id: String,
    pub decided_at: DateTime<Utc>,
    pub decision: FinalDecision,
    pub audit: AuditMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn decision_serialization() {
        assert_eq!(serde_json::to_string(&Decision::Approve).unwrap(), "\"APPROVE\"");
        assert_eq!(serde_json::to_string(&Decision::Decline).unwrap(), "\"DECLINE\"");
        let d: Decision = serde_json::from_str("\"REVIEW\"").unwrap();
        assert_eq!(d, Decision::Review);
    }

    #[test]
    fn final_decision_serializes_scores_by_analyzer() {
        let mut scores = BTreeMap::new();
        scores.insert(AnalyzerName::Pattern, dec!(85));
        scores.insert(AnalyzerName::Velocity, dec!(90));

        let decision = FinalDecision {
            decision: Decision::Decline,
            aggregated_score: dec!(78.75),
            coverage: dec!(1),
            per_analyzer_scores: scores,
            reasoning: "DECLINE at 78.75".to_string(),
            critical_findings: vec![],
        };

        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "DECLINE");
        assert_eq!(json["aggregated_score"], "78.75");
        assert_eq!(json["per_analyzer_scores"]["pattern"], "85");
        assert_eq!(json["per_analyzer_scores"]["velocity"], "90");
    }

    #[test]
    fn analyzer_status_serialization() {
        let status = AnalyzerStatus::Failed(FailureReason::Timeout);
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!({"failed": "timeout"})
        );
        assert_eq!(
            serde_json::to_value(AnalyzerStatus::Succeeded).unwrap(),
            serde_json::json!("succeeded")
        );
    }
}
