use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decision::Decision;

/// Upper bound of every risk score, analyzer-level and aggregated.
pub const MAX_RISK_SCORE: Decimal = Decimal::ONE_HUNDRED;

/// Whether `score` lies in the valid 0 to 100 range.
pub fn is_valid_score(score: Decimal) -> bool {
    (Decimal::ZERO..=MAX_RISK_SCORE).contains(&score)
}

/// Clamp a score into the valid 0 to 100 range.
pub fn clamp_score(score: Decimal) -> Decimal {
    score.clamp(Decimal::ZERO, MAX_RISK_SCORE)
}

/// Identifies one independent risk dimension.
///
/// The name selects the analyzer's weight, its applicability rule and its prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerName {
    Pattern,
    Behavioral,
    Velocity,
    Merchant,
    Geographic,
}

impl AnalyzerName {
    /// Every analyzer, in canonical order.
    pub const ALL: [AnalyzerName; 5] = [
        AnalyzerName::Pattern,
        AnalyzerName::Behavioral,
        AnalyzerName::Velocity,
        AnalyzerName::Merchant,
        AnalyzerName::Geographic,
    ];

    /// Analyzers that run on every transaction regardless of available fields.
    pub const CORE: [AnalyzerName; 3] = [
        AnalyzerName::Pattern,
        AnalyzerName::Behavioral,
        AnalyzerName::Velocity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerName::Pattern => "pattern",
            AnalyzerName::Behavioral => "behavioral",
            AnalyzerName::Velocity => "velocity",
            AnalyzerName::Merchant => "merchant",
            AnalyzerName::Geographic => "geographic",
        }
    }

    pub fn is_core(&self) -> bool {
        Self::CORE.contains(self)
    }
}

impl fmt::Display for AnalyzerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    /// Forces a DECLINE regardless of the aggregated score.
    Critical,
}

/// A single observation reported by an analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    pub description: String,
    #[serde(default)]
    pub severity: Severity,
}

impl Finding {
    pub fn info(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            severity: Severity::Info,
        }
    }

    pub fn warning(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            severity: Severity::Warning,
        }
    }

    pub fn critical(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            severity: Severity::Critical,
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// A successful analyzer result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzerAssessment {
    /// 0 to 100, higher is riskier.
    pub risk_score: Decimal,
    /// Ordered most significant first.
    pub findings: Vec<Finding>,
    pub recommendation: Decision,
    /// Analyzer-specific structured payload, carried through untouched.
    #[serde(default)]
    pub raw_detail: serde_json::Value,
}

impl AnalyzerAssessment {
    pub fn critical_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_critical())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    ExecutionError,
    Skipped,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timeout"),
            FailureReason::ExecutionError => f.write_str("execution_error"),
            FailureReason::Skipped => f.write_str("skipped"),
        }
    }
}

/// Terminal state of one analyzer for one request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzerOutcome {
    Success(AnalyzerAssessment),
    Failed {
        reason: FailureReason,
        detail: String,
    },
}

impl AnalyzerOutcome {
    pub fn failed(reason: FailureReason, detail: impl Into<String>) -> Self {
        AnalyzerOutcome::Failed {
            reason,
            detail: detail.into(),
        }
    }

    pub fn assessment(&self) -> Option<&AnalyzerAssessment> {
        match self {
            AnalyzerOutcome::Success(assessment) => Some(assessment),
            AnalyzerOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AnalyzerOutcome::Success(_))
    }

    pub fn failure_reason(&self) -> Option<FailureReason> {
        match self {
            AnalyzerOutcome::Success(_) => None,
            AnalyzerOutcome::Failed { reason, .. } => Some(*reason),
        }
    }
}

/// An outcome together with how long the analyzer took to reach it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzerRecord {
    pub outcome: AnalyzerOutcome,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn analyzer_name_serialization() {
        assert_eq!(
            serde_json::to_string(&AnalyzerName::Geographic).unwrap(),
            "\"geographic\""
        );
        let name: AnalyzerName = serde_json::from_str("\"velocity\"").unwrap();
        assert_eq!(name, AnalyzerName::Velocity);
        assert_eq!(AnalyzerName::Merchant.to_string(), "merchant");
    }

    #[test]
    fn clamp_score_bounds() {
        assert_eq!(clamp_score(dec!(-3)), dec!(0));
        assert_eq!(clamp_score(dec!(55.5)), dec!(55.5));
        assert_eq!(clamp_score(dec!(130)), dec!(100));
        assert!(is_valid_score(dec!(0)));
        assert!(is_valid_score(dec!(100)));
        assert!(!is_valid_score(dec!(100.01)));
        assert!(!is_valid_score(dec!(-0.5)));
    }

    #[test]
    fn core_analyzers() {
        assert!(AnalyzerName::Pattern.is_core());
        assert!(AnalyzerName::Velocity.is_core());
        assert!(!AnalyzerName::Merchant.is_core());
        assert!(!AnalyzerName::Geographic.is_core());
    }

    #[test]
    fn finding_severity_defaults_to_info() {
        let finding: Finding =
            serde_json::from_str(r#"{"description": "Night-time purchase"}"#).unwrap();
        assert_eq!(finding.severity, Severity::Info);
        assert!(!finding.is_critical());
    }

    #[test]
    fn outcome_is_tagged_by_status() {
        let outcome = AnalyzerOutcome::failed(FailureReason::Timeout, "exceeded 30s");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "timeout");

        let success = AnalyzerOutcome::Success(AnalyzerAssessment {
            risk_score: dec!(42),
            findings: vec![Finding::critical("Card testing sequence")],
            recommendation: Decision::Review,
            raw_detail: serde_json::Value::Null,
        });
        let json = serde_json::to_value(&success).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["recommendation"], "REVIEW");
        assert_eq!(success.assessment().unwrap().critical_findings().count(), 1);
        assert_eq!(success.failure_reason(), None);
    }
}
