pub mod analyzer;
pub mod config;
pub mod decision;
pub mod transaction;

pub use analyzer::{
    clamp_score, is_valid_score, AnalyzerAssessment, AnalyzerName, AnalyzerOutcome, AnalyzerRecord,
    FailureReason, Finding, Severity, MAX_RISK_SCORE,
};
pub use config::{
    AnalyzerConfig, AnalyzerProvider, AnalyzersConfig, ConfigError, EngineConfig,
    FraudGateConfig, RiskThresholds, WeightTable,
};
pub use decision::{
    AnalyzerReport, AnalyzerStatus, AuditMetadata, Decision, EvaluationReport, FinalDecision,
};
pub use transaction::{
    EnrichedTransaction, RiskFactors, Transaction, ValidationError, VelocityCounters,
};
