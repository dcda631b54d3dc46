use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzer::{is_valid_score, AnalyzerName};
use crate::decision::Decision;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("thresholds need decline_at > review_at >= 0, got {decline_at} and {review_at}")]
    Thresholds {
        decline_at: Decimal,
        review_at: Decimal,
    },

    #[error("weight for {0} must be non-negative, got {1}")]
    NegativeWeight(AnalyzerName, Decimal),

    #[error("coverage penalty must be within 0 to 100, got {0}")]
    Penalty(Decimal),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Top-level configuration for FraudGate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FraudGateConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub analyzers: AnalyzersConfig,
}

impl FraudGateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()
    }
}

/// Configuration for dispatch and aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-analyzer timeout in milliseconds.
    pub analyzer_timeout_ms: u64,
    /// Deadline for the whole fan-out in milliseconds.
    pub global_deadline_ms: u64,
    /// Minimum successful analyzers before a score is trusted.
    pub min_required_analyzers: usize,
    /// Points added to the aggregated score per failed analyzer. Off when absent.
    pub coverage_penalty_per_failure: Option<Decimal>,
    pub thresholds: RiskThresholds,
    pub weights: WeightTable,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzer_timeout_ms: 30_000,
            global_deadline_ms: 60_000,
            min_required_analyzers: 3,
            coverage_penalty_per_failure: None,
            thresholds: RiskThresholds::default(),
            weights: WeightTable::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analyzer_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("analyzer_timeout_ms"));
        }
        if self.global_deadline_ms == 0 {
            return Err(ConfigError::ZeroDuration("global_deadline_ms"));
        }
        if let Some(penalty) = self.coverage_penalty_per_failure {
            if !is_valid_score(penalty) {
                return Err(ConfigError::Penalty(penalty));
            }
        }
        self.thresholds.validate()?;
        self.weights.validate()
    }
}

/// Score boundaries. Below `review_at` approves, at or above `decline_at` declines.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskThresholds {
    pub decline_at: Decimal,
    pub review_at: Decimal,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            decline_at: Decimal::from(70),
            review_at: Decimal::from(40),
        }
    }
}

impl RiskThresholds {
    pub fn new(decline_at: Decimal, review_at: Decimal) -> Result<Self, ConfigError> {
        let thresholds = Self {
            decline_at,
            review_at,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.review_at < Decimal::ZERO || self.decline_at <= self.review_at {
            return Err(ConfigError::Thresholds {
                decline_at: self.decline_at,
                review_at: self.review_at,
            });
        }
        Ok(())
    }

    pub fn classify(&self, score: Decimal) -> Decision {
        if score >= self.decline_at {
            Decision::Decline
        } else if score >= self.review_at {
            Decision::Review
        } else {
            Decision::Approve
        }
    }
}

/// Relative weight of each analyzer in the aggregated score.
///
/// Weights need not sum to one; they are renormalized over the analyzers
/// that actually succeeded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WeightTable {
    pub pattern: Decimal,
    pub behavioral: Decimal,
    pub velocity: Decimal,
    pub merchant: Decimal,
    pub geographic: Decimal,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self {
            pattern: Decimal::new(25, 2),
            behavioral: Decimal::new(20, 2),
            velocity: Decimal::new(25, 2),
            merchant: Decimal::new(15, 2),
            geographic: Decimal::new(15, 2),
        }
    }
}

impl WeightTable {
    pub fn weight(&self, name: AnalyzerName) -> Decimal {
        match name {
            AnalyzerName::Pattern => self.pattern,
            AnalyzerName::Behavioral => self.behavioral,
            AnalyzerName::Velocity => self.velocity,
            AnalyzerName::Merchant => self.merchant,
            AnalyzerName::Geographic => self.geographic,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in AnalyzerName::ALL {
            let weight = self.weight(name);
            if weight < Decimal::ZERO {
                return Err(ConfigError::NegativeWeight(name, weight));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerProvider {
    /// Rule-based scoring from the enriched transaction. Needs no external service.
    #[default]
    Heuristic,
    /// Each analyzer asks the `claude` CLI for a JSON assessment.
    Claude,
}

/// Configuration for the analyzer collaborators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalyzersConfig {
    pub provider: AnalyzerProvider,
    /// Default model for Claude-backed analyzers.
    pub model: String,
    /// Retries inside one analyzer after a failed attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries.
    pub retry_backoff_ms: u64,
    pub analyzers: Vec<AnalyzerConfig>,
}

impl Default for AnalyzersConfig {
    fn default() -> Self {
        Self {
            provider: AnalyzerProvider::default(),
            model: "claude-3-5-haiku-latest".to_string(),
            max_retries: 2,
            retry_backoff_ms: 500,
            analyzers: AnalyzerName::ALL
                .into_iter()
                .map(|name| AnalyzerConfig {
                    name,
                    enabled: true,
                    model: None,
                })
                .collect(),
        }
    }
}

impl AnalyzersConfig {
    /// An analyzer with no entry is enabled.
    pub fn is_enabled(&self, name: AnalyzerName) -> bool {
        self.analyzers
            .iter()
            .find(|a| a.name == name)
            .map_or(true, |a| a.enabled)
    }

    pub fn model_for(&self, name: AnalyzerName) -> &str {
        self.analyzers
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.model.as_deref())
            .unwrap_or(&self.model)
    }
}

/// Configuration for a single analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyzerConfig {
    pub name: AnalyzerName,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Override model for this analyzer. Falls back to `AnalyzersConfig::model`.
    pub model: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn roundtrip_fraudgate_config() {
        let config = FraudGateConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: FraudGateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn default_config_is_valid() {
        let config = FraudGateConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analyzers.analyzers.len(), 5);
        assert!(AnalyzerName::ALL
            .iter()
            .all(|name| config.analyzers.is_enabled(*name)));
    }

    #[test]
    fn default_weights_sum_to_one() {
        let weights = WeightTable::default();
        let total: Decimal = AnalyzerName::ALL.iter().map(|n| weights.weight(*n)).sum();
        assert_eq!(total, dec!(1.00));
    }

    #[test]
    fn thresholds_classify_boundaries() {
        let t = RiskThresholds::default();
        assert_eq!(t.classify(dec!(0)), Decision::Approve);
        assert_eq!(t.classify(dec!(39.99)), Decision::Approve);
        assert_eq!(t.classify(dec!(40)), Decision::Review);
        assert_eq!(t.classify(dec!(69.99)), Decision::Review);
        assert_eq!(t.classify(dec!(70)), Decision::Decline);
        assert_eq!(t.classify(dec!(100)), Decision::Decline);
    }

    #[test]
    fn thresholds_reject_inverted_order() {
        assert!(RiskThresholds::new(dec!(40), dec!(70)).is_err());
        assert!(RiskThresholds::new(dec!(50), dec!(50)).is_err());
        assert!(RiskThresholds::new(dec!(50), dec!(-1)).is_err());
        assert!(RiskThresholds::new(dec!(50), dec!(0)).is_ok());
    }

    #[test]
    fn negative_weight_rejected() {
        let mut config = EngineConfig::default();
        config.weights.velocity = dec!(-0.5);
        assert_eq!(
            config.validate(),
            Err(ConfigError::NegativeWeight(AnalyzerName::Velocity, dec!(-0.5)))
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let config = EngineConfig {
            analyzer_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("analyzer_timeout_ms"))
        );
    }

    #[test]
    fn penalty_out_of_range_rejected() {
        for penalty in [dec!(-1), dec!(100.5), Decimal::MAX] {
            let config = EngineConfig {
                coverage_penalty_per_failure: Some(penalty),
                ..Default::default()
            };
            assert_eq!(config.validate(), Err(ConfigError::Penalty(penalty)));
        }
        let config = EngineConfig {
            coverage_penalty_per_failure: Some(dec!(100)),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_toml() {
        let toml_str = r#"
[engine]
analyzer_timeout_ms = 2000
global_deadline_ms = 5000
min_required_analyzers = 2
coverage_penalty_per_failure = 5

[engine.thresholds]
decline_at = 80
review_at = 50

[engine.weights]
pattern = 0.4
velocity = 0.3

[analyzers]
provider = "claude"
model = "claude-3-5-haiku-latest"

[[analyzers.analyzers]]
name = "pattern"
enabled = true
model = "claude-sonnet-4-5-20250929"

[[analyzers.analyzers]]
name = "geographic"
enabled = false
"#;

        let config: FraudGateConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.analyzer_timeout_ms, 2000);
        assert_eq!(config.engine.min_required_analyzers, 2);
        assert_eq!(config.engine.coverage_penalty_per_failure, Some(dec!(5)));
        assert_eq!(config.engine.thresholds.decline_at, dec!(80));
        assert_eq!(config.engine.weights.pattern, dec!(0.4));
        // Unlisted weights keep their defaults.
        assert_eq!(config.engine.weights.behavioral, dec!(0.20));
        assert_eq!(config.analyzers.provider, AnalyzerProvider::Claude);
        assert!(!config.analyzers.is_enabled(AnalyzerName::Geographic));
        // Analyzers without an entry stay enabled.
        assert!(config.analyzers.is_enabled(AnalyzerName::Velocity));
        assert_eq!(
            config.analyzers.model_for(AnalyzerName::Pattern),
            "claude-sonnet-4-5-20250929"
        );
        assert_eq!(
            config.analyzers.model_for(AnalyzerName::Merchant),
            "claude-3-5-haiku-latest"
        );
        assert!(config.validate().is_ok());
    }
}
