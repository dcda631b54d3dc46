//! Combines per-analyzer outcomes into one decision.
//!
//! Aggregation is a pure function of the result snapshot and the selected
//! analyzers: the same inputs always give the same decision.

use std::collections::BTreeMap;

use fraudgate_models::{
    clamp_score, AnalyzerAssessment, AnalyzerName, Decision, EngineConfig, FinalDecision,
    RiskThresholds, WeightTable, MAX_RISK_SCORE,
};
use rust_decimal::Decimal;

use crate::result_store::ResultSnapshot;

/// Decimal places kept in the aggregated score and coverage.
const SCORE_DP: u32 = 4;

/// Number of analyzers named in the reasoning text.
const TOP_CONTRIBUTORS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    pub weights: WeightTable,
    pub thresholds: RiskThresholds,
    /// Minimum successful analyzers before the weighted score is trusted.
    pub min_required: usize,
    /// Points added per failed analyzer. `None` disables the penalty.
    pub coverage_penalty: Option<Decimal>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl Aggregator {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            weights: config.weights.clone(),
            thresholds: config.thresholds,
            min_required: config.min_required_analyzers,
            coverage_penalty: config.coverage_penalty_per_failure,
        }
    }

    pub fn aggregate(&self, results: &ResultSnapshot, selected: &[AnalyzerName]) -> FinalDecision {
        let succeeded: Vec<(AnalyzerName, &AnalyzerAssessment)> = selected
            .iter()
            .filter_map(|name| {
                results
                    .get(name)
                    .and_then(|r| r.outcome.assessment())
                    .map(|a| (*name, a))
            })
            .collect();
        let failed: Vec<AnalyzerName> = selected
            .iter()
            .copied()
            .filter(|name| !succeeded.iter().any(|(n, _)| n == name))
            .collect();

        let coverage = coverage(succeeded.len(), selected.len());
        let per_analyzer_scores: BTreeMap<AnalyzerName, Decimal> = succeeded
            .iter()
            .map(|(name, a)| (*name, a.risk_score))
            .collect();
        let critical_findings: Vec<String> = succeeded
            .iter()
            .flat_map(|(name, a)| {
                a.critical_findings()
                    .map(move |f| format!("{name}: {}", f.description))
            })
            .collect();

        if succeeded.is_empty() || succeeded.len() < self.min_required {
            return FinalDecision {
                decision: Decision::Decline,
                aggregated_score: MAX_RISK_SCORE,
                coverage,
                per_analyzer_scores,
                reasoning: format!(
                    "insufficient analyzer coverage: {} of {} selected analyzers succeeded, \
                     at least {} required; failed: {}",
                    succeeded.len(),
                    selected.len(),
                    self.min_required.max(1),
                    list_names(&failed),
                ),
                critical_findings,
            };
        }

        let mut score = self.weighted_score(&succeeded);
        if let Some(penalty) = self.coverage_penalty {
            let added = clamp_score(penalty) * Decimal::from(failed.len());
            score = clamp_score(score + added).normalize();
        }

        let decision = if critical_findings.is_empty() {
            self.thresholds.classify(score)
        } else {
            Decision::Decline
        };

        FinalDecision {
            decision,
            aggregated_score: score,
            coverage,
            per_analyzer_scores,
            reasoning: self.reasoning(decision, score, &succeeded, &failed, &critical_findings),
            critical_findings,
        }
    }

    /// Weighted mean over succeeded analyzers, weights renormalized to their sum.
    ///
    /// Weights are first divided by the largest one and scores clamped, so
    /// every intermediate value stays small whatever the weight table holds.
    /// All-zero weights give the plain mean.
    fn weighted_score(&self, succeeded: &[(AnalyzerName, &AnalyzerAssessment)]) -> Decimal {
        let weight = |name: AnalyzerName| self.weights.weight(name).max(Decimal::ZERO);
        let max_weight = succeeded
            .iter()
            .map(|(name, _)| weight(*name))
            .max()
            .unwrap_or(Decimal::ZERO);

        let terms: Vec<(Decimal, Decimal)> = succeeded
            .iter()
            .map(|(name, a)| {
                let scaled = if max_weight > Decimal::ZERO {
                    weight(*name) / max_weight
                } else {
                    Decimal::ONE
                };
                (scaled, clamp_score(a.risk_score))
            })
            .collect();

        // At least one scaled weight is exactly one.
        let total_weight: Decimal = terms.iter().map(|(w, _)| *w).sum();
        let weighted: Decimal = terms.iter().map(|(w, score)| w * score).sum();

        clamp_score((weighted / total_weight).round_dp(SCORE_DP)).normalize()
    }

    fn reasoning(
        &self,
        decision: Decision,
        score: Decimal,
        succeeded: &[(AnalyzerName, &AnalyzerAssessment)],
        failed: &[AnalyzerName],
        critical_findings: &[String],
    ) -> String {
        let mut ranked: Vec<&(AnalyzerName, &AnalyzerAssessment)> = succeeded.iter().collect();
        // Stable: equal scores keep analyzer order.
        ranked.sort_by(|a, b| b.1.risk_score.cmp(&a.1.risk_score));

        let contributors: Vec<String> = ranked
            .iter()
            .take(TOP_CONTRIBUTORS)
            .map(|(name, a)| {
                let findings: Vec<&str> =
                    a.findings.iter().map(|f| f.description.as_str()).collect();
                if findings.is_empty() {
                    format!("{name} ({})", a.risk_score)
                } else {
                    format!("{name} ({}): {}", a.risk_score, findings.join("; "))
                }
            })
            .collect();

        let mut text = format!(
            "{decision} with aggregated risk score {score} from {} analyzers.",
            succeeded.len()
        );
        if !critical_findings.is_empty() {
            text.push_str(&format!(
                " Critical findings force DECLINE: {}.",
                critical_findings.join("; ")
            ));
        }
        text.push_str(&format!(" Top contributors: {}.", contributors.join(" | ")));
        if !failed.is_empty() {
            text.push_str(&format!(" Unavailable: {}.", list_names(failed)));
        }
        text
    }
}

fn coverage(succeeded: usize, selected: usize) -> Decimal {
    if selected == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(succeeded) / Decimal::from(selected))
        .round_dp(SCORE_DP)
        .normalize()
}

fn list_names(names: &[AnalyzerName]) -> String {
    if names.is_empty() {
        return "none".to_string();
    }
    names
        .iter()
        .map(AnalyzerName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
