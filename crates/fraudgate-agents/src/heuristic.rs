//! Rule-based analyzers that need no external service.
//!
//! Each analyzer name has its own rule set over the enriched transaction.
//! Rules add points to a base score; the total is clamped to 0-100 and the
//! recommendation follows the default thresholds.

use async_trait::async_trait;
use fraudgate_models::{
    clamp_score, AnalyzerAssessment, AnalyzerName, EnrichedTransaction, Finding, RiskThresholds,
};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};

use crate::analyzer::Analyzer;
use crate::error::AnalyzerError;

const BASE_SCORE: i64 = 5;

/// Merchant category codes with elevated fraud rates: money transfer,
/// quasi-cash, gambling, direct marketing, jewelry and P2P services.
const HIGH_RISK_MCCS: &[&str] = &["4829", "6051", "6536", "6538", "7995", "5967", "5944"];

/// Electronics and gift-card categories favoured for resale.
const RESALE_MCCS: &[&str] = &["5732", "5734", "5045", "5947"];

/// Deterministic analyzer scoring one dimension of risk.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicAnalyzer {
    name: AnalyzerName,
}

impl HeuristicAnalyzer {
    pub fn new(name: AnalyzerName) -> Self {
        Self { name }
    }

    /// Score `transaction` synchronously.
    pub fn assess(&self, transaction: &EnrichedTransaction) -> AnalyzerAssessment {
        let mut card = Scorecard::default();
        match self.name {
            AnalyzerName::Pattern => pattern_rules(transaction, &mut card),
            AnalyzerName::Behavioral => behavioral_rules(transaction, &mut card),
            AnalyzerName::Velocity => velocity_rules(transaction, &mut card),
            AnalyzerName::Merchant => merchant_rules(transaction, &mut card),
            AnalyzerName::Geographic => geographic_rules(transaction, &mut card),
        }
        card.finish(self.name)
    }
}

#[async_trait]
impl Analyzer for HeuristicAnalyzer {
    fn name(&self) -> AnalyzerName {
        self.name
    }

    async fn analyze(
        &self,
        transaction: &EnrichedTransaction,
    ) -> Result<AnalyzerAssessment, AnalyzerError> {
        Ok(self.assess(transaction))
    }
}

#[derive(Default)]
struct Scorecard {
    points: i64,
    findings: Vec<Finding>,
    rules: Map<String, Value>,
}

impl Scorecard {
    fn add(&mut self, rule: &str, points: i64, description: String) {
        self.points += points;
        self.rules.insert(rule.to_string(), json!(points));
        self.findings.push(Finding::warning(description));
    }

    fn critical(&mut self, description: String) {
        self.findings.push(Finding::critical(description));
    }

    fn finish(mut self, name: AnalyzerName) -> AnalyzerAssessment {
        let risk_score = clamp_score(Decimal::from(BASE_SCORE + self.points));
        if self.findings.is_empty() {
            self.findings
                .push(Finding::info(format!("No {name} risk indicators found")));
        }
        // Stable sort: critical findings lead, rule order is kept otherwise.
        self.findings.sort_by_key(|f| std::cmp::Reverse(f.severity));

        AnalyzerAssessment {
            risk_score,
            findings: self.findings,
            recommendation: RiskThresholds::default().classify(risk_score),
            raw_detail: json!({
                "provider": "heuristic",
                "analyzer": name,
                "base_score": BASE_SCORE,
                "rules": self.rules,
            }),
        }
    }
}

fn profile_decimal(tx: &EnrichedTransaction, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|key| {
        let text = match tx.behavioral_profile.get(*key)? {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return None,
        };
        text.parse()
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    })
}

/// `value > base * factor`. A product beyond `Decimal` range is never exceeded.
fn exceeds_multiple(value: Decimal, base: Decimal, factor: Decimal) -> bool {
    base.checked_mul(factor).is_some_and(|limit| value > limit)
}

fn raw_str<'a>(tx: &'a EnrichedTransaction, outer: &str, key: &str) -> Option<&'a str> {
    tx.raw.get(outer)?.get(key)?.as_str()
}

fn raw_number(tx: &EnrichedTransaction, outer: &str, key: &str) -> Option<f64> {
    tx.raw.get(outer)?.get(key)?.as_f64()
}

fn pattern_rules(tx: &EnrichedTransaction, card: &mut Scorecard) {
    let rf = &tx.risk_factors;

    if rf.failed_authentication {
        card.add(
            "failed_authentication",
            30,
            "Authentication failed or was bypassed".into(),
        );
    }
    if rf.password_reset_recent && rf.multiple_login_attempts {
        card.add(
            "account_takeover_signals",
            25,
            "Recent password reset combined with repeated login attempts".into(),
        );
    } else if rf.multiple_login_attempts {
        card.add(
            "multiple_login_attempts",
            10,
            "Multiple login attempts before transaction".into(),
        );
    }
    if rf.is_night_time && rf.is_high_amount {
        card.add(
            "night_high_value",
            20,
            format!(
                "High-value transaction of {} {} at {}",
                tx.amount,
                tx.currency,
                tx.time_of_day.format("%H:%M")
            ),
        );
    }
    if rf.is_very_high_amount {
        card.add(
            "very_high_amount",
            15,
            format!("Very high amount: {} {}", tx.amount, tx.currency),
        );
    } else if rf.is_high_amount {
        card.add(
            "high_amount",
            10,
            format!("High amount: {} {}", tx.amount, tx.currency),
        );
    }
    if rf.no_3ds {
        card.add("no_3ds", 10, "No 3-D Secure authentication".into());
    }
    if rf.is_very_new_user && rf.is_high_amount {
        card.add(
            "bust_out",
            20,
            format!(
                "Account only {} days old spending {}",
                tx.user_age_days, tx.amount
            ),
        );
    }
    if tx.amount < Decimal::from(5) && tx.velocity.declined_transactions_last_24h > 0 {
        card.add(
            "card_testing",
            25,
            "Small-value attempt after recent declines".into(),
        );
    }

    let takeover_context = rf.vpn_detected || rf.multiple_login_attempts;
    if rf.failed_authentication && rf.is_high_amount && takeover_context {
        card.critical(format!(
            "Account takeover pattern: failed authentication on {} {} transaction",
            tx.amount, tx.currency
        ));
    }
}

fn behavioral_rules(tx: &EnrichedTransaction, card: &mut Scorecard) {
    let rf = &tx.risk_factors;
    let age = format!("Account is {} days old", tx.user_age_days);

    if rf.is_very_new_user {
        card.add("very_new_user", 25, age);
    } else if rf.is_new_user {
        card.add("new_user", 15, age);
    }

    let typical = profile_decimal(
        tx,
        &[
            "typical_transaction_amount",
            "typical_transfer_amount",
            "average_transaction_amount",
        ],
    );
    if let Some(typical) = typical.filter(|t| *t > Decimal::ZERO) {
        if exceeds_multiple(tx.amount, typical, Decimal::TEN) {
            card.add(
                "amount_far_above_typical",
                30,
                format!(
                    "Amount {} is more than 10x the typical {}",
                    tx.amount, typical
                ),
            );
        } else if exceeds_multiple(tx.amount, typical, Decimal::from(3)) {
            card.add(
                "amount_above_typical",
                15,
                format!(
                    "Amount {} is more than 3x the typical {}",
                    tx.amount, typical
                ),
            );
        }
    }

    if rf.is_night_time {
        let never_at_night = tx
            .behavioral_profile
            .get("night_activity_frequency")
            .and_then(Value::as_str)
            .is_some_and(|f| f.eq_ignore_ascii_case("NEVER"));
        if never_at_night {
            card.add(
                "night_out_of_habit",
                20,
                "Night-time activity from a customer who never transacts at night".into(),
            );
        } else {
            card.add("night_time", 10, "Transaction during night hours".into());
        }
    }
    if rf.multiple_login_attempts {
        card.add(
            "multiple_login_attempts",
            15,
            "Several login attempts in this session".into(),
        );
    }
    if rf.password_reset_recent {
        card.add(
            "password_reset_recent",
            15,
            "Password was reset recently".into(),
        );
    }
    if rf.vpn_detected {
        card.add("vpn", 10, "Session routed through a VPN".into());
    }
    if tx.total_transactions < 3 {
        card.add(
            "thin_history",
            10,
            format!("Only {} lifetime transactions", tx.total_transactions),
        );
    }
}

fn velocity_rules(tx: &EnrichedTransaction, card: &mut Scorecard) {
    let v = &tx.velocity;
    let last_hour = format!("{} transactions in the last hour", v.transactions_last_hour);
    let declines = format!("{} declines in 24 hours", v.declined_transactions_last_24h);

    if v.transactions_last_hour > 10 {
        card.add("burst_last_hour", 45, last_hour);
    } else if tx.risk_factors.high_velocity {
        card.add("high_velocity", 30, last_hour);
    }
    if v.declined_transactions_last_24h > 10 {
        card.add("many_declines", 35, declines);
        card.critical(format!(
            "Card testing: {} declined attempts in 24 hours",
            v.declined_transactions_last_24h
        ));
    } else if tx.risk_factors.many_declines {
        card.add("many_declines", 25, declines);
    }
    if v.transactions_last_24h > 20 {
        card.add(
            "daily_volume",
            15,
            format!("{} transactions in 24 hours", v.transactions_last_24h),
        );
    }
    let spent_today = v.amount_today.saturating_add(tx.amount);
    if spent_today > Decimal::from(5000) {
        card.add(
            "daily_amount",
            15,
            format!(
                "{spent_today} {} spent today including this transaction",
                tx.currency
            ),
        );
    }

    let daily_rate = tx.transactions_per_day();
    if v.transactions_today >= 5
        && exceeds_multiple(Decimal::from(v.transactions_today), daily_rate, Decimal::TEN)
    {
        card.add(
            "above_daily_rate",
            10,
            format!(
                "{} transactions today against a typical {:.2} per day",
                v.transactions_today, daily_rate
            ),
        );
    }
}

fn merchant_rules(tx: &EnrichedTransaction, card: &mut Scorecard) {
    let mcc = tx.merchant_category_code.as_str();
    let high_risk = HIGH_RISK_MCCS.contains(&mcc);

    if high_risk {
        card.add(
            "high_risk_mcc",
            30,
            format!(
                "High-risk merchant category {mcc} ({})",
                tx.merchant_category
            ),
        );
    }
    if RESALE_MCCS.contains(&mcc) && tx.risk_factors.is_new_user {
        card.add(
            "resale_goods_new_user",
            15,
            format!("New account buying resale goods (MCC {mcc})"),
        );
    }
    if tx.merchant == EnrichedTransaction::UNKNOWN_MERCHANT {
        card.add("unknown_merchant", 10, "Merchant name missing".into());
    }
    if high_risk && tx.risk_factors.is_very_high_amount {
        card.add(
            "high_value_high_risk",
            15,
            format!("{} {} at a high-risk merchant", tx.amount, tx.currency),
        );
    }
    let card_not_present = tx
        .raw
        .get("card")
        .and_then(|c| c.get("card_present"))
        .and_then(Value::as_bool)
        == Some(false);
    if high_risk && card_not_present {
        card.add(
            "card_not_present",
            10,
            "Card-not-present at a high-risk merchant".into(),
        );
    }
}

fn geographic_rules(tx: &EnrichedTransaction, card: &mut Scorecard) {
    let rf = &tx.risk_factors;

    if rf.has_location_change {
        card.add(
            "location_change",
            20,
            format!(
                "Location changed from {} to {}",
                tx.previous_location, tx.location
            ),
        );
        if rf.is_night_time {
            card.add(
                "night_location_change",
                10,
                "Location change during night hours".into(),
            );
        }
    }
    if rf.vpn_detected {
        card.add("vpn", 20, "Origin hidden behind a VPN or proxy".into());
    }

    let distance = raw_number(tx, "location", "distance_from_home_km");
    match distance {
        Some(km) if km > 5000.0 => {
            card.add("distance_from_home", 30, format!("{km:.0} km from home"));
            if rf.vpn_detected {
                card.critical(format!(
                    "Impossible travel: {km:.0} km from home through a VPN"
                ));
            }
        }
        Some(km) if km > 1000.0 => {
            card.add("distance_from_home", 15, format!("{km:.0} km from home"));
        }
        _ => {}
    }

    if let (Some(ip_country), Some((_, country))) = (
        raw_str(tx, "location", "ip_country"),
        tx.location.rsplit_once(", "),
    ) {
        if !ip_country.eq_ignore_ascii_case(country) {
            card.add(
                "ip_country_mismatch",
                15,
                format!(
                    "IP country {ip_country} differs from transaction country {country}"
                ),
            );
        }
    }
}
