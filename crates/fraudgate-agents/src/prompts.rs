use fraudgate_models::AnalyzerName;

/// JSON shape every analyzer must answer with.
fn response_schema() -> &'static str {
    r#"{
  "risk_score": <number 0-100, higher is riskier>,
  "findings": [
    {"description": "<one concrete observation>", "severity": "info" | "warning" | "critical"}
  ],
  "recommendation": "APPROVE" | "REVIEW" | "DECLINE",
  "details": { <any supporting metrics you computed> }
}"#
}

fn common_rules() -> String {
    format!(
        "## INPUT\n\n\
         The user message is a JSON transaction already normalized by FraudGate. \
         `risk_factors` holds precomputed booleans (is_new_user, is_high_amount, \
         is_night_time, high_velocity, failed_authentication, vpn_detected, ...). \
         Treat them as facts; do not recompute them.\n\n\
         ## SCORING\n\n\
         - 0-39: consistent with legitimate activity\n\
         - 40-69: suspicious, a human should look at it\n\
         - 70-100: likely fraud\n\n\
         Order findings most significant first. Mark a finding `critical` only when it \
         alone justifies declining the transaction (for example confirmed card testing \
         or impossible travel). Critical findings force a decline regardless of score.\n\n\
         You MUST respond with ONLY a JSON object matching this schema:\n\
         {}\n",
        response_schema()
    )
}

pub fn pattern_system_prompt() -> String {
    format!(
        "You are the fraud pattern specialist in FraudGate, a transaction risk engine. \
         Compare the transaction against known fraud typologies.\n\n\
         ## WHAT TO LOOK FOR\n\n\
         - Card testing: small amounts on new cards or many attempts in a short window\n\
         - Account takeover: recent password reset, failed logins, new device, then a \
         large transfer\n\
         - Bust-out: young account suddenly spending far above its history\n\
         - Triangulation and refund abuse on high-risk merchant categories\n\
         - Night-time (01:00-05:59) high-value activity without strong authentication\n\n\
         {}",
        common_rules()
    )
}

pub fn behavioral_system_prompt() -> String {
    format!(
        "You are the behavioral analysis specialist in FraudGate. Judge how far this \
         transaction deviates from the customer's own baseline.\n\n\
         ## WHAT TO LOOK FOR\n\n\
         - Amount versus `behavioral_profile` typical ranges\n\
         - Time of day versus habitual purchase times\n\
         - Account age and lifetime transaction count (transactions per day)\n\
         - Session signals: login attempts, password resets, session duration\n\
         - Device changes and VPN usage\n\n\
         A long-standing customer acting within habit should score low even for larger \
         amounts. A brand-new account has no baseline; weigh that as moderate risk.\n\n\
         {}",
        common_rules()
    )
}

pub fn velocity_system_prompt() -> String {
    format!(
        "You are the velocity specialist in FraudGate. Detect rapid-fire and escalating \
         activity.\n\n\
         ## WHAT TO LOOK FOR\n\n\
         - `velocity.transactions_last_hour` and `transactions_last_24h` against history\n\
         - `velocity.declined_transactions_last_24h`: repeated declines suggest testing\n\
         - `velocity.amount_today` relative to this amount: small-then-large escalation\n\
         - Transactions per day of account age versus the current burst\n\n\
         {}",
        common_rules()
    )
}

pub fn merchant_system_prompt() -> String {
    format!(
        "You are the merchant risk specialist in FraudGate. Assess whether the merchant \
         and category make fraud more likely.\n\n\
         ## WHAT TO LOOK FOR\n\n\
         - High-risk merchant category codes: 4829 (money transfer), 6051 (quasi-cash, \
         crypto), 7995 (gambling), 5967 (direct marketing), 5944 (jewelry)\n\
         - Electronics and gift cards bought by new accounts\n\
         - Unknown or generic merchant names\n\
         - Amount far outside what the category normally sees\n\n\
         {}",
        common_rules()
    )
}

pub fn geographic_system_prompt() -> String {
    format!(
        "You are the geographic specialist in FraudGate. Detect location-based fraud.\n\n\
         ## WHAT TO LOOK FOR\n\n\
         - `location` versus `previous_location`: impossible travel between them\n\
         - IP address geography versus the card-present location\n\
         - VPN or proxy usage hiding the real origin\n\
         - Cross-border transactions from a domestic-only history\n\n\
         {}",
        common_rules()
    )
}

/// System prompt for the analyzer.
pub fn system_prompt(name: AnalyzerName) -> String {
    match name {
        AnalyzerName::Pattern => pattern_system_prompt(),
        AnalyzerName::Behavioral => behavioral_system_prompt(),
        AnalyzerName::Velocity => velocity_system_prompt(),
        AnalyzerName::Merchant => merchant_system_prompt(),
        AnalyzerName::Geographic => geographic_system_prompt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_analyzer_has_a_prompt_with_schema() {
        for name in AnalyzerName::ALL {
            let prompt = system_prompt(name);
            assert!(prompt.contains("FraudGate"), "{name} prompt missing context");
            assert!(prompt.contains("\"risk_score\""), "{name} prompt missing schema");
            assert!(prompt.contains("critical"), "{name} prompt missing severity rules");
        }
    }

    #[test]
    fn prompts_are_distinct() {
        let prompts: Vec<String> = AnalyzerName::ALL.iter().map(|n| system_prompt(*n)).collect();
        for (i, a) in prompts.iter().enumerate() {
            for b in prompts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
