use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("transaction must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("transaction string is not a JSON object: {0}")]
    Unparseable(String),
}

/// Raw transaction input: an open-ended mapping of named fields.
///
/// No fixed schema; any field may be absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct Transaction(serde_json::Map<String, serde_json::Value>);

impl Transaction {
    /// Interpret arbitrary JSON as a transaction.
    ///
    /// Objects are taken as-is. Strings are parsed as JSON and must hold an object.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, ValidationError> {
        match value {
            serde_json::Value::Object(map) => Ok(Self(map.clone())),
            serde_json::Value::String(s) => {
                match serde_json::from_str::<serde_json::Value>(s) {
                    Ok(serde_json::Value::Object(map)) => Ok(Self(map)),
                    Ok(other) => Err(ValidationError::NotAnObject(json_kind(&other))),
                    Err(e) => Err(ValidationError::Unparseable(e.to_string())),
                }
            }
            other => Err(ValidationError::NotAnObject(json_kind(other))),
        }
    }

    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Transaction {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Recent activity counters supplied with the transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VelocityCounters {
    pub transactions_last_hour: u64,
    pub transactions_today: u64,
    pub transactions_last_24h: u64,
    pub declined_transactions_last_24h: u64,
    pub amount_today: Decimal,
}

/// Boolean risk indicators derived during normalization.
///
/// These describe the transaction; analyzers decide what they mean.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RiskFactors {
    pub is_new_user: bool,
    pub is_very_new_user: bool,
    pub is_high_amount: bool,
    pub is_very_high_amount: bool,
    pub is_night_time: bool,
    pub has_location_change: bool,
    pub high_velocity: bool,
    pub many_declines: bool,
    pub failed_authentication: bool,
    pub no_3ds: bool,
    pub vpn_detected: bool,
    pub password_reset_recent: bool,
    pub multiple_login_attempts: bool,
}

impl RiskFactors {
    /// Names of every factor that is set, in declaration order.
    pub fn active(&self) -> Vec<&'static str> {
        let flags = [
            (self.is_new_user, "is_new_user"),
            (self.is_very_new_user, "is_very_new_user"),
            (self.is_high_amount, "is_high_amount"),
            (self.is_very_high_amount, "is_very_high_amount"),
            (self.is_night_time, "is_night_time"),
            (self.has_location_change, "has_location_change"),
            (self.high_velocity, "high_velocity"),
            (self.many_declines, "many_declines"),
            (self.failed_authentication, "failed_authentication"),
            (self.no_3ds, "no_3ds"),
            (self.vpn_detected, "vpn_detected"),
            (self.password_reset_recent, "password_reset_recent"),
            (self.multiple_login_attempts, "multiple_login_attempts"),
        ];
        flags
            .into_iter()
            .filter_map(|(set, name)| set.then_some(name))
            .collect()
    }
}

/// A transaction normalized into one shape, plus derived risk factors.
///
/// Every field has a value; missing input fields are replaced by defaults.
/// Shared read-only between concurrently running analyzers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedTransaction {
    pub transaction_id: String,
    pub user_id: String,
    pub user_age_days: u64,
    pub total_transactions: u64,
    pub amount: Decimal,
    pub currency: String,
    pub time_of_day: NaiveTime,
    pub transaction_type: String,
    pub merchant: String,
    pub merchant_category_code: String,
    pub merchant_category: String,
    pub location: String,
    pub previous_location: String,
    pub ip_address: Option<String>,
    pub card_brand: Option<String>,
    pub card_type: Option<String>,
    pub device: serde_json::Value,
    pub authentication: serde_json::Value,
    pub session: serde_json::Value,
    pub behavioral_profile: serde_json::Value,
    pub velocity: VelocityCounters,
    pub risk_factors: RiskFactors,
    /// The input exactly as received, after unwrapping legacy envelopes.
    pub raw: Transaction,
}

impl EnrichedTransaction {
    pub const UNKNOWN_MERCHANT: &'static str = "Unknown Merchant";
    pub const UNKNOWN_MCC: &'static str = "0000";
    pub const UNKNOWN_LOCATION: &'static str = "Unknown";

    pub fn has_merchant_data(&self) -> bool {
        self.merchant != Self::UNKNOWN_MERCHANT || self.merchant_category_code != Self::UNKNOWN_MCC
    }

    pub fn has_location_data(&self) -> bool {
        self.location != Self::UNKNOWN_LOCATION || self.ip_address.is_some()
    }

    /// Lifetime transactions per day of account age.
    pub fn transactions_per_day(&self) -> Decimal {
        let days = Decimal::from(self.user_age_days.max(1));
        Decimal::from(self.total_transactions) / days
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_is_accepted() {
        let tx = Transaction::from_value(&serde_json::json!({"amount": 12.5})).unwrap();
        assert_eq!(tx.get("amount"), Some(&serde_json::json!(12.5)));
    }

    #[test]
    fn empty_object_is_accepted() {
        let tx = Transaction::from_value(&serde_json::json!({})).unwrap();
        assert!(tx.is_empty());
    }

    #[test]
    fn json_string_holding_object_is_accepted() {
        let tx = Transaction::from_value(&serde_json::json!(r#"{"user_id": "u1"}"#)).unwrap();
        assert_eq!(tx.get("user_id"), Some(&serde_json::json!("u1")));
    }

    #[test]
    fn non_mappings_are_rejected() {
        assert_eq!(
            Transaction::from_value(&serde_json::json!([1, 2])),
            Err(ValidationError::NotAnObject("array"))
        );
        assert_eq!(
            Transaction::from_value(&serde_json::Value::Null),
            Err(ValidationError::NotAnObject("null"))
        );
        assert_eq!(
            Transaction::from_value(&serde_json::json!("[1]")),
            Err(ValidationError::NotAnObject("array"))
        );
        assert!(matches!(
            Transaction::from_value(&serde_json::json!("not json")),
            Err(ValidationError::Unparseable(_))
        ));
    }

    #[test]
    fn active_risk_factors() {
        let factors = RiskFactors {
            is_night_time: true,
            vpn_detected: true,
            ..Default::default()
        };
        assert_eq!(factors.active(), vec!["is_night_time", "vpn_detected"]);
    }
}
