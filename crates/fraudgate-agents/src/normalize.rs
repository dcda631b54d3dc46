//! Normalization of free-form transaction input into `EnrichedTransaction`.
//!
//! Callers send flat records, nested records (`transaction`, `financial`,
//! `merchant`, `customer`, ...) or a legacy `{"input_data": ...}` envelope.
//! Every field is looked up along a list of paths; the first non-null value
//! wins, otherwise a fixed default applies.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike};
use fraudgate_models::{EnrichedTransaction, RiskFactors, Transaction, VelocityCounters};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Turns a validated transaction into the typed view analyzers consume.
pub trait TransactionNormalizer: Send + Sync {
    fn normalize(&self, transaction: &Transaction) -> EnrichedTransaction;
}

/// Default normalizer covering the flat, nested and legacy input shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNormalizer;

const DEFAULT_USER_AGE_DAYS: u64 = 180;
const DEFAULT_TOTAL_TRANSACTIONS: u64 = 10;
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_TRANSACTION_TYPE: &str = "PURCHASE";
const UNKNOWN_CATEGORY: &str = "Unknown";

fn default_amount() -> Decimal {
    Decimal::ONE_HUNDRED
}

fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(14, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Generate an id in the `TXN-XXXXXXXXXXXX` form.
pub fn generate_transaction_id() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("TXN-{}", &hex[..12])
}

impl TransactionNormalizer for StandardNormalizer {
    fn normalize(&self, transaction: &Transaction) -> EnrichedTransaction {
        let raw = unwrap_legacy(transaction);
        let f = raw.fields();

        let transaction_id = first_string(
            f,
            &[&["transaction_id"], &["transaction", "transaction_id"]],
        )
        .unwrap_or_else(generate_transaction_id);

        let user_id = first_string(
            f,
            &[&["user_id"], &["customer", "customer_id"], &["customer_id"]],
        )
        .unwrap_or_else(|| {
            let hex = Uuid::new_v4().simple().to_string();
            format!("user_{}", &hex[..8])
        });

        let user_age_days = first_u64(
            f,
            &[
                &["user_age_days"],
                &["customer", "age_of_account_days"],
                &["age_of_account_days"],
            ],
        )
        .unwrap_or(DEFAULT_USER_AGE_DAYS);

        let total_transactions = first_u64(
            f,
            &[
                &["total_transactions"],
                &["historical_stats", "total_lifetime_transactions"],
            ],
        )
        .unwrap_or(DEFAULT_TOTAL_TRANSACTIONS);

        let amount = first_decimal(f, &[&["amount"], &["financial", "amount"]])
            .unwrap_or_else(default_amount);

        let currency = first_string(f, &[&["currency"], &["financial", "currency"]])
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        let time_of_day = lookup(f, &["time"])
            .and_then(Value::as_str)
            .and_then(parse_time)
            .or_else(|| {
                lookup(f, &["transaction", "transaction_datetime"])
                    .and_then(Value::as_str)
                    .and_then(parse_time)
            })
            .unwrap_or_else(default_time);

        let transaction_type = first_string(
            f,
            &[&["transaction_type"], &["transaction", "transaction_type"]],
        )
        .unwrap_or_else(|| DEFAULT_TRANSACTION_TYPE.to_string());

        let merchant = first_string(
            f,
            &[
                &["merchant"],
                &["merchant_name"],
                &["merchant", "merchant_name"],
                &["merchant_data", "merchant_name"],
            ],
        )
        .unwrap_or_else(|| EnrichedTransaction::UNKNOWN_MERCHANT.to_string());

        let merchant_category_code = first_string(
            f,
            &[
                &["merchant_category_code"],
                &["merchant", "merchant_category_code"],
                &["merchant_data", "merchant_category_code"],
            ],
        )
        .unwrap_or_else(|| EnrichedTransaction::UNKNOWN_MCC.to_string());

        let merchant_category = first_string(
            f,
            &[
                &["merchant_category"],
                &["merchant", "merchant_category"],
                &["merchant_data", "merchant_category"],
            ],
        )
        .unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());

        let location = location_of(f)
            .unwrap_or_else(|| EnrichedTransaction::UNKNOWN_LOCATION.to_string());

        let previous_location = first_string(
            f,
            &[
                &["previous_location"],
                &["behavioral_profile", "home_location", "city"],
                &["behavioral_profile", "home_city"],
            ],
        )
        .unwrap_or_else(|| location.clone());

        let ip_address = first_string(
            f,
            &[
                &["ip_address"],
                &["device", "ip_address"],
                &["device_data", "ip_address"],
                &["location", "ip_address"],
            ],
        );

        let card_brand = first_string(f, &[&["card_brand"], &["card", "card_brand"]]);
        let card_type = first_string(f, &[&["card_type"], &["card", "card_type"]]);

        let device = first_object(f, &["device", "device_data"]);
        let authentication = first_object(f, &["authentication", "authentication_data"]);
        let session = first_object(f, &["session", "session_data"]);
        let behavioral_profile = first_object(f, &["behavioral_profile"]);

        let velocity = velocity_of(f);

        let mut enriched = EnrichedTransaction {
            transaction_id,
            user_id,
            user_age_days,
            total_transactions,
            amount,
            currency,
            time_of_day,
            transaction_type,
            merchant,
            merchant_category_code,
            merchant_category,
            location,
            previous_location,
            ip_address,
            card_brand,
            card_type,
            device,
            authentication,
            session,
            behavioral_profile,
            velocity,
            risk_factors: RiskFactors::default(),
            raw: raw.clone(),
        };
        enriched.risk_factors = compute_risk_factors(&enriched);
        enriched
    }
}

/// Unwrap `{"input_data": <object or JSON string>}`. Anything else is returned as-is.
fn unwrap_legacy(transaction: &Transaction) -> Transaction {
    match transaction.get("input_data") {
        Some(Value::Object(inner)) => Transaction::from(inner.clone()),
        Some(Value::String(s)) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(inner)) => Transaction::from(inner),
            _ => {
                let mut map = Map::new();
                map.insert("raw_input".to_string(), Value::String(s.clone()));
                Transaction::from(map)
            }
        },
        _ => transaction.clone(),
    }
}

fn lookup<'a>(fields: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = fields.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    (!current.is_null()).then_some(current)
}

fn first_string(fields: &Map<String, Value>, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| match lookup(fields, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_u64(fields: &Map<String, Value>, paths: &[&[&str]]) -> Option<u64> {
    paths.iter().find_map(|path| as_u64(lookup(fields, path)?))
}

fn first_decimal(fields: &Map<String, Value>, paths: &[&[&str]]) -> Option<Decimal> {
    paths.iter().find_map(|path| as_decimal(lookup(fields, path)?))
}

fn first_object(fields: &Map<String, Value>, keys: &[&str]) -> Value {
    keys.iter()
        .find_map(|key| fields.get(*key).filter(|v| v.is_object()).cloned())
        .unwrap_or_else(|| Value::Object(Map::new()))
}

fn as_decimal(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Accepts `HH:MM`, `HH:MM:SS`, RFC 3339 and naive ISO datetimes.
fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M:%S"))
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.time()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.time())
        })
}

fn location_of(fields: &Map<String, Value>) -> Option<String> {
    match fields.get("location") {
        Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
        Some(Value::Object(loc)) => {
            if let Some(city) = city_and_country(loc) {
                return Some(city);
            }
        }
        _ => {}
    }
    fields
        .get("location_data")
        .and_then(Value::as_object)
        .and_then(city_and_country)
}

fn city_and_country(loc: &Map<String, Value>) -> Option<String> {
    let city = loc.get("transaction_city").and_then(Value::as_str)?;
    match loc.get("transaction_country").and_then(Value::as_str) {
        Some(country) if !country.is_empty() => Some(format!("{city}, {country}")),
        _ => Some(city.to_string()),
    }
}

fn velocity_of(fields: &Map<String, Value>) -> VelocityCounters {
    let counter = |key: &str| {
        lookup(fields, &["velocity_counters", key])
            .and_then(as_u64)
            .unwrap_or(0)
    };
    VelocityCounters {
        transactions_last_hour: counter("transactions_last_hour"),
        transactions_today: counter("transactions_today"),
        transactions_last_24h: counter("transactions_last_24h"),
        declined_transactions_last_24h: counter("declined_transactions_last_24h"),
        amount_today: lookup(fields, &["velocity_counters", "amount_today"])
            .and_then(as_decimal)
            .unwrap_or(Decimal::ZERO),
    }
}

fn compute_risk_factors(tx: &EnrichedTransaction) -> RiskFactors {
    let auth = |key: &str| tx.authentication.get(key);
    let session = |key: &str| tx.session.get(key);
    let hour = tx.time_of_day.hour();

    let login_attempts = session("login_attempts")
        .or_else(|| session("login_attempts_before_success"))
        .and_then(as_u64)
        .unwrap_or(1);

    let ip_type_vpn = lookup(tx.raw.fields(), &["location", "ip_type"])
        .and_then(Value::as_str)
        .is_some_and(|t| t.eq_ignore_ascii_case("VPN"));

    RiskFactors {
        is_new_user: tx.user_age_days < 90,
        is_very_new_user: tx.user_age_days < 7,
        is_high_amount: tx.amount > Decimal::from(1000),
        is_very_high_amount: tx.amount > Decimal::from(5000),
        is_night_time: (1..=5).contains(&hour),
        has_location_change: tx.previous_location != tx.location,
        high_velocity: tx.velocity.transactions_last_hour > 5,
        many_declines: tx.velocity.declined_transactions_last_24h > 3,
        failed_authentication: auth("authentication_status")
            .and_then(Value::as_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("FAILED"))
            || as_flag(auth("mfa_bypassed")),
        no_3ds: auth("authentication_method")
            .and_then(Value::as_str)
            .is_some_and(|s| s.eq_ignore_ascii_case("NONE")),
        vpn_detected: as_flag(tx.device.get("vpn_flag")) || ip_type_vpn,
        password_reset_recent: as_flag(session("password_reset_flag")),
        multiple_login_attempts: login_attempts > 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn normalize(value: Value) -> EnrichedTransaction {
        let tx = Transaction::from_value(&value).unwrap();
        StandardNormalizer.normalize(&tx)
    }

    #[test]
    fn empty_object_gets_defaults() {
        let tx = normalize(json!({}));

        assert!(tx.transaction_id.starts_with("TXN-"));
        assert_eq!(tx.transaction_id.len(), 16);
        assert!(tx.user_id.starts_with("user_"));
        assert_eq!(tx.user_age_days, 180);
        assert_eq!(tx.total_transactions, 10);
        assert_eq!(tx.amount, dec!(100));
        assert_eq!(tx.currency, "USD");
        assert_eq!(tx.time_of_day, NaiveTime::from_hms_opt(14, 0, 0).unwrap());
        assert_eq!(tx.transaction_type, "PURCHASE");
        assert_eq!(tx.merchant, "Unknown Merchant");
        assert_eq!(tx.merchant_category_code, "0000");
        assert_eq!(tx.location, "Unknown");
        assert_eq!(tx.previous_location, "Unknown");
        assert!(tx.device.is_object());
        assert_eq!(tx.velocity, VelocityCounters::default());
        assert!(!tx.has_merchant_data());
        assert!(!tx.has_location_data());
        assert!(tx.risk_factors.active().is_empty());
    }

    #[test]
    fn flat_shape() {
        let tx = normalize(json!({
            "transaction_id": "TXN-001",
            "user_id": "user_42",
            "user_age_days": 30,
            "amount": 1250.50,
            "time": "03:15",
            "merchant": "ElectroMart",
            "merchant_category_code": "5732",
            "location": "Miami, US",
            "previous_location": "Boston, US",
            "velocity_counters": {"transactions_last_hour": 7, "declined_transactions_last_24h": 4}
        }));

        assert_eq!(tx.transaction_id, "TXN-001");
        assert_eq!(tx.amount, dec!(1250.50));
        assert_eq!(tx.time_of_day, NaiveTime::from_hms_opt(3, 15, 0).unwrap());
        assert!(tx.has_merchant_data());
        assert!(tx.has_location_data());
        assert_eq!(
            tx.risk_factors.active(),
            vec![
                "is_new_user",
                "is_high_amount",
                "is_night_time",
                "has_location_change",
                "high_velocity",
                "many_declines"
            ]
        );
    }

    #[test]
    fn nested_shape() {
        let tx = normalize(json!({
            "transaction": {
                "transaction_id": "TXN-20240120-ATO-7F9B34",
                "transaction_type": "TRANSFER",
                "transaction_datetime": "2024-01-20T04:17:28.901Z"
            },
            "financial": {"amount": 4999.00, "currency": "EUR"},
            "card": {"card_brand": "VISA", "card_type": "DEBIT"},
            "merchant": {
                "merchant_name": "QuickTransfer",
                "merchant_category_code": "6536",
                "merchant_category": "Money Transfer"
            },
            "customer": {"customer_id": "CUST-2012-4E8A91", "age_of_account_days": 4160},
            "authentication": {"authentication_method": "PASSWORD", "mfa_bypassed": true},
            "location": {"ip_address": "192.119.67.234", "ip_type": "VPN"},
            "session": {"login_attempts_before_success": 4}
        }));

        assert_eq!(tx.transaction_id, "TXN-20240120-ATO-7F9B34");
        assert_eq!(tx.transaction_type, "TRANSFER");
        assert_eq!(tx.user_id, "CUST-2012-4E8A91");
        assert_eq!(tx.user_age_days, 4160);
        assert_eq!(tx.amount, dec!(4999.00));
        assert_eq!(tx.currency, "EUR");
        assert_eq!(tx.time_of_day, NaiveTime::from_hms_milli_opt(4, 17, 28, 901).unwrap());
        assert_eq!(tx.merchant, "QuickTransfer");
        assert_eq!(tx.merchant_category, "Money Transfer");
        assert_eq!(tx.card_brand.as_deref(), Some("VISA"));
        assert_eq!(tx.ip_address.as_deref(), Some("192.119.67.234"));
        assert_eq!(tx.location, "Unknown");
        assert!(tx.has_location_data());

        let rf = &tx.risk_factors;
        assert!(rf.is_night_time);
        assert!(rf.is_high_amount);
        assert!(!rf.is_very_high_amount);
        assert!(rf.failed_authentication);
        assert!(rf.vpn_detected);
        assert!(rf.multiple_login_attempts);
        assert!(!rf.is_new_user);
    }

    #[test]
    fn nested_location_object_is_joined() {
        let tx = normalize(json!({
            "location": {"transaction_city": "Lisbon", "transaction_country": "PT"},
            "behavioral_profile": {"home_location": {"city": "Porto, PT"}}
        }));
        assert_eq!(tx.location, "Lisbon, PT");
        assert_eq!(tx.previous_location, "Porto, PT");
        assert!(tx.risk_factors.has_location_change);
    }

    #[test]
    fn legacy_envelope_is_unwrapped() {
        let tx = normalize(json!({"input_data": {"transaction_id": "TXN-LEGACY", "amount": 20}}));
        assert_eq!(tx.transaction_id, "TXN-LEGACY");
        assert_eq!(tx.amount, dec!(20));
        assert!(tx.raw.get("input_data").is_none());

        let tx = normalize(json!({"input_data": "{\"transaction_id\": \"TXN-STR\"}"}));
        assert_eq!(tx.transaction_id, "TXN-STR");

        let tx = normalize(json!({"input_data": "free text"}));
        assert_eq!(tx.raw.get("raw_input"), Some(&json!("free text")));
    }

    #[test]
    fn amounts_as_strings_and_nulls() {
        let tx = normalize(json!({"amount": "75.25", "currency": null, "merchant": ""}));
        assert_eq!(tx.amount, dec!(75.25));
        assert_eq!(tx.currency, "USD");
        assert_eq!(tx.merchant, "Unknown Merchant");
    }

    #[test]
    fn authentication_and_session_factors() {
        let tx = normalize(json!({
            "authentication_data": {
                "authentication_status": "FAILED",
                "authentication_method": "NONE"
            },
            "device_data": {"vpn_flag": true},
            "session_data": {"password_reset_flag": true, "login_attempts": 3}
        }));
        let rf = &tx.risk_factors;
        assert!(rf.failed_authentication);
        assert!(rf.no_3ds);
        assert!(rf.vpn_detected);
        assert!(rf.password_reset_recent);
        assert!(rf.multiple_login_attempts);
    }

    #[test]
    fn night_window_boundaries() {
        for (time, night) in [
            ("00:59", false),
            ("01:00", true),
            ("05:59", true),
            ("06:00", false),
        ] {
            let tx = normalize(json!({"time": time}));
            assert_eq!(tx.risk_factors.is_night_time, night, "time {time}");
        }
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(generate_transaction_id(), generate_transaction_id());
    }
}
