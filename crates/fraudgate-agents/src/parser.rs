//! Turns free-form analyzer replies into validated assessments.
//!
//! Anything that does not fit the `AnalyzerAssessment` shape is rejected here,
//! so aggregation only ever sees well-formed scores.

use fraudgate_models::{is_valid_score, AnalyzerAssessment, Decision, Finding, Severity};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::AnalyzerError;

/// Pull the assessment object out of an analyzer reply.
///
/// Accepted, in order: the whole reply as an object, the body of a code
/// fence tagged `json` or left untagged, or the first balanced `{...}` in
/// surrounding prose.
pub fn extract_json(text: &str) -> Result<String, AnalyzerError> {
    let trimmed = text.trim();

    [Some(trimmed), fenced_block(trimmed), first_object(trimmed)]
        .into_iter()
        .flatten()
        .find(|candidate| {
            candidate.starts_with('{')
                && serde_json::from_str::<serde_json::Value>(candidate).is_ok()
        })
        .map(str::to_string)
        .ok_or_else(|| {
            AnalyzerError::Parse(format!(
                "no JSON object in analyzer reply ({} bytes)",
                text.len()
            ))
        })
}

/// Body of the first fence tagged `json` or untagged.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let (tag, rest) = text[open + 3..].split_once('\n')?;
    let tag = tag.trim();
    if !(tag.is_empty() || tag.eq_ignore_ascii_case("json")) {
        return None;
    }
    let close = rest.find("```")?;
    Some(rest[..close].trim())
}

/// First balanced `{...}` span. Braces inside string literals do not count.
fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }

    None
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFinding {
    Text(String),
    Tagged {
        #[serde(alias = "finding", alias = "text")]
        description: String,
        #[serde(default)]
        severity: Severity,
    },
}

impl From<RawFinding> for Finding {
    fn from(raw: RawFinding) -> Self {
        match raw {
            RawFinding::Text(description) => Finding::info(description),
            RawFinding::Tagged {
                description,
                severity,
            } => Finding {
                description,
                severity,
            },
        }
    }
}

#[derive(Deserialize)]
struct RawAssessment {
    risk_score: Decimal,
    #[serde(default)]
    findings: Vec<RawFinding>,
    recommendation: String,
}

fn parse_recommendation(value: &str) -> Result<Decision, AnalyzerError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "APPROVE" => Ok(Decision::Approve),
        "REVIEW" => Ok(Decision::Review),
        "DECLINE" => Ok(Decision::Decline),
        other => Err(AnalyzerError::Invalid(format!(
            "unknown recommendation {other:?}"
        ))),
    }
}

/// Validate a JSON payload against the assessment shape.
///
/// The whole payload is kept as `raw_detail`.
pub fn validate_assessment(
    payload: serde_json::Value,
) -> Result<AnalyzerAssessment, AnalyzerError> {
    if !payload.is_object() {
        return Err(AnalyzerError::Invalid(
            "assessment must be a JSON object".to_string(),
        ));
    }

    let raw: RawAssessment = serde_json::from_value(payload.clone())
        .map_err(|e| AnalyzerError::Invalid(format!("assessment shape: {e}")))?;

    if !is_valid_score(raw.risk_score) {
        return Err(AnalyzerError::Invalid(format!(
            "risk_score {} outside 0-100",
            raw.risk_score
        )));
    }

    Ok(AnalyzerAssessment {
        risk_score: raw.risk_score,
        findings: raw.findings.into_iter().map(Finding::from).collect(),
        recommendation: parse_recommendation(&raw.recommendation)?,
        raw_detail: payload,
    })
}

/// Parse an assessment from raw analyzer output.
pub fn parse_assessment(raw: &str) -> Result<AnalyzerAssessment, AnalyzerError> {
    let json_str = extract_json(raw)?;
    let payload: serde_json::Value = serde_json::from_str(&json_str)?;
    validate_assessment(payload)
}
