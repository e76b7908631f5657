use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::types::{AnalysisOutcome, AnalysisWarning, RiskReport, TestFinding};
use super::AnalysisError;

/// A whole payload wrapped in a ```/```json fence pair.
static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?i:json)?\s*(.*?)\s*```\s*$").expect("fence pattern is valid")
});

/// Remove a leading ``` or ```json fence and a trailing ``` fence when both
/// sit at the boundaries of the text. Anything else is only trimmed.
pub fn strip_code_fences(text: &str) -> &str {
    match FENCED.captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Parse a completion payload into a risk report.
pub fn parse_risk_report(raw: &str) -> Result<AnalysisOutcome, AnalysisError> {
    let malformed = |reason: String| AnalysisError::MalformedCompletion {
        raw: raw.to_string(),
        reason,
    };

    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned).map_err(|e| malformed(e.to_string()))?;
    let root = value
        .as_object()
        .ok_or_else(|| malformed(format!("expected a JSON object, got {}", kind_of(&value))))?;

    let mut warnings = Vec::new();
    let summary = root.get("summary").map(text_of).unwrap_or_default();

    let mut tests = Vec::new();
    if let Some(entries) = root.get("tests").and_then(Value::as_array) {
        for (index, entry) in entries.iter().enumerate() {
            match entry.as_object() {
                Some(fields) => tests.push(parse_finding(fields, &mut warnings)),
                None => {
                    tracing::warn!(index, "Skipping non-object entry in tests");
                    warnings.push(AnalysisWarning::SkippedEntry { index });
                }
            }
        }
    }

    if tests.is_empty() {
        warnings.push(AnalysisWarning::NoFindings);
    }

    Ok(AnalysisOutcome {
        report: RiskReport { summary, tests },
        warnings,
    })
}

fn parse_finding(fields: &Map<String, Value>, warnings: &mut Vec<AnalysisWarning>) -> TestFinding {
    let field = |key: &str| fields.get(key).map(text_of).unwrap_or_default();
    let name = field("name");

    let risk_percent = match fields.get("risk_percent") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let parsed = parse_risk_percent(v);
            if parsed.is_none() {
                tracing::warn!(test = %name, value = %v, "Ignoring out-of-range risk_percent");
                warnings.push(AnalysisWarning::InvalidRiskPercent { test: name.clone() });
            }
            parsed
        }
    };

    TestFinding {
        current_value: field("current_value"),
        safe_range: field("safe_range"),
        risk_reason: field("risk_reason"),
        risk_percent,
        name,
        literature: Vec::new(),
    }
}

/// Accept 75, 75.0, "75" or "75%". Anything outside 0..=100 or fractional is rejected.
fn parse_risk_percent(value: &Value) -> Option<u8> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok()?,
        _ => return None,
    };
    if number.fract() != 0.0 || !(0.0..=100.0).contains(&number) {
        return None;
    }
    Some(number as u8)
}

/// Strings pass through; null becomes empty; other scalars use their JSON text.
fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
