//! Declared constraints applied after type conversion, in a fixed order:
//! numeric bounds, length bounds, regex, allowed values (§4.5).

use regex::Regex;
use serde_json::Value;

use crate::error::{DiagnosticId, InputError};

const TRUNCATED_VALUE_DISPLAY_LIMIT: usize = 64;

#[derive(Debug, Clone)]
pub enum Constraint {
    /// `ge`: value >= bound.
    MinValue(f64),
    /// `le`: value <= bound.
    MaxValue(f64),
    /// `gt`: value > bound.
    GreaterThan(f64),
    /// `lt`: value < bound.
    LessThan(f64),
    MinLength(usize),
    MaxLength(usize),
    Pattern(String),
    AllowedValues(Vec<String>),
}

impl Constraint {
    /// The literal predicate name spec.md §4.5 names for each constraint,
    /// reported on a failing [`InputError::ValidationError`].
    fn name(&self) -> &'static str {
        match self {
            Constraint::MinValue(_) => "ge",
            Constraint::MaxValue(_) => "le",
            Constraint::GreaterThan(_) => "gt",
            Constraint::LessThan(_) => "lt",
            Constraint::MinLength(_) => "min_length",
            Constraint::MaxLength(_) => "max_length",
            Constraint::Pattern(_) => "regex",
            Constraint::AllowedValues(_) => "allowed_values",
        }
    }

    /// Ordering key used to apply constraints in the order the spec
    /// prescribes, regardless of declaration order.
    fn order(&self) -> u8 {
        match self {
            Constraint::MinValue(_) | Constraint::MaxValue(_) | Constraint::GreaterThan(_) | Constraint::LessThan(_) => 0,
            Constraint::MinLength(_) | Constraint::MaxLength(_) => 1,
            Constraint::Pattern(_) => 2,
            Constraint::AllowedValues(_) => 3,
        }
    }

    fn check(&self, value: &Value) -> bool {
        match self {
            Constraint::MinValue(min) => value.as_f64().map(|v| v >= *min).unwrap_or(true),
            Constraint::MaxValue(max) => value.as_f64().map(|v| v <= *max).unwrap_or(true),
            Constraint::GreaterThan(min) => value.as_f64().map(|v| v > *min).unwrap_or(true),
            Constraint::LessThan(max) => value.as_f64().map(|v| v < *max).unwrap_or(true),
            Constraint::MinLength(min) => length_of(value).map(|l| l >= *min).unwrap_or(true),
            Constraint::MaxLength(max) => length_of(value).map(|l| l <= *max).unwrap_or(true),
            Constraint::Pattern(pattern) => match (value.as_str(), Regex::new(pattern)) {
                (Some(s), Ok(re)) => re.is_match(s),
                _ => true,
            },
            Constraint::AllowedValues(allowed) => match value.as_str() {
                Some(s) => allowed.iter().any(|a| a == s),
                None => true,
            },
        }
    }
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(a) => Some(a.len()),
        _ => None,
    }
}

fn truncated_display(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.len() > TRUNCATED_VALUE_DISPLAY_LIMIT {
        format!("{}...", &rendered[..TRUNCATED_VALUE_DISPLAY_LIMIT])
    } else {
        rendered
    }
}

/// Apply `constraints` to `value` in the fixed order the spec prescribes,
/// returning the first violation (§4.5).
pub fn validate(parameter: &str, value: &Value, constraints: &[Constraint]) -> Result<(), InputError> {
    let mut ordered: Vec<&Constraint> = constraints.iter().collect();
    ordered.sort_by_key(|c| c.order());

    for constraint in ordered {
        if !constraint.check(value) {
            return Err(InputError::ValidationError {
                parameter: parameter.to_string(),
                constraint: constraint.name().to_string(),
                value_display: truncated_display(value),
                diagnostic_id: DiagnosticId::next(),
            });
        }
    }
    Ok(())
}
