//! Built-in coercions, normalizations, and validation checks
//!
//! Coercions and normalizations are best-effort and infallible: input that
//! cannot be converted passes through unchanged so a later validation step can
//! reject it with a proper message. All of them are idempotent: applying the
//! same step to an already-canonical value yields the same value.
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use crate::shape::{CoercionKind, NormalizationKind, ValidationCheck};
use crate::types::{Snapshot, ValidationOutcome};
use serde_json::{Number, Value};

/// Apply a coercion step to a value
pub(crate) fn apply_coercion(kind: &CoercionKind, value: &Value) -> Value {
    match kind {
        CoercionKind::Number => coerce_number(value),
        CoercionKind::Boolean => coerce_boolean(value),
        CoercionKind::Text => coerce_text(value),
        CoercionKind::Custom { apply, .. } => apply(value),
    }
}

/// Apply a normalization step to a value
pub(crate) fn apply_normalization(kind: &NormalizationKind, value: &Value) -> Value {
    match kind {
        NormalizationKind::Trim => map_string(value, |s| s.trim().to_string()),
        NormalizationKind::Lowercase => map_string(value, |s| s.to_lowercase()),
        NormalizationKind::Uppercase => map_string(value, |s| s.to_uppercase()),
        NormalizationKind::CollapseWhitespace => {
            map_string(value, |s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        }
        NormalizationKind::Default(default) => {
            if value.is_null() {
                default.clone()
            } else {
                value.clone()
            }
        }
        NormalizationKind::Custom { apply, .. } => apply(value),
    }
}

/// Run a validation check against a value
pub(crate) fn run_check(
    check: &ValidationCheck,
    value: &Value,
    snapshot: &Snapshot<'_>,
) -> ValidationOutcome {
    match check {
        ValidationCheck::Required => {
            if value.is_null() {
                ValidationOutcome::Fail("required field is missing or null".to_string())
            } else {
                ValidationOutcome::Pass
            }
        }
        ValidationCheck::MinLength(min) => match value.as_str() {
            Some(s) if s.chars().count() >= *min => ValidationOutcome::Pass,
            Some(s) => ValidationOutcome::Fail(format!(
                "length {} is below the minimum of {}",
                s.chars().count(),
                min
            )),
            None => expected_text(value),
        },
        ValidationCheck::MaxLength(max) => match value.as_str() {
            Some(s) if s.chars().count() <= *max => ValidationOutcome::Pass,
            Some(s) => ValidationOutcome::Fail(format!(
                "length {} exceeds the maximum of {}",
                s.chars().count(),
                max
            )),
            None => expected_text(value),
        },
        ValidationCheck::Pattern(pattern) => match value.as_str() {
            Some(s) if pattern.is_match(s) => ValidationOutcome::Pass,
            Some(_) => ValidationOutcome::Fail(format!(
                "value does not match pattern /{}/",
                pattern.as_str()
            )),
            None => expected_text(value),
        },
        ValidationCheck::Range { min, max } => match value.as_f64() {
            Some(n) => match (min, max) {
                (Some(m), _) if n < *m => {
                    ValidationOutcome::Fail(format!("{} is below the minimum of {}", n, m))
                }
                (_, Some(m)) if n > *m => {
                    ValidationOutcome::Fail(format!("{} exceeds the maximum of {}", n, m))
                }
                _ => ValidationOutcome::Pass,
            },
            None => ValidationOutcome::Fail(format!("expected a number, got {}", type_name(value))),
        },
        ValidationCheck::OneOf(allowed) => {
            if allowed.contains(value) {
                ValidationOutcome::Pass
            } else {
                ValidationOutcome::Fail(format!(
                    "value {} is not one of the {} allowed values",
                    value,
                    allowed.len()
                ))
            }
        }
        ValidationCheck::MatchesField(other) => match snapshot.get(other) {
            Some(expected) if expected == value => ValidationOutcome::Pass,
            Some(_) => {
                ValidationOutcome::Fail(format!("value does not match field '{}'", other))
            }
            None => ValidationOutcome::Fail(format!("field '{}' is not available", other)),
        },
        ValidationCheck::Custom { test, .. } => test(value, snapshot),
    }
}

fn expected_text(value: &Value) -> ValidationOutcome {
    ValidationOutcome::Fail(format!("expected text, got {}", type_name(value)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn map_string(value: &Value, f: impl Fn(&str) -> String) -> Value {
    match value.as_str() {
        Some(s) => Value::String(f(s)),
        None => value.clone(),
    }
}

fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => {
            let text = s.trim().replace(',', "");
            if let Ok(i) = text.parse::<i64>() {
                return Value::Number(Number::from(i));
            }
            if let Ok(f) = text.parse::<f64>() {
                if let Some(n) = Number::from_f64(f) {
                    return Value::Number(n);
                }
            }
            match parse_number_words(&text.to_lowercase()) {
                Some(n) => Value::Number(Number::from(n)),
                None => value.clone(),
            }
        }
        Value::Bool(b) => Value::Number(Number::from(if *b { 1 } else { 0 })),
        _ => value.clone(),
    }
}

fn coerce_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(_) => value.clone(),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Value::Bool(true),
            "false" | "no" | "0" | "off" => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn coerce_text(value: &Value) -> Value {
    match value {
        Value::String(_) | Value::Null => value.clone(),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        _ => value.clone(),
    }
}

/// Parse spelled-out integers up to ninety-nine ("five", "twenty-one")
fn parse_number_words(text: &str) -> Option<i64> {
    const UNITS: &[(&str, i64)] = &[
        ("zero", 0),
        ("one", 1),
        ("two", 2),
        ("three", 3),
        ("four", 4),
        ("five", 5),
        ("six", 6),
        ("seven", 7),
        ("eight", 8),
        ("nine", 9),
        ("ten", 10),
        ("eleven", 11),
        ("twelve", 12),
        ("thirteen", 13),
        ("fourteen", 14),
        ("fifteen", 15),
        ("sixteen", 16),
        ("seventeen", 17),
        ("eighteen", 18),
        ("nineteen", 19),
    ];
    const TENS: &[(&str, i64)] = &[
        ("twenty", 20),
        ("thirty", 30),
        ("forty", 40),
        ("fifty", 50),
        ("sixty", 60),
        ("seventy", 70),
        ("eighty", 80),
        ("ninety", 90),
    ];

    let lookup = |word: &str, table: &[(&str, i64)]| {
        table.iter().find(|(w, _)| *w == word).map(|(_, n)| *n)
    };

    let words: Vec<&str> = text
        .split(|c| c == ' ' || c == '-')
        .filter(|w| !w.is_empty())
        .collect();
    match words.as_slice() {
        &[word] => lookup(word, UNITS).or_else(|| lookup(word, TENS)),
        &[tens, unit] => {
            let tens = lookup(tens, TENS)?;
            let unit = lookup(unit, UNITS).filter(|n| (1..=9).contains(n))?;
            Some(tens + unit)
        }
        _ => None,
    }
}
