//! Rule checks over an extracted record.
//!
//! Every check returns the complete list of violations for its category; the
//! parser concatenates them so a caller sees all problems in one failure.

use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::types::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    Type,
    Pattern,
    Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(kind: IssueKind, field: &str, message: String) -> Self {
        Self {
            kind,
            field: field.to_string(),
            message,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Inclusive numeric bounds; an absent side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// Runtime JSON type names accepted by `field_types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    Float,
    Number,
    Str,
    Bool,
    List,
    Dict,
}

impl ValueType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Some(Self::Int),
            "float" => Some(Self::Float),
            "number" => Some(Self::Number),
            "str" | "string" => Some(Self::Str),
            "bool" | "boolean" => Some(Self::Bool),
            "list" | "array" => Some(Self::List),
            "dict" | "object" => Some(Self::Dict),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Number => "number",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Dict => "dict",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match (self, value) {
            (Self::Int, Value::Number(number)) => number.is_i64() || number.is_u64(),
            (Self::Float, Value::Number(number)) => number.is_f64(),
            (Self::Number, Value::Number(_)) => true,
            (Self::Str, Value::String(_)) => true,
            (Self::Bool, Value::Bool(_)) => true,
            (Self::List, Value::Array(_)) => true,
            (Self::Dict, Value::Object(_)) => true,
            _ => false,
        }
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Strings render raw, everything else as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn present<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    record.get(field).filter(|value| !value.is_null())
}

pub fn required_fields(record: &Record, names: &[String]) -> Vec<ValidationIssue> {
    names
        .iter()
        .filter(|name| present(record, name).is_none())
        .map(|name| ValidationIssue::new(IssueKind::Missing, name, format!("missing field {name}")))
        .collect()
}

pub fn field_types(record: &Record, rules: &IndexMap<String, String>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (field, expected) in rules {
        let Some(value) = present(record, field) else {
            continue;
        };
        match ValueType::from_name(expected) {
            Some(kind) if kind.matches(value) => {}
            Some(kind) => issues.push(ValidationIssue::new(
                IssueKind::Type,
                field,
                format!("{field}: expected {}, got {}", kind.name(), type_name(value)),
            )),
            None => issues.push(ValidationIssue::new(
                IssueKind::Type,
                field,
                format!("{field}: unknown expected type {expected}"),
            )),
        }
    }
    issues
}

/// Patterns match from the start of the stringified value, not the whole of it.
pub fn field_patterns(record: &Record, rules: &IndexMap<String, String>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (field, pattern) in rules {
        let Some(value) = present(record, field) else {
            continue;
        };
        let regex = match Regex::new(pattern) {
            Ok(regex) => regex,
            Err(err) => {
                issues.push(ValidationIssue::new(
                    IssueKind::Pattern,
                    field,
                    format!("{field}: invalid pattern {pattern}: {err}"),
                ));
                continue;
            }
        };
        let text = stringify(value);
        let anchored = regex.find(&text).is_some_and(|found| found.start() == 0);
        if !anchored {
            issues.push(ValidationIssue::new(
                IssueKind::Pattern,
                field,
                format!("{field} does not match pattern {pattern}"),
            ));
        }
    }
    issues
}

pub fn field_ranges(record: &Record, rules: &IndexMap<String, RangeRule>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for (field, rule) in rules {
        let Some(value) = present(record, field) else {
            continue;
        };
        let Some(number) = as_number(value) else {
            issues.push(ValidationIssue::new(
                IssueKind::Range,
                field,
                format!("{field}: value {} is not numeric", stringify(value)),
            ));
            continue;
        };
        if let Some(min) = rule.min {
            if number < min {
                issues.push(ValidationIssue::new(
                    IssueKind::Range,
                    field,
                    format!("{field}: value {number} is below minimum {min}"),
                ));
            }
        }
        if let Some(max) = rule.max {
            if number > max {
                issues.push(ValidationIssue::new(
                    IssueKind::Range,
                    field,
                    format!("{field}: value {number} is above maximum {max}"),
                ));
            }
        }
    }
    issues
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(fields) => fields,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn null_counts_as_missing() {
        let data = record(json!({"a": 1, "b": null}));
        let issues = required_fields(&data, &["a".into(), "b".into(), "c".into()]);
        let fields: Vec<_> = issues.iter().map(|issue| issue.field.as_str()).collect();
        assert_eq!(fields, vec!["b", "c"]);
        assert_eq!(issues[0].message, "missing field b");
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let data = record(json!({"n": "5", "f": 1.5, "i": 3}));
        let rules = IndexMap::from([
            ("n".to_string(), "int".to_string()),
            ("f".to_string(), "number".to_string()),
            ("i".to_string(), "float".to_string()),
        ]);
        let messages: Vec<_> = field_types(&data, &rules)
            .into_iter()
            .map(|issue| issue.message)
            .collect();
        assert_eq!(messages, vec!["n: expected int, got str", "i: expected float, got int"]);
    }

    #[test]
    fn pattern_is_anchored_at_start_only() {
        let data = record(json!({"code": "123abc", "tail": "abc123"}));
        let rules = IndexMap::from([
            ("code".to_string(), "[0-9]+".to_string()),
            ("tail".to_string(), "[0-9]+".to_string()),
        ]);
        let issues = field_patterns(&data, &rules);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "tail");
    }

    #[test]
    fn invalid_regex_is_reported_not_raised() {
        let data = record(json!({"a": "x"}));
        let rules = IndexMap::from([("a".to_string(), "([".to_string())]);
        let issues = field_patterns(&data, &rules);
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.starts_with("a: invalid pattern (["));
    }

    #[test]
    fn ranges_coerce_numeric_strings() {
        let data = record(json!({"s": " 7 ", "word": "seven"}));
        let rules = IndexMap::from([
            ("s".to_string(), RangeRule { min: Some(0.0), max: Some(5.0) }),
            ("word".to_string(), RangeRule::default()),
        ]);
        let messages: Vec<_> = field_ranges(&data, &rules)
            .into_iter()
            .map(|issue| issue.message)
            .collect();
        assert_eq!(
            messages,
            vec!["s: value 7 is above maximum 5", "word: value seven is not numeric"]
        );
    }
}
