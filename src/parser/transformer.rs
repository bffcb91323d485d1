use std::{fmt, str::FromStr};

use indexmap::IndexMap;
use serde_json::{Number, Value};
use tracing::warn;

use crate::{
    core::types::Record,
    parser::{eval::is_truthy, validator::stringify},
};

/// Target types for `transform_rules.field_types`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionType {
    Int,
    Float,
    Str,
    Bool,
    Json,
}

impl CoercionType {
    pub const NAMES: [&'static str; 5] = ["int", "float", "str", "bool", "json"];

    pub fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Bool => "bool",
            Self::Json => "json",
        }
    }

    pub fn apply(self, value: &Value) -> Result<Value, String> {
        match self {
            Self::Int => to_int(value),
            Self::Float => to_float(value),
            Self::Str => Ok(Value::String(stringify(value))),
            Self::Bool => Ok(Value::Bool(to_bool(value))),
            Self::Json => to_json(value),
        }
    }
}

impl FromStr for CoercionType {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "int" => Ok(Self::Int),
            "float" => Ok(Self::Float),
            "str" => Ok(Self::Str),
            "bool" => Ok(Self::Bool),
            "json" => Ok(Self::Json),
            other => Err(format!("unsupported transform type: {other}")),
        }
    }
}

impl fmt::Display for CoercionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    pub field: String,
    pub target: CoercionType,
    pub reason: String,
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field {} could not be converted to {}: {}",
            self.field, self.target, self.reason
        )
    }
}

fn to_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(number) if number.is_i64() || number.is_u64() => Ok(value.clone()),
        Value::Number(number) => {
            let float = number.as_f64().unwrap_or(f64::NAN);
            if !float.is_finite() || float.abs() >= i64::MAX as f64 {
                return Err(format!("{number} is out of integer range"));
            }
            Ok(Value::from(float.trunc() as i64))
        }
        Value::Bool(flag) => Ok(Value::from(i64::from(*flag))),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| format!("invalid integer literal {text:?}")),
        other => Err(format!("cannot convert {} to int", super::validator::type_name(other))),
    }
}

fn to_float(value: &Value) -> Result<Value, String> {
    let float = match value {
        Value::Number(number) => number.as_f64(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    float
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| format!("cannot convert {} to a finite float", stringify(value)))
}

fn to_bool(value: &Value) -> bool {
    match value {
        Value::String(text) => matches!(
            text.to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        other => is_truthy(other),
    }
}

fn to_json(value: &Value) -> Result<Value, String> {
    match value {
        Value::String(text) => serde_json::from_str(text).map_err(|err| err.to_string()),
        other => Ok(other.clone()),
    }
}

/// Coerces each configured field in rule order; stops at the first failure.
///
/// Absent and null fields are left alone. Unknown type names are skipped with
/// a warning; `validate_config` rejects them up front.
pub fn coerce_types(
    record: &Record,
    rules: &IndexMap<String, String>,
) -> Result<Record, CoercionError> {
    let mut coerced = record.clone();
    for (field, target) in rules {
        let target = match target.parse::<CoercionType>() {
            Ok(target) => target,
            Err(reason) => {
                warn!(field = %field, "{reason}");
                continue;
            }
        };
        let Some(slot) = coerced.get_mut(field) else {
            continue;
        };
        if slot.is_null() {
            continue;
        }
        *slot = target.apply(slot).map_err(|reason| CoercionError {
            field: field.clone(),
            target,
            reason,
        })?;
    }
    Ok(coerced)
}

/// Renames fields. `mapping` is new name to old name.
///
/// Mapped entries come first in mapping order, followed by every source field
/// not claimed as a mapping source.
pub fn apply_field_mappings(record: &Record, mapping: &IndexMap<String, String>) -> Record {
    let mut mapped = Record::new();
    for (new_name, old_name) in mapping {
        match record.get(old_name) {
            Some(value) => {
                mapped.insert(new_name.clone(), value.clone());
            }
            None => warn!(source = %old_name, target = %new_name, "mapping source field missing"),
        }
    }

    for (field, value) in record {
        if !mapping.values().any(|old_name| old_name == field) {
            mapped.insert(field.clone(), value.clone());
        }
    }
    mapped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn int_coercion_truncates_and_parses() {
        assert_eq!(CoercionType::Int.apply(&json!(" 42 ")), Ok(json!(42)));
        assert_eq!(CoercionType::Int.apply(&json!(3.9)), Ok(json!(3)));
        assert_eq!(CoercionType::Int.apply(&json!(true)), Ok(json!(1)));
        assert!(CoercionType::Int.apply(&json!("abc")).is_err());
        assert!(CoercionType::Int.apply(&json!([1])).is_err());
    }

    #[test]
    fn bool_coercion_uses_literal_set_for_strings() {
        for truthy in ["true", "TRUE", "1", "yes", "On"] {
            assert_eq!(CoercionType::Bool.apply(&json!(truthy)), Ok(json!(true)));
        }
        assert_eq!(CoercionType::Bool.apply(&json!("y")), Ok(json!(false)));
        assert_eq!(CoercionType::Bool.apply(&json!(0)), Ok(json!(false)));
        assert_eq!(CoercionType::Bool.apply(&json!([0])), Ok(json!(true)));
    }

    #[test]
    fn json_coercion_leaves_structured_values() {
        assert_eq!(CoercionType::Json.apply(&json!("{\"a\":1}")), Ok(json!({"a": 1})));
        assert_eq!(CoercionType::Json.apply(&json!({"a": 1})), Ok(json!({"a": 1})));
        assert!(CoercionType::Json.apply(&json!("{oops")).is_err());
    }

    #[test]
    fn float_rejects_non_finite() {
        assert_eq!(CoercionType::Float.apply(&json!("2.5")), Ok(json!(2.5)));
        assert!(CoercionType::Float.apply(&json!("inf")).is_err());
    }

    #[test]
    fn str_coercion_renders_json_for_non_strings() {
        assert_eq!(CoercionType::Str.apply(&json!(12)), Ok(json!("12")));
        assert_eq!(CoercionType::Str.apply(&json!({"a": true})), Ok(json!("{\"a\":true}")));
    }
}
