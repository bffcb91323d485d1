//! Per-request parsing configuration and its static checker.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    core::{
        errors::{AppError, AppResult},
        types::ConfigReport,
    },
    parser::{extractor::PathCache, transformer::CoercionType, validator::RangeRule},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsingConfig {
    #[serde(default, alias = "jsonpath_rules", deserialize_with = "null_as_default")]
    pub extraction_rules: IndexMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub validation_rules: ValidationRules,
    #[serde(default, deserialize_with = "null_as_default")]
    pub transform_rules: TransformRules,
    /// New name to old name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_mappings: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default, deserialize_with = "null_as_default")]
    pub required_fields: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_types: IndexMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_patterns: IndexMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_ranges: IndexMap<String, RangeRule>,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        self.required_fields.is_empty()
            && self.field_types.is_empty()
            && self.field_patterns.is_empty()
            && self.field_ranges.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformRules {
    #[serde(default, deserialize_with = "null_as_default")]
    pub field_types: IndexMap<String, String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ParsingConfig {
    pub fn from_value(raw: &Value) -> AppResult<Self> {
        if raw.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(raw.clone())
            .map_err(|err| AppError::InvalidConfig(vec![err.to_string()]))
    }
}

/// Static, non-executing check of a raw configuration document.
///
/// Works on the untyped JSON so that every structural problem is listed, not
/// only the first one a deserializer would stop at.
pub fn inspect(raw: &Value, cache: &PathCache) -> ConfigReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(sections) = raw.as_object() else {
        return ConfigReport::from_findings(vec!["configuration must be an object".into()], warnings);
    };

    if sections.contains_key("extraction_rules") && sections.contains_key("jsonpath_rules") {
        errors.push("extraction_rules and jsonpath_rules are the same section; set only one".into());
    }

    let extraction_key = if sections.contains_key("extraction_rules") {
        "extraction_rules"
    } else {
        "jsonpath_rules"
    };
    let extraction = sections.get(extraction_key).filter(|value| !value.is_null());
    if let Some(rules) = extraction {
        match rules.as_object() {
            None => errors.push(format!("{extraction_key} must be an object")),
            Some(rules) => {
                for (variable, expression) in rules {
                    match expression.as_str() {
                        None => errors.push(format!("path expression for {variable} must be a string")),
                        Some(expression) => {
                            if let Err(err) = cache.get_or_compile(expression) {
                                errors.push(format!("invalid path expression for {variable}: {err}"));
                            }
                        }
                    }
                }
            }
        }
    }

    if let Some(validation) = sections.get("validation_rules").filter(|value| !value.is_null()) {
        match validation.as_object() {
            None => errors.push("validation_rules must be an object".into()),
            Some(validation) => inspect_validation(validation, &mut errors),
        }
    }

    if let Some(transform) = sections.get("transform_rules").filter(|value| !value.is_null()) {
        match transform.as_object() {
            None => errors.push("transform_rules must be an object".into()),
            Some(transform) => {
                if let Some(types) = transform.get("field_types").filter(|value| !value.is_null()) {
                    match types.as_object() {
                        None => errors.push("transform_rules.field_types must be an object".into()),
                        Some(types) => {
                            for (field, target) in types {
                                let supported = target
                                    .as_str()
                                    .is_some_and(|name| name.parse::<CoercionType>().is_ok());
                                if !supported {
                                    errors.push(format!(
                                        "unsupported transform type for {field}: {} (expected one of {})",
                                        display_raw(target),
                                        CoercionType::NAMES.join(", ")
                                    ));
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    let mappings = sections.get("field_mappings").filter(|value| !value.is_null());
    if let Some(mappings) = mappings {
        match mappings.as_object() {
            None => errors.push("field_mappings must be an object".into()),
            Some(mappings) => {
                for (new_name, old_name) in mappings {
                    if !old_name.is_string() {
                        errors.push(format!("mapping source for {new_name} must be a string"));
                    }
                }
            }
        }
    }

    if !is_populated(extraction) && !is_populated(mappings) {
        warnings.push(
            "neither extraction_rules nor field_mappings is set; the payload passes through unchanged"
                .into(),
        );
    }

    ConfigReport::from_findings(errors, warnings)
}

fn inspect_validation(validation: &serde_json::Map<String, Value>, errors: &mut Vec<String>) {
    if let Some(required) = validation.get("required_fields").filter(|value| !value.is_null()) {
        match required.as_array() {
            None => errors.push("required_fields must be an array".into()),
            Some(names) => {
                if names.iter().any(|name| !name.is_string()) {
                    errors.push("required_fields must contain only strings".into());
                }
            }
        }
    }

    if let Some(types) = validation.get("field_types").filter(|value| !value.is_null()) {
        match types.as_object() {
            None => errors.push("field_types must be an object".into()),
            Some(types) => {
                for (field, expected) in types {
                    let known = expected
                        .as_str()
                        .and_then(crate::parser::validator::ValueType::from_name)
                        .is_some();
                    if !known {
                        errors.push(format!("unknown expected type for {field}: {}", display_raw(expected)));
                    }
                }
            }
        }
    }

    if let Some(patterns) = validation.get("field_patterns").filter(|value| !value.is_null()) {
        match patterns.as_object() {
            None => errors.push("field_patterns must be an object".into()),
            Some(patterns) => {
                for (field, pattern) in patterns {
                    match pattern.as_str() {
                        None => errors.push(format!("pattern for {field} must be a string")),
                        Some(pattern) => {
                            if let Err(err) = Regex::new(pattern) {
                                errors.push(format!("invalid regular expression for {field}: {err}"));
                            }
                        }
                    }
                }
            }
        }
    }

    if let Some(ranges) = validation.get("field_ranges").filter(|value| !value.is_null()) {
        match ranges.as_object() {
            None => errors.push("field_ranges must be an object".into()),
            Some(ranges) => {
                for (field, rule) in ranges {
                    if serde_json::from_value::<RangeRule>(rule.clone()).is_err() {
                        errors.push(format!("range for {field} must be an object with numeric min/max"));
                    }
                }
            }
        }
    }
}

fn is_populated(section: Option<&Value>) -> bool {
    match section {
        Some(Value::Object(fields)) => !fields.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

fn display_raw(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
