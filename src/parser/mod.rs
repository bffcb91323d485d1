//! Webhook payload parsing: extract, validate, transform, rename.

pub mod config;
pub mod eval;
pub mod extractor;
pub mod path;
pub mod transformer;
pub mod validator;

use std::{fmt, sync::Arc};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::{
    errors::AppError,
    types::{ConfigReport, ParseTestOutcome, Record},
};

pub use config::{ParsingConfig, TransformRules, ValidationRules};
pub use extractor::{Extractor, PathCache};
pub use path::{JsonPath, PathError};
pub use validator::{RangeRule, ValidationIssue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStage {
    Configuration,
    Extraction,
    Validation,
    Transformation,
}

impl ParseStage {
    pub fn code(self) -> &'static str {
        match self {
            Self::Configuration => "INVALID_CONFIG",
            Self::Extraction => "EXTRACTION_FAILED",
            Self::Validation => "VALIDATION_FAILED",
            Self::Transformation => "TRANSFORM_FAILED",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Extraction => "extraction",
            Self::Validation => "validation",
            Self::Transformation => "transformation",
        }
    }
}

impl fmt::Display for ParseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The one error `parse` produces: the failing stage plus every problem found there.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} failed: {}", .problems.join("; "))]
pub struct ParseFailure {
    pub stage: ParseStage,
    pub problems: Vec<String>,
}

impl ParseFailure {
    fn new(stage: ParseStage, problems: Vec<String>) -> Self {
        Self { stage, problems }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WebhookDataParser {
    extractor: Extractor,
}

impl WebhookDataParser {
    pub fn new(cache: Arc<PathCache>) -> Self {
        Self {
            extractor: Extractor::new(cache),
        }
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn parse(&self, payload: &Value, config: &ParsingConfig) -> Result<Record, ParseFailure> {
        debug!(rules = config.extraction_rules.len(), "parsing webhook payload");

        let extracted = self.extract(payload, config)?;
        debug!(fields = extracted.len(), "extraction complete");

        let issues = validate(&extracted, &config.validation_rules);
        if !issues.is_empty() {
            warn!(issues = issues.len(), "payload failed validation");
            return Err(ParseFailure::new(
                ParseStage::Validation,
                issues.iter().map(ToString::to_string).collect(),
            ));
        }

        let transformed =
            transformer::coerce_types(&extracted, &config.transform_rules.field_types).map_err(
                |err| ParseFailure::new(ParseStage::Transformation, vec![err.to_string()]),
            )?;

        let mapped = if config.field_mappings.is_empty() {
            transformed
        } else {
            transformer::apply_field_mappings(&transformed, &config.field_mappings)
        };

        info!(fields = mapped.len(), "webhook payload parsed");
        Ok(mapped)
    }

    /// Like [`parse`](Self::parse) but takes the configuration as raw JSON.
    pub fn parse_value(&self, payload: &Value, raw_config: &Value) -> Result<Record, AppError> {
        let config = ParsingConfig::from_value(raw_config).map_err(|err| match err {
            AppError::InvalidConfig(problems) => {
                AppError::Parse(ParseFailure::new(ParseStage::Configuration, problems))
            }
            other => other,
        })?;
        Ok(self.parse(payload, &config)?)
    }

    /// Never fails; the outcome carries either the parsed record or the error.
    pub fn test_parsing_config(&self, sample: &Value, raw_config: &Value) -> ParseTestOutcome {
        match self.parse_value(sample, raw_config) {
            Ok(record) => ParseTestOutcome {
                success: true,
                message: "parsing configuration test succeeded".into(),
                parsed_data: Some(Value::Object(record)),
                error_code: None,
                original_data: sample.clone(),
            },
            Err(err) => ParseTestOutcome {
                success: false,
                message: err.to_string(),
                parsed_data: None,
                error_code: Some(err.code().to_string()),
                original_data: sample.clone(),
            },
        }
    }

    pub fn validate_config(&self, raw_config: &Value) -> ConfigReport {
        config::inspect(raw_config, self.extractor.cache())
    }

    fn extract(&self, payload: &Value, config: &ParsingConfig) -> Result<Record, ParseFailure> {
        if config.extraction_rules.is_empty() {
            return match payload {
                Value::Object(fields) => Ok(fields.clone()),
                other => Err(ParseFailure::new(
                    ParseStage::Extraction,
                    vec![format!(
                        "payload must be an object when no extraction rules are set, got {}",
                        validator::type_name(other)
                    )],
                )),
            };
        }

        self.extractor
            .extract_with_rules(payload, &config.extraction_rules)
            .map_err(|failures| {
                ParseFailure::new(
                    ParseStage::Extraction,
                    failures.iter().map(ToString::to_string).collect(),
                )
            })
    }
}

/// Runs every validation category and returns all violations together.
pub fn validate(record: &Record, rules: &ValidationRules) -> Vec<ValidationIssue> {
    let mut issues = validator::required_fields(record, &rules.required_fields);
    issues.extend(validator::field_types(record, &rules.field_types));
    issues.extend(validator::field_patterns(record, &rules.field_patterns));
    issues.extend(validator::field_ranges(record, &rules.field_ranges));
    issues
}
