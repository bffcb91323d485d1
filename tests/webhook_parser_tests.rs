use std::sync::Arc;

use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{json, Value};
use webhook_analyst_lib::{
    core::types::Record,
    parser::{
        transformer::apply_field_mappings, validator, ParseStage, ParsingConfig, PathCache,
        RangeRule, WebhookDataParser,
    },
};

fn parser() -> WebhookDataParser {
    WebhookDataParser::new(Arc::new(PathCache::new()))
}

fn config(raw: Value) -> ParsingConfig {
    ParsingConfig::from_value(&raw).expect("config should deserialize")
}

fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object literal")
}

#[test]
fn extraction_rule_pulls_nested_value() {
    let parsed = parser()
        .parse(
            &json!({"repo": {"name": "demo"}}),
            &config(json!({"extraction_rules": {"project": "$.repo.name"}})),
        )
        .expect("parse should succeed");

    assert_eq!(Value::Object(parsed), json!({"project": "demo"}));
}

#[test]
fn validation_failure_lists_every_problem() {
    let err = parser()
        .parse(
            &json!({"a": "x"}),
            &config(json!({
                "validation_rules": {
                    "required_fields": ["a", "b"],
                    "field_patterns": {"a": "^[0-9]+$"}
                }
            })),
        )
        .expect_err("validation should fail");

    assert_eq!(err.stage, ParseStage::Validation);
    let message = err.to_string();
    assert!(message.starts_with("validation failed: "), "{message}");
    assert!(message.contains("missing field b"), "{message}");
    assert!(message.contains("a does not match pattern"), "{message}");
}

#[test]
fn transform_coerces_string_to_integer() {
    let parsed = parser()
        .parse(
            &json!({"n": "42"}),
            &config(json!({"transform_rules": {"field_types": {"n": "int"}}})),
        )
        .expect("parse should succeed");

    assert_eq!(parsed["n"], json!(42));
    assert!(parsed["n"].is_i64());
}

#[test]
fn empty_configuration_is_identity() {
    let payload = json!({
        "event": "issue.updated",
        "issue": {"id": 7, "labels": ["bug", "p1"], "closed": false, "owner": null}
    });
    let parsed = parser()
        .parse(&payload, &ParsingConfig::default())
        .expect("parse should succeed");

    assert_eq!(Value::Object(parsed), payload);
}

#[test]
fn non_object_payload_without_rules_fails_extraction() {
    let err = parser()
        .parse(&json!([1, 2, 3]), &ParsingConfig::default())
        .expect_err("array payload cannot pass through");
    assert_eq!(err.stage, ParseStage::Extraction);
}

#[test]
fn extracted_keys_match_rule_keys_even_without_matches() {
    let rules = json!({
        "title": "$.issue.title",
        "missing": "$.nothing.here",
        "first_label": "$.issue.labels[0]",
        "all": "$..id"
    });
    let parsed = parser()
        .parse(
            &json!({"issue": {"id": 1, "title": "Crash", "labels": ["bug"]}}),
            &config(json!({"extraction_rules": rules})),
        )
        .expect("parse should succeed");

    let keys: Vec<&str> = parsed.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["title", "missing", "first_label", "all"]);
    assert_eq!(parsed["missing"], Value::Null);
    assert_eq!(parsed["first_label"], json!("bug"));
    assert_eq!(parsed["all"], json!(1));
}

#[test]
fn malformed_rules_are_reported_together() {
    let err = parser()
        .parse(
            &json!({"a": 1}),
            &config(json!({"extraction_rules": {
                "good": "$.a",
                "bad_one": "$.a[",
                "bad_two": "$.b[?(@.x >)]"
            }})),
        )
        .expect_err("extraction should fail");

    assert_eq!(err.stage, ParseStage::Extraction);
    assert_eq!(err.problems.len(), 2);
    assert!(err.problems[0].starts_with("variable bad_one: "));
    assert!(err.problems[0].contains("$.a["));
    assert!(err.problems[1].starts_with("variable bad_two: "));
}

#[test]
fn stages_run_in_order_extract_validate_transform_rename() {
    let parsed = parser()
        .parse(
            &json!({"payload": {"count": "12", "flag": "YES"}}),
            &config(json!({
                "extraction_rules": {"count": "$.payload.count", "flag": "$.payload.flag"},
                "validation_rules": {
                    "field_types": {"count": "str"},
                    "field_ranges": {"count": {"min": 10, "max": 20}}
                },
                "transform_rules": {"field_types": {"count": "int", "flag": "bool"}},
                "field_mappings": {"total": "count"}
            })),
        )
        .expect("parse should succeed");

    assert_eq!(Value::Object(parsed), json!({"total": 12, "flag": true}));
}

#[test]
fn transform_failure_names_field_and_type() {
    let err = parser()
        .parse(
            &json!({"n": "abc", "m": "also bad"}),
            &config(json!({"transform_rules": {"field_types": {"n": "int", "m": "float"}}})),
        )
        .expect_err("transform should fail");

    assert_eq!(err.stage, ParseStage::Transformation);
    assert_eq!(err.problems.len(), 1);
    assert!(err.problems[0].contains("field n"));
    assert!(err.problems[0].contains("int"));
}

#[test]
fn unknown_transform_type_is_skipped_at_runtime() {
    let parsed = parser()
        .parse(
            &json!({"n": "5"}),
            &config(json!({"transform_rules": {"field_types": {"n": "decimal"}}})),
        )
        .expect("unknown type is only a warning");
    assert_eq!(parsed["n"], json!("5"));
}

#[rstest]
#[case(json!(0), true)]
#[case(json!(10), true)]
#[case(json!(5.5), true)]
#[case(json!(-0.001), false)]
#[case(json!(10.001), false)]
#[case(json!("10"), true)]
fn ranges_are_inclusive(#[case] value: Value, #[case] accepted: bool) {
    let data = record(json!({ "score": value }));
    let rules = [(
        "score".to_string(),
        RangeRule {
            min: Some(0.0),
            max: Some(10.0),
        },
    )]
    .into_iter()
    .collect();

    let issues = validator::field_ranges(&data, &rules);
    assert_eq!(issues.is_empty(), accepted, "{issues:?}");
}

#[test]
fn field_mappings_rename_and_pass_through() {
    let source = record(json!({"a": 1, "b": 2, "c": 3}));
    let mapping = [
        ("alpha".to_string(), "a".to_string()),
        ("alpha_copy".to_string(), "a".to_string()),
        ("ghost".to_string(), "missing".to_string()),
    ]
    .into_iter()
    .collect();

    let mapped = apply_field_mappings(&source, &mapping);
    assert_eq!(
        Value::Object(mapped),
        json!({"alpha": 1, "alpha_copy": 1, "b": 2, "c": 3})
    );
}

#[test]
fn empty_mapping_returns_equal_record() {
    let source = record(json!({"x": [1, 2], "y": {"z": null}}));
    assert_eq!(apply_field_mappings(&source, &Default::default()), source);
}

#[test]
fn test_parsing_config_reports_success_and_failure() {
    let parser = parser();
    let sample = json!({"repo": {"name": "demo"}});

    let ok = parser.test_parsing_config(&sample, &json!({"jsonpath_rules": {"project": "repo.name"}}));
    assert!(ok.success);
    assert_eq!(ok.parsed_data, Some(json!({"project": "demo"})));
    assert_eq!(ok.original_data, sample);

    let failed = parser.test_parsing_config(
        &sample,
        &json!({"validation_rules": {"required_fields": ["owner"]}}),
    );
    assert!(!failed.success);
    assert_eq!(failed.error_code.as_deref(), Some("VALIDATION_FAILED"));
    assert!(failed.message.contains("missing field owner"));
    assert_eq!(failed.parsed_data, None);

    let malformed = parser.test_parsing_config(&sample, &json!({"field_mappings": "nope"}));
    assert!(!malformed.success);
    assert_eq!(malformed.error_code.as_deref(), Some("INVALID_CONFIG"));
}

#[test]
fn validate_config_collects_errors_and_warnings() {
    let parser = parser();

    let report = parser.validate_config(&json!({
        "extraction_rules": {"a": "$.a[", "b": 5},
        "validation_rules": {"field_patterns": {"a": "(unclosed"}, "field_types": "int"},
        "transform_rules": {"field_types": {"a": "decimal"}}
    }));
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 5, "{:?}", report.errors);
    assert!(report.warnings.is_empty());

    let empty = parser.validate_config(&json!({}));
    assert!(empty.valid);
    assert_eq!(empty.warnings.len(), 1);
}

#[test]
fn valid_config_never_fails_with_configuration_error() {
    let parser = parser();
    let raw = json!({
        "extraction_rules": {"id": "$.items[?(@.active == true)].id", "n": "$.count"},
        "validation_rules": {"field_patterns": {"id": "^[a-z]"}},
        "transform_rules": {"field_types": {"n": "float"}}
    });
    assert!(parser.validate_config(&raw).valid);

    for payload in [json!({}), json!({"count": 3, "items": [{"active": true, "id": "x1"}]})] {
        let outcome = parser.test_parsing_config(&payload, &raw);
        assert_ne!(outcome.error_code.as_deref(), Some("INVALID_CONFIG"));
        assert_ne!(outcome.error_code.as_deref(), Some("EXTRACTION_FAILED"));
    }

    let both_keys = json!({
        "extraction_rules": {"a": "$.a"},
        "jsonpath_rules": {"b": "$.b"}
    });
    assert!(!parser.validate_config(&both_keys).valid);
    assert_eq!(
        parser.test_parsing_config(&json!({}), &both_keys).error_code.as_deref(),
        Some("INVALID_CONFIG")
    );
}

#[test]
fn compiled_expressions_are_cached_per_parser() {
    let cache = Arc::new(PathCache::new());
    let parser = WebhookDataParser::new(Arc::clone(&cache));
    let rules = config(json!({"extraction_rules": {"a": "$.a", "b": "$.b", "again": "$.a"}}));

    parser.parse(&json!({"a": 1}), &rules).expect("parse");
    parser.parse(&json!({"b": 2}), &rules).expect("parse");

    assert_eq!(cache.len(), 2);
    assert!(self::parser().extractor().cache().is_empty());
}
