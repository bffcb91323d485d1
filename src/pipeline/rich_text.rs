//! Plain text out of workspace rich-text field values.

use serde_json::{Map, Value};

pub fn extract_plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) if text.is_empty() => String::new(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(document)) => text_from_document(&document),
            _ => text.clone(),
        },
        Value::Object(fields) => {
            if let Some(doc) = fields.get("doc") {
                match doc {
                    Value::String(raw) => match serde_json::from_str::<Value>(raw) {
                        Ok(Value::Object(document)) => text_from_document(&document),
                        _ => raw.clone(),
                    },
                    Value::Object(document) => text_from_document(document),
                    other => other.to_string(),
                }
            } else if let Some(doc_text) = fields.get("doc_text") {
                match doc_text {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                }
            } else if fields.contains_key("ops") {
                text_from_document(fields)
            } else {
                value.to_string()
            }
        }
        other => other.to_string(),
    }
}

fn text_from_document(document: &Map<String, Value>) -> String {
    let mut parts = Vec::new();
    match document.get("ops") {
        Some(ops) => collect_inserts(ops, &mut parts),
        None => document
            .values()
            .for_each(|value| collect_inserts(value, &mut parts)),
    }
    collapse_blank_lines(parts.concat().trim())
}

/// Walks Delta ops; image inserts carry no text.
fn collect_inserts<'a>(value: &'a Value, parts: &mut Vec<&'a str>) {
    match value {
        Value::Object(fields) => {
            if let Some(Value::String(insert)) = fields.get("insert") {
                if !is_image_op(fields) {
                    parts.push(insert);
                }
            }
            for nested in fields.values() {
                if nested.is_object() || nested.is_array() {
                    collect_inserts(nested, parts);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_inserts(item, parts)),
        _ => {}
    }
}

/// `attributes.image` marks an image only when it is `"true"` (or JSON `true`).
fn is_image_op(fields: &Map<String, Value>) -> bool {
    match fields
        .get("attributes")
        .and_then(|attributes| attributes.get("image"))
    {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text == "true",
        _ => false,
    }
}

const IMAGE_KEYWORDS: [&str; 4] = ["image", "img", "图片", "图像"];

/// Whether a rich-text field value contains at least one image.
///
/// Plain (non-JSON) strings fall back to a keyword scan. Structured values
/// are searched through `doc.ops` only.
pub fn has_images(value: &Value) -> bool {
    match value {
        Value::String(text) if text.trim().is_empty() => false,
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(parsed) => document_has_images(&parsed),
            Err(_) => {
                let lowered = text.to_lowercase();
                IMAGE_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
            }
        },
        other => document_has_images(other),
    }
}

fn document_has_images(value: &Value) -> bool {
    let Some(doc) = value.get("doc") else {
        return false;
    };
    let parsed;
    let doc = match doc {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                parsed = value;
                &parsed
            }
            Err(_) => return false,
        },
        other => other,
    };
    doc.get("ops").is_some_and(ops_have_images)
}

fn ops_have_images(value: &Value) -> bool {
    match value {
        Value::Object(fields) => {
            is_image_op(fields)
                || fields
                    .values()
                    .filter(|nested| nested.is_object() || nested.is_array())
                    .any(ops_have_images)
        }
        Value::Array(items) => items.iter().any(ops_have_images),
        _ => false,
    }
}

fn collapse_blank_lines(text: &str) -> String {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn delta_ops_skip_images() {
        let value = json!({
            "doc": {
                "ops": [
                    {"insert": "Title\n\n\n"},
                    {"insert": "img", "attributes": {"image": true}},
                    {"insert": "Body"}
                ]
            }
        });
        assert_eq!(extract_plain_text(&value), "Title\nBody");
    }

    #[test]
    fn json_string_documents_are_parsed() {
        let raw = json!(r#"{"ops":[{"insert":"hello "},{"insert":"world"}]}"#);
        assert_eq!(extract_plain_text(&raw), "hello world");
        assert_eq!(extract_plain_text(&json!("not json")), "not json");
    }

    #[test]
    fn image_marker_must_say_true() {
        let value = json!({"doc": {"ops": [
            {"insert": "kept", "attributes": {"image": "false"}},
            {"insert": " also kept", "attributes": {"image": "0"}},
            {"insert": "dropped", "attributes": {"image": "true"}}
        ]}});
        assert_eq!(extract_plain_text(&value), "kept also kept");
        assert!(has_images(&value));
        assert!(!has_images(&json!({"doc": {"ops": [
            {"insert": "x", "attributes": {"image": "false"}}
        ]}})));
    }

    #[test]
    fn image_search_covers_string_documents_and_nesting() {
        let doc = r#"{"ops":[{"insert":{"gallery":[{"attributes":{"image":"true"}}]}}]}"#;
        assert!(has_images(&json!({ "doc": doc })));
        assert!(has_images(&json!(format!("{{\"doc\": {}}}", doc))));
        assert!(!has_images(&json!({"doc": "{broken"})));
        assert!(!has_images(&json!({"doc_text": "image"})));
    }

    #[test]
    fn plain_strings_use_keyword_scan() {
        assert!(has_images(&json!("see attached IMG_0042")));
        assert!(has_images(&json!("见图片")));
        assert!(!has_images(&json!("text only")));
        assert!(!has_images(&json!("")));
        assert!(!has_images(&Value::Null));
    }

    #[test]
    fn doc_text_is_returned_verbatim() {
        assert_eq!(extract_plain_text(&json!({"doc_text": "plain"})), "plain");
    }
}
