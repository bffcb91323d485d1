use serde_json::Value;

use crate::core::types::Record;

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Replaces `{{name}}` placeholders. Unknown names are left as written.
pub fn render_template(template: &str, variables: &Record) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find('}') {
            Some(close) if close > 0 && after[close..].starts_with("}}") => {
                let name = &after[..close];
                match variables.get(name.trim()) {
                    Some(value) => rendered.push_str(&render_value(value)),
                    None => {
                        rendered.push_str("{{");
                        rendered.push_str(name);
                        rendered.push_str("}}");
                    }
                }
                rest = &after[close + 2..];
            }
            _ => {
                rendered.push_str("{{");
                rest = after;
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

/// Single-brace `{name}` variant used for per-field prompts.
pub fn render_field_placeholders(template: &str, fields: &Record) -> String {
    fields.iter().fold(template.to_string(), |text, (name, value)| {
        text.replace(&format!("{{{name}}}"), &render_value(value))
    })
}

pub fn analysis_prompt(rendered: &str) -> String {
    let mut text = String::new();
    text.push_str("You are an analyst working on data delivered by a webhook.\n");
    text.push_str("Answer in markdown. Headings, **bold**, *italic*, ~~strikethrough~~ and pipe tables are supported.\n");
    text.push_str("Do not nest inline styles.\n\n");
    text.push_str("TASK:\n");
    text.push_str(rendered.trim());
    text.push_str("\n\nOutput format:\n");
    text.push_str("{\"answer_markdown\":\"...\"}\n");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn double_brace_placeholders_render_values() {
        let variables = vars(json!({"name": "demo", "count": 3, "gone": null}));
        assert_eq!(
            render_template("{{ name }} has {{count}} items{{gone}}; {{missing}}", &variables),
            "demo has 3 items; {{missing}}"
        );
    }

    #[test]
    fn unterminated_placeholder_is_kept() {
        let variables = vars(json!({"a": 1}));
        assert_eq!(render_template("x {{a", &variables), "x {{a");
        assert_eq!(render_template("{{}}", &variables), "{{}}");
    }

    #[test]
    fn single_brace_fields_render() {
        let fields = vars(json!({"title": "Bug", "owner": null}));
        assert_eq!(
            render_field_placeholders("{title} by {owner} {other}", &fields),
            "Bug by  {other}"
        );
    }
}
