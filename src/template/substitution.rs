//! Variable substitution engine for templates

use super::types::{TemplateError, TemplateResult};

/// Substitute {{variable}} placeholders in a JSON value
pub fn substitute_variables(
    template: &serde_json::Value,
    variables: &serde_json::Value,
) -> TemplateResult<serde_json::Value> {
    let vars = match variables {
        serde_json::Value::Object(map) => map,
        _ => {
            return Err(TemplateError::SubstitutionFailed(
                "Variables must be an object".to_string(),
            ))
        }
    };

    Ok(substitute_value(template, vars))
}

fn substitute_value(
    value: &serde_json::Value,
    variables: &serde_json::Map<String, serde_json::Value>,
) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => serde_json::Value::String(render_str(s, variables)),
        serde_json::Value::Array(arr) => serde_json::Value::Array(
            arr.iter().map(|v| substitute_value(v, variables)).collect(),
        ),
        serde_json::Value::Object(obj) => {
            let mut rendered = serde_json::Map::new();
            for (key, val) in obj {
                rendered.insert(key.clone(), substitute_value(val, variables));
            }
            serde_json::Value::Object(rendered)
        }
        // Numbers, booleans, null are passed through as-is
        _ => value.clone(),
    }
}

/// Replace `{{key}}` for every non-null variable in a single left-to-right scan.
///
/// Substituted values are never scanned again, so a value that itself looks
/// like a placeholder stays literal. Placeholders without a value are left
/// untouched; templates handle absent optional fields in their own
/// conditional sections.
pub fn render_str(
    template: &str,
    variables: &serde_json::Map<String, serde_json::Value>,
) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        result.push_str(&rest[..start]);
        let inner = &rest[start + 2..];

        let replacement = inner
            .find("}}")
            .and_then(|end| Some((end, variable_text(variables.get(&inner[..end])?)?)));

        match replacement {
            Some((end, text)) => {
                result.push_str(&text);
                rest = &inner[end + 2..];
            }
            None => {
                // Keep one brace and rescan, so `{{{{key}}` still finds `{{key}}`
                result.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    result.push_str(rest);
    result
}

fn variable_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        // For arrays and objects, use JSON representation
        _ => Some(value.to_string()),
    }
}
