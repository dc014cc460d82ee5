use std::collections::HashMap;

use changeprop_core::get_path;
use serde::Deserialize;
use serde_json::Value;

/// A request recipe rendered at dispatch time. `decode_results` mirrors
/// the rule-level default unless the exec entry overrides it.
#[derive(Debug, Clone)]
pub struct RenderedRequest {
    pub method: String,
    pub uri: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
    pub follow_redirect: bool,
    pub retries: u32,
    pub decode_results: bool,
}

/// The engine does not implement templating itself: it takes a
/// collaborator that, given the merged event+bindings tree, renders a
/// request. `JsonTemplate` below is the one concrete implementation this
/// repo ships.
pub trait Template: Send + Sync {
    fn render(&self, expanded: &Value) -> RenderedRequest;
}

/// Declarative shape of one `exec` entry in a rule config document.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecSpec {
    #[serde(default = "default_method")]
    pub method: String,
    pub uri: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// A minimal `{{binding.path}}` substitution template, not a general
/// templating engine. Interpolation happens against the tree produced by
/// [`changeprop_core::Bindings::expand`] (event fields plus a `bindings`
/// sub-object).
pub struct JsonTemplate {
    spec: ExecSpec,
    decode_results: bool,
}

impl JsonTemplate {
    pub fn new(spec: ExecSpec, decode_results: bool) -> Self {
        JsonTemplate {
            spec,
            decode_results,
        }
    }
}

impl Template for JsonTemplate {
    fn render(&self, expanded: &Value) -> RenderedRequest {
        let headers = self
            .spec
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), interpolate_str(v, expanded)))
            .collect();
        let body = self.spec.body.as_ref().map(|b| interpolate_value(b, expanded));
        RenderedRequest {
            method: self.spec.method.clone(),
            uri: interpolate_str(&self.spec.uri, expanded),
            headers,
            body,
            follow_redirect: false,
            retries: 0,
            decode_results: self.decode_results,
        }
    }
}

fn interpolate_value(value: &Value, ctx: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(s, ctx)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate_value(v, ctx)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|v| interpolate_value(v, ctx)).collect()),
        other => other.clone(),
    }
}

fn interpolate_str(template: &str, ctx: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                if let Some(value) = get_path(ctx, path) {
                    out.push_str(&scalar_to_string(value));
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interpolates_bindings_and_event_fields() {
        let spec = ExecSpec {
            method: "POST".to_string(),
            uri: "http://mock.com/{{bindings.page}}".to_string(),
            headers: HashMap::new(),
            body: Some(json!({
                "test_field_name": "test_field_value",
                "derived_field": "{{bindings.message}}"
            })),
        };
        let template = JsonTemplate::new(spec, false);
        let expanded = json!({
            "meta": {"uri": "/sample/uri"},
            "bindings": {"page": "Foo", "message": "test"}
        });
        let rendered = template.render(&expanded);
        assert_eq!(rendered.uri, "http://mock.com/Foo");
        assert_eq!(rendered.body.unwrap()["derived_field"], json!("test"));
    }

    #[test]
    fn unresolved_placeholder_renders_empty() {
        let spec = ExecSpec {
            method: "GET".to_string(),
            uri: "http://mock.com/{{bindings.missing}}".to_string(),
            headers: HashMap::new(),
            body: None,
        };
        let template = JsonTemplate::new(spec, false);
        let rendered = template.render(&json!({"bindings": {}}));
        assert_eq!(rendered.uri, "http://mock.com/");
    }
}
