use serde_json::{Map, Value};

use crate::ast::MatchNode;
use crate::predicate::test;

/// Produces the binding tree for a match node already known to have
/// matched `target`. Mirrors the match tree: literal scalars retain their
/// value, regex nodes contribute their captures.
///
/// Returns `None` for nodes that never produce a binding (`Absent`), so
/// callers can skip inserting that field.
pub fn bind(node: &MatchNode, target: Option<&Value>) -> Option<Value> {
    match node {
        MatchNode::Object(fields) => {
            let map = target.and_then(Value::as_object);
            let mut out = Map::new();
            for (key, child) in fields {
                if let Some(bound) = bind(child, map.and_then(|m| m.get(key))) {
                    out.insert(key.clone(), bound);
                }
            }
            Some(Value::Object(out))
        }
        MatchNode::Array(patterns) => {
            let items = target.and_then(Value::as_array)?;
            let mut out = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matched_element = items.iter().find(|item| test(pattern, Some(item)));
                if let Some(bound) = bind(pattern, matched_element) {
                    out.push(bound);
                }
            }
            Some(Value::Array(out))
        }
        MatchNode::Regex {
            regex,
            capture_names,
        } => {
            let s = target.and_then(Value::as_str)?;
            let captures = regex.captures(s)?;
            if capture_names.is_empty() {
                Some(Value::String(s.to_string()))
            } else {
                let mut out = Map::new();
                for name in capture_names {
                    if let Some(m) = captures.name(name) {
                        out.insert(name.clone(), Value::String(m.as_str().to_string()));
                    }
                }
                Some(Value::Object(out))
            }
        }
        MatchNode::Literal(value) => Some(value.clone()),
        MatchNode::Absent => None,
    }
}

/// Top-level entry point: the root of a rule's `match` tree is always an
/// object keyed by event field names, so the binding is returned as a map
/// ready to merge into [`changeprop_core::Bindings`].
pub fn bind_root(node: &MatchNode, target: &Value) -> Map<String, Value> {
    match bind(node, Some(target)) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use serde_json::json;

    #[test]
    fn binds_literal_and_capture_fields() {
        let node = compile(&json!({
            "uri": "/^/(?<db>[^/]+)/(?<page>.+)$/",
            "type": "edit"
        }))
        .unwrap();
        let target = json!({"uri": "/enwiki/Some_Page", "type": "edit"});
        let bound = bind_root(&node, &target);
        assert_eq!(bound["type"], json!("edit"));
        assert_eq!(bound["uri"]["db"], json!("enwiki"));
        assert_eq!(bound["uri"]["page"], json!("Some_Page"));
    }

    #[test]
    fn absent_fields_are_not_bound() {
        let node = compile(&json!({"extra": "undefined"})).unwrap();
        let bound = bind_root(&node, &json!({}));
        assert!(!bound.contains_key("extra"));
    }
}
