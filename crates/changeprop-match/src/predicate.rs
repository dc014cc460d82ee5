use serde_json::Value;

use crate::ast::MatchNode;
use crate::canonical::canonical_string;

/// Evaluates a compiled match tree against a target value. Pure and total:
/// a missing nested field yields `false`, never a panic.
pub fn test(node: &MatchNode, target: Option<&Value>) -> bool {
    match node {
        MatchNode::Object(fields) => match target {
            Some(Value::Object(map)) => fields
                .iter()
                .all(|(key, child)| test(child, map.get(key))),
            _ => false,
        },
        MatchNode::Array(patterns) => match target {
            Some(Value::Array(items)) => patterns
                .iter()
                .all(|pattern| items.iter().any(|item| test(pattern, Some(item)))),
            _ => false,
        },
        MatchNode::Regex { regex, .. } => match target {
            Some(Value::String(s)) => regex.is_match(s),
            _ => false,
        },
        MatchNode::Literal(expected) => match target {
            Some(actual) => canonical_string(actual) == canonical_string(expected),
            None => false,
        },
        MatchNode::Absent => target.is_none(),
    }
}
