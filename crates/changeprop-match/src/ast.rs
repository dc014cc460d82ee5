use regex::Regex;
use serde_json::Value;

/// A compiled match-tree node. Mirrors the declarative JSON pattern
/// one-for-one and is interpreted directly rather than codegen'd into
/// closures: rules compile once at start-up and evaluate once per event, so
/// clarity wins over micro-optimization.
#[derive(Debug, Clone)]
pub enum MatchNode {
    /// AND over child fields, addressed by key.
    Object(Vec<(String, MatchNode)>),
    /// Existence quantifier: every pattern element must find some matching
    /// target element, in declaration order. No positional correspondence.
    Array(Vec<MatchNode>),
    /// `/.../flags`, an anchored-as-written regex test. `capture_names` is
    /// non-empty only when the pattern uses named capture groups.
    Regex {
        regex: Regex,
        capture_names: Vec<String>,
    },
    /// Any non-regex scalar: strict equality via canonical stringification.
    Literal(Value),
    /// The sentinel `"undefined"`: field must be absent. Produces no
    /// binding.
    Absent,
}
