use regex::Regex;
use serde_json::Value;

use crate::canonical::canonical_string;
use crate::error::MatchError;

/// A compiled `retry_on` / `ignore` stanza. Applied once as `shouldRetry`
/// and once as `shouldIgnoreError`, both built with the same [`compile`]
/// function.
#[derive(Debug, Clone)]
pub struct RetryCondition {
    fields: Vec<(String, FieldMatcher)>,
}

#[derive(Debug, Clone)]
enum FieldMatcher {
    StatusExact(u64),
    StatusPattern(Regex),
    Structural(Value),
    AnyOf(Vec<FieldMatcher>),
}

impl RetryCondition {
    /// `classify(result)`: AND across fields, OR within one field's array
    /// of options.
    pub fn classify(&self, result: &Value) -> bool {
        self.fields
            .iter()
            .all(|(name, matcher)| field_matches(matcher, result.get(name)))
    }
}

fn field_matches(matcher: &FieldMatcher, actual: Option<&Value>) -> bool {
    match matcher {
        FieldMatcher::StatusExact(expected) => {
            actual.and_then(Value::as_u64) == Some(*expected)
        }
        FieldMatcher::StatusPattern(re) => actual
            .and_then(Value::as_u64)
            .map(|n| re.is_match(&n.to_string()))
            .unwrap_or(false),
        FieldMatcher::Structural(expected) => actual
            .map(|a| canonical_string(a) == canonical_string(expected))
            .unwrap_or(false),
        FieldMatcher::AnyOf(options) => options.iter().any(|m| field_matches(m, actual)),
    }
}

/// Compiles a stanza mapping field name to scalar / array-of-scalar /
/// structured sub-pattern.
pub fn compile(spec: &Value) -> Result<RetryCondition, MatchError> {
    let map = spec
        .as_object()
        .ok_or_else(|| MatchError::InvalidRetryCondition("stanza must be an object".into()))?;

    let mut fields = Vec::with_capacity(map.len());
    for (field, pattern) in map {
        fields.push((field.clone(), compile_field(field, pattern)?));
    }
    Ok(RetryCondition { fields })
}

fn compile_field(field: &str, pattern: &Value) -> Result<FieldMatcher, MatchError> {
    match pattern {
        Value::Array(options) => {
            let compiled = options
                .iter()
                .map(|opt| compile_single(field, opt))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FieldMatcher::AnyOf(compiled))
        }
        other => compile_single(field, other),
    }
}

fn compile_single(field: &str, pattern: &Value) -> Result<FieldMatcher, MatchError> {
    if field == "status" {
        return compile_status(pattern);
    }
    Ok(FieldMatcher::Structural(pattern.clone()))
}

/// `status` semantics: a numeric literal matches exactly; a string pattern
/// containing `x` wildcards any digit in that place. `"50x"` compiles to
/// `^5\d\d$`, i.e. 500-509, not the broader conventional `5xx` meaning.
fn compile_status(pattern: &Value) -> Result<FieldMatcher, MatchError> {
    match pattern {
        Value::Number(n) => {
            let exact = n.as_u64().ok_or_else(|| {
                MatchError::InvalidRetryCondition(format!("status must be a non-negative integer, got {n}"))
            })?;
            Ok(FieldMatcher::StatusExact(exact))
        }
        Value::String(s) => {
            if !s.chars().all(|c| c.is_ascii_digit() || c == 'x' || c == 'X') || s.is_empty() {
                return Err(MatchError::InvalidRetryCondition(format!(
                    "invalid status pattern: {s}"
                )));
            }
            let regex_src: String = s
                .chars()
                .map(|c| if c == 'x' || c == 'X' { r"\d".to_string() } else { c.to_string() })
                .collect();
            let regex = Regex::new(&format!("^{regex_src}$")).map_err(|e| {
                MatchError::InvalidRetryCondition(format!("invalid status pattern {s}: {e}"))
            })?;
            Ok(FieldMatcher::StatusPattern(regex))
        }
        other => Err(MatchError::InvalidRetryCondition(format!(
            "status pattern must be a number or string, got {other}"
        ))),
    }
}

/// Default `retry_on` stanza: `{status: ["50x"]}`.
pub fn default_retry_on() -> Value {
    serde_json::json!({"status": ["50x"]})
}

/// Default `ignore` stanza: `{status: [412]}`.
pub fn default_ignore() -> Value {
    serde_json::json!({"status": [412]})
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_wildcard_matches_500_to_509_only() {
        let cond = compile(&json!({"status": ["50x"]})).unwrap();
        assert!(cond.classify(&json!({"status": 500})));
        assert!(cond.classify(&json!({"status": 509})));
        assert!(!cond.classify(&json!({"status": 510})));
        assert!(!cond.classify(&json!({"status": 599})));
    }

    #[test]
    fn exact_status_match() {
        let cond = compile(&json!({"status": 412})).unwrap();
        assert!(cond.classify(&json!({"status": 412})));
        assert!(!cond.classify(&json!({"status": 404})));
    }

    #[test]
    fn fields_combine_with_and_array_with_or() {
        let cond = compile(&json!({"status": [404, 410], "body": {"type": "not_found"}})).unwrap();
        assert!(cond.classify(&json!({"status": 404, "body": {"type": "not_found"}})));
        assert!(!cond.classify(&json!({"status": 404, "body": {"type": "other"}})));
        assert!(!cond.classify(&json!({"status": 500, "body": {"type": "not_found"}})));
    }

    #[test]
    fn rejects_invalid_status_pattern() {
        assert!(compile(&json!({"status": "abc"})).is_err());
    }
}
