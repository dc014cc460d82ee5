use regex::RegexBuilder;
use serde_json::Value;

use crate::ast::MatchNode;
use crate::error::MatchError;

/// Compiles a declarative match-tree pattern into a [`MatchNode`].
///
/// Compile-time errors: mixing named and unnamed capture groups in one
/// regex, or a regex pattern that fails to parse.
pub fn compile(pattern: &Value) -> Result<MatchNode, MatchError> {
    match pattern {
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, child) in map {
                entries.push((key.clone(), compile(child)?));
            }
            Ok(MatchNode::Object(entries))
        }
        Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for item in items {
                entries.push(compile(item)?);
            }
            Ok(MatchNode::Array(entries))
        }
        Value::String(s) => compile_string(s),
        other => Ok(MatchNode::Literal(other.clone())),
    }
}

fn compile_string(s: &str) -> Result<MatchNode, MatchError> {
    if s == "undefined" {
        return Ok(MatchNode::Absent);
    }
    if let Some((body, flags)) = parse_regex_literal(s) {
        return compile_regex(body, flags);
    }
    Ok(MatchNode::Literal(Value::String(s.to_string())))
}

/// Splits a `/body/flags` literal. Not a full regex-literal grammar: the
/// last `/` in the string is taken as the delimiter, matching how the
/// source config authors write these patterns (flags are always a short
/// trailing letter run).
fn parse_regex_literal(s: &str) -> Option<(&str, &str)> {
    if !s.starts_with('/') || s.len() < 2 {
        return None;
    }
    let rest = &s[1..];
    let last_slash = rest.rfind('/')?;
    let body = &rest[..last_slash];
    let flags = &rest[last_slash + 1..];
    if flags.chars().all(|c| "imsxug".contains(c)) {
        Some((body, flags))
    } else {
        None
    }
}

fn compile_regex(body: &str, flags: &str) -> Result<MatchNode, MatchError> {
    let regex = RegexBuilder::new(body)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|e| MatchError::InvalidMatch(format!("bad regex /{body}/{flags}: {e}")))?;

    let mut named = Vec::new();
    let mut unnamed_groups = 0usize;
    for (idx, name) in regex.capture_names().enumerate() {
        if idx == 0 {
            continue; // whole-match group
        }
        match name {
            Some(n) => named.push(n.to_string()),
            None => unnamed_groups += 1,
        }
    }
    if !named.is_empty() && unnamed_groups > 0 {
        return Err(MatchError::InvalidMatch(format!(
            "regex /{body}/{flags} mixes named and unnamed capture groups"
        )));
    }

    Ok(MatchNode::Regex {
        regex,
        capture_names: named,
    })
}
