use serde_json::Value;

/// Looks up a dotted field path (`"meta.uri"`) against a JSON value.
///
/// Returns `None` for any absent segment rather than erroring. Match-tree
/// evaluation over schemaless events stays total: a missing nested field
/// is a non-match, never a crash.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_path() {
        let v = json!({"meta": {"uri": "/a/b"}});
        assert_eq!(get_path(&v, "meta.uri"), Some(&json!("/a/b")));
    }

    #[test]
    fn missing_segment_is_none() {
        let v = json!({"meta": {}});
        assert_eq!(get_path(&v, "meta.uri"), None);
        assert_eq!(get_path(&v, "payload.uri"), None);
    }

    #[test]
    fn non_object_intermediate_is_none() {
        let v = json!({"meta": "not-an-object"});
        assert_eq!(get_path(&v, "meta.uri"), None);
    }
}
