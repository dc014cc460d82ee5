use serde_json::Value;

/// Canonical, key-ordered JSON stringification used for structural equality.
/// `serde_json::Map` is BTreeMap-backed by default (this workspace never
/// enables the `preserve_order` feature), so `to_string` already yields a
/// deterministic, key-sorted rendering.
pub fn canonical_string(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
