use changeprop_core::EventMeta;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Emitted onto the per-rule retry topic. `meta.topic` is always
/// `change-prop.retry.<rule_name>`; `triggered_by` is comma-joined onto the
/// parent's chain on nested retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryEnvelope {
    pub meta: EventMeta,
    pub triggered_by: String,
    pub emitter_id: String,
    pub retries_left: u32,
    pub original_event: Value,
}

/// Emitted onto `change-prop.error`, at most once per event per terminal
/// failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub meta: EventMeta,
    pub triggered_by: String,
    pub emitter_id: String,
    pub rule_name: String,
    pub reason: String,
    pub status: Option<u16>,
    pub original_event: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonschema::JSONSchema;
    use serde_json::json;
    use std::fs;

    fn compiled_schema(path: &str) -> JSONSchema {
        let manifest_dir = env!("CARGO_MANIFEST_DIR");
        let schema_path = format!("{manifest_dir}/../../schemas/{path}");
        let raw = fs::read_to_string(&schema_path).expect("schema file present");
        let schema: Value = serde_json::from_str(&raw).expect("valid json schema");
        JSONSchema::compile(&schema).expect("compiles")
    }

    #[test]
    fn retry_envelope_validates_against_schema() {
        let schema = compiled_schema("retry.schema.json");
        let envelope = RetryEnvelope {
            meta: EventMeta {
                uri: "/sample/uri".into(),
                request_id: "req-1".into(),
                topic: "change-prop.retry.simple_test_rule".into(),
                domain: Some("en.wikipedia.org".into()),
            },
            triggered_by: "simple_test_rule:/sample/uri".into(),
            emitter_id: "change-prop-1".into(),
            retries_left: 1,
            original_event: json!({"message": "test"}),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(schema.is_valid(&value));
    }

    #[test]
    fn error_envelope_validates_against_schema() {
        let schema = compiled_schema("error.schema.json");
        let envelope = ErrorEnvelope {
            meta: EventMeta {
                uri: "/sample/uri".into(),
                request_id: "req-1".into(),
                topic: "change-prop.error".into(),
                domain: None,
            },
            triggered_by: "simple_test_rule:/sample/uri".into(),
            emitter_id: "change-prop-1".into(),
            rule_name: "simple_test_rule".into(),
            reason: "retry exhausted".into(),
            status: Some(500),
            original_event: json!({"message": "test"}),
        };
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(schema.is_valid(&value));
    }
}
