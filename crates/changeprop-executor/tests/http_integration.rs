//! A simple-match dispatch driven against a real HTTP server (`wiremock`)
//! rather than the in-process `ScriptedHttpClient` fake used by
//! `executor.rs`'s unit tests. Exercises the full `ReqwestHttpClient`
//! request construction (method, headers, JSON body) over the wire.

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use changeprop_bus::{BusError, Producer};
use changeprop_core::{Event, EventMeta};
use changeprop_executor::{Executor, ExecutorConfig, ReqwestHttpClient};
use changeprop_rules::{RuleRegistry, RuleSpec};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct RecordingProducer {
    produced: Mutex<Vec<(String, String, Value)>>,
}

#[async_trait]
impl Producer for RecordingProducer {
    async fn produce(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError> {
        let value: Value = serde_json::from_slice(payload).unwrap();
        self.produced
            .lock()
            .unwrap()
            .push((topic.to_string(), key.to_string(), value));
        Ok(())
    }
}

#[tokio::test]
async fn simple_dispatch_renders_a_real_http_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .and(header("x-request-id", "req-wiremock-1"))
        .and(body_json(json!({
            "test_field_name": "test_field_value",
            "derived_field": "test",
        })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let rule_yaml = format!(
        r#"
topic: simple_test_rule
match:
  message: test
exec:
  - method: POST
    uri: "{}/webhook"
    body:
      test_field_name: test_field_value
      derived_field: "{{{{bindings.message}}}}"
"#,
        server.uri()
    );
    let spec: RuleSpec = serde_yaml::from_str(&rule_yaml).unwrap();
    let registry = Arc::new(RuleRegistry::from_specs(vec![("simple_test_rule".to_string(), spec)]).unwrap());

    let http = Arc::new(ReqwestHttpClient::new(Duration::from_secs(5)).unwrap());
    let recording_producer = Arc::new(RecordingProducer::default());
    let producer: Arc<dyn Producer> = recording_producer.clone();
    let executor = Executor::new(
        registry,
        http,
        producer,
        ExecutorConfig {
            emitter_id: "change-prop-it".to_string(),
            user_agent: "changeprop/it".to_string(),
            produce_dc: "test_dc".to_string(),
        },
    );

    let event = Event {
        meta: EventMeta {
            uri: "/sample/uri".to_string(),
            request_id: "req-wiremock-1".to_string(),
            topic: "simple_test_rule".to_string(),
            domain: None,
        },
        payload: json!({"message": "test"}),
    };
    executor.dispatch("simple_test_rule", &event).await;

    // A 200 from the real server means no retry or error envelope was
    // produced. The wiremock matcher on method/path/header/body already
    // confirms the request itself was well-formed.
    assert!(recording_producer.produced.lock().unwrap().is_empty());
}
