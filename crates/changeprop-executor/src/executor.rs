use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use changeprop_bus::{EventHandler, Producer};
use changeprop_core::Event;
use changeprop_rules::{error_topic, Rule, RuleRegistry};
use futures::future::join_all;
use serde_json::{json, Value};

use crate::envelope::{ErrorEnvelope, RetryEnvelope};
use crate::http_client::HttpClient;

/// Loop prevention bound beyond plain chain-membership.
const MAX_TRIGGER_CHAIN: usize = 32;

pub struct ExecutorConfig {
    pub emitter_id: String,
    pub user_agent: String,
    pub produce_dc: String,
}

/// The per-event state machine: evaluates rules for one event, drives
/// HTTP exec steps, and schedules retries/errors onto the bus.
pub struct Executor<C: HttpClient> {
    registry: Arc<RuleRegistry>,
    http: Arc<C>,
    producer: Arc<dyn Producer>,
    config: ExecutorConfig,
}

impl<C: HttpClient> Executor<C> {
    pub fn new(
        registry: Arc<RuleRegistry>,
        http: Arc<C>,
        producer: Arc<dyn Producer>,
        config: ExecutorConfig,
    ) -> Self {
        Executor {
            registry,
            http,
            producer,
            config,
        }
    }

    /// Entry point for a fresh source-topic event: evaluates every rule
    /// bound to `topic`. Rules run concurrently but all must terminate
    /// before the caller commits the offset.
    pub async fn dispatch(&self, topic: &str, event: &Event) {
        if let Some(retry) = decode_retry_reentry(event) {
            self.reenter_from_retry(retry).await;
            return;
        }

        let event_value = event.as_value();
        let parent_chain = inherited_chain(&event_value);
        let rules = self.registry.rules_for_topic(topic);
        let futures = rules.iter().map(|rule| {
            self.run_rule(
                rule,
                &event_value,
                rule.retry_limit,
                &parent_chain,
                &event.meta.request_id,
                false,
            )
        });
        join_all(futures).await;
    }

    async fn reenter_from_retry(&self, retry: RetryReentry) {
        let Some(rule) = self.registry.find_by_name(&retry.rule_name) else {
            tracing::warn!(rule = %retry.rule_name, "retry envelope references unknown rule");
            return;
        };
        self.run_rule(
            rule,
            &retry.original_event,
            retry.retries_left,
            &retry.triggered_by,
            &retry.request_id,
            true,
        )
        .await;
    }

    /// `is_retry` distinguishes a retry-topic re-entry (continuing a rule
    /// already selected to run for this event) from a fresh topic dispatch
    /// (a rule being invoked for the first time, possibly via a
    /// `produce_to_topic` fan-out from another rule). The chain-membership
    /// loop check only applies to the latter: a rule's own retries of
    /// itself are expected to repeat its `name:uri` token every hop and
    /// must not be mistaken for a cross-rule cycle. The hard length
    /// ceiling still applies either way.
    async fn run_rule(
        &self,
        rule: &Rule,
        event_value: &Value,
        retries_left: u32,
        parent_chain: &str,
        request_id: &str,
        is_retry: bool,
    ) {
        let Some(idx) = rule.test(event_value) else {
            return; // no matching option: silent skip
        };
        if rule.is_noop(idx) {
            metrics::counter!("changeprop_rule_noop_total", "rule" => rule.name.clone()).increment(1);
            return;
        }

        let event_uri = event_value
            .get("meta")
            .and_then(|m| m.get("uri"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        // A rule that fans out via `produce_to_topic` is identified in the
        // chain by `<produce_dc>.<rule_name>` (it crosses the bus), while
        // an HTTP-dispatching rule is identified by its bare name.
        let token = match &rule.produce_to_topic {
            Some(_) => format!("{}.{}:{}", self.config.produce_dc, rule.name, event_uri),
            None => format!("{}:{}", rule.name, event_uri),
        };

        let chain: Vec<&str> = if parent_chain.is_empty() {
            Vec::new()
        } else {
            parent_chain.split(',').collect()
        };
        if (!is_retry && chain.contains(&token.as_str())) || chain.len() >= MAX_TRIGGER_CHAIN {
            tracing::warn!(rule = %rule.name, uri = %event_uri, "loop detected, skipping rule");
            metrics::counter!("changeprop_loop_detected_total", "rule" => rule.name.clone()).increment(1);
            return;
        }
        let new_chain = if parent_chain.is_empty() {
            token
        } else {
            format!("{parent_chain},{token}")
        };

        if let Some(target) = &rule.produce_to_topic {
            self.produce_fanout(rule, target, event_value, &new_chain, request_id)
                .await;
            return;
        }

        let bindings = rule.expand(idx, event_value);
        let expanded = bindings.expand(event_value);

        for template in rule.get_exec(idx) {
            let mut rendered = template.render(&expanded);
            rendered
                .headers
                .entry("x-request-id".to_string())
                .or_insert_with(|| request_id.to_string());
            rendered
                .headers
                .insert("x-triggered-by".to_string(), new_chain.clone());
            rendered
                .headers
                .entry("user-agent".to_string())
                .or_insert_with(|| self.config.user_agent.clone());

            match self.http.execute(&rendered).await {
                Ok(result) => {
                    let result_value = json!({ "status": result.status, "body": body_as_value(&result.body) });
                    if (200..300).contains(&result.status) {
                        metrics::counter!("changeprop_exec_success_total", "rule" => rule.name.clone()).increment(1);
                        continue;
                    }
                    if rule.should_ignore(&result_value) {
                        metrics::counter!("changeprop_exec_ignored_total", "rule" => rule.name.clone()).increment(1);
                        continue;
                    }
                    if rule.should_retry(&result_value) && retries_left > 0 {
                        self.schedule_retry(rule, event_value, retries_left, &new_chain, request_id)
                            .await;
                        return;
                    }
                    let reason = if rule.should_retry(&result_value) {
                        "retry exhausted".to_string()
                    } else {
                        format!("non-retryable http status {}", result.status)
                    };
                    self.emit_error(rule, event_value, &new_chain, request_id, &reason, Some(result.status))
                        .await;
                    return;
                }
                Err(err) => {
                    tracing::error!(rule = %rule.name, error = %err, "http request failed");
                    if retries_left > 0 {
                        self.schedule_retry(rule, event_value, retries_left, &new_chain, request_id)
                            .await;
                    } else {
                        self.emit_error(rule, event_value, &new_chain, request_id, &err, None)
                            .await;
                    }
                    return;
                }
            }
        }
    }

    /// A `produce_to_topic` rule re-emits the original event onto
    /// `<produce_dc>.<target>` instead of issuing HTTP exec steps. The
    /// chain built so far is carried as a flattened `triggered_by` field
    /// so the consuming rule on the target topic can continue it rather
    /// than starting a fresh chain.
    async fn produce_fanout(
        &self,
        rule: &Rule,
        target: &str,
        event_value: &Value,
        chain: &str,
        request_id: &str,
    ) {
        let mut payload = event_value.clone();
        if let Value::Object(ref mut map) = payload {
            map.remove("meta");
            map.insert("triggered_by".to_string(), Value::String(chain.to_string()));
        }
        let envelope = json!({
            "meta": {
                "uri": uri_of(event_value),
                "request_id": request_id,
                "topic": target,
                "domain": domain_of(event_value),
            },
        });
        let Value::Object(mut envelope_map) = envelope else {
            unreachable!("object literal")
        };
        if let Value::Object(payload_map) = payload {
            envelope_map.extend(payload_map);
        }
        let full_topic = changeprop_bus::source_topic(&self.config.produce_dc, target);

        let Ok(bytes) = serde_json::to_vec(&Value::Object(envelope_map)) else {
            tracing::error!(rule = %rule.name, "failed to serialize fan-out event");
            return;
        };
        metrics::counter!("changeprop_exec_success_total", "rule" => rule.name.clone()).increment(1);
        if let Err(err) = self.producer.produce(&full_topic, request_id, &bytes).await {
            tracing::error!(error = %err, topic = %full_topic, "failed to produce fan-out event");
        }
    }

    async fn schedule_retry(
        &self,
        rule: &Rule,
        event_value: &Value,
        retries_left: u32,
        chain: &str,
        request_id: &str,
    ) {
        let next_retries_left = retries_left - 1;
        let attempt = rule.retry_limit.saturating_sub(retries_left);
        let delay_ms = retry_delay_ms(rule.retry_delay_ms, rule.retry_factor, attempt);

        let envelope = RetryEnvelope {
            meta: changeprop_core::EventMeta {
                uri: uri_of(event_value),
                request_id: request_id.to_string(),
                topic: rule.retry_topic(),
                domain: domain_of(event_value),
            },
            triggered_by: chain.to_string(),
            emitter_id: self.config.emitter_id.clone(),
            retries_left: next_retries_left,
            original_event: event_value.clone(),
        };
        metrics::counter!("changeprop_retry_scheduled_total", "rule" => rule.name.clone()).increment(1);

        let producer = self.producer.clone();
        let topic = rule.retry_topic();
        let key = request_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let Ok(payload) = serde_json::to_vec(&envelope) else {
                tracing::error!("failed to serialize retry envelope");
                return;
            };
            if let Err(err) = producer.produce(&topic, &key, &payload).await {
                tracing::error!(error = %err, topic = %topic, "failed to produce retry envelope");
            }
        });
    }

    async fn emit_error(
        &self,
        rule: &Rule,
        event_value: &Value,
        chain: &str,
        request_id: &str,
        reason: &str,
        status: Option<u16>,
    ) {
        let envelope = ErrorEnvelope {
            meta: changeprop_core::EventMeta {
                uri: uri_of(event_value),
                request_id: request_id.to_string(),
                topic: error_topic().to_string(),
                domain: domain_of(event_value),
            },
            triggered_by: chain.to_string(),
            emitter_id: self.config.emitter_id.clone(),
            rule_name: rule.name.clone(),
            reason: reason.to_string(),
            status,
            original_event: event_value.clone(),
        };
        metrics::counter!("changeprop_error_total", "rule" => rule.name.clone()).increment(1);

        let Ok(payload) = serde_json::to_vec(&envelope) else {
            tracing::error!("failed to serialize error envelope");
            return;
        };
        if let Err(err) = self
            .producer
            .produce(error_topic(), request_id, &payload)
            .await
        {
            tracing::error!(error = %err, "failed to produce error envelope");
        }
    }
}

/// A freshly consumed source event that was itself produced by a
/// `produce_to_topic` rule carries the chain forward as a flattened
/// `triggered_by` payload field. A genuinely fresh event has none, so
/// the chain starts empty.
fn inherited_chain(event_value: &Value) -> String {
    event_value
        .get("triggered_by")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// The geometric retry-backoff series: delay before resubmission is
/// `retry_delay * retry_factor^(retry_limit - retries_left)` ms, expressed
/// here as `base * factor^attempt` with `attempt` counted up from zero so
/// it can be proptest-checked in isolation from the async scheduling
/// machinery.
fn retry_delay_ms(base: u64, factor: u32, attempt: u32) -> u64 {
    base.saturating_mul(factor.pow(attempt) as u64)
}

fn uri_of(event_value: &Value) -> String {
    event_value
        .get("meta")
        .and_then(|m| m.get("uri"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn domain_of(event_value: &Value) -> Option<String> {
    event_value
        .get("meta")
        .and_then(|m| m.get("domain"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn body_as_value(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}

struct RetryReentry {
    rule_name: String,
    original_event: Value,
    retries_left: u32,
    triggered_by: String,
    request_id: String,
}

/// A retry envelope decodes as a plain [`Event`] (its extra fields land in
/// the flattened payload). This distinguishes a retry re-entry from a
/// fresh source event without the bus layer needing to know about retry
/// semantics at all.
fn decode_retry_reentry(event: &Event) -> Option<RetryReentry> {
    let payload = &event.payload;
    let original_event = payload.get("original_event")?.clone();
    let retries_left = payload.get("retries_left")?.as_u64()? as u32;
    let triggered_by = payload.get("triggered_by")?.as_str()?.to_string();
    let rule_name = event.meta.topic.strip_prefix("change-prop.retry.")?.to_string();
    Some(RetryReentry {
        rule_name,
        original_event,
        retries_left,
        triggered_by,
        request_id: event.meta.request_id.clone(),
    })
}

#[async_trait]
impl<C: HttpClient + 'static> EventHandler for Executor<C> {
    async fn handle(&self, topic: &str, event: Event) {
        self.dispatch(topic, &event).await;
    }
}
