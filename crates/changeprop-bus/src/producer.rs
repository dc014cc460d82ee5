use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::message::OwnedHeaders;
use rdkafka::producer::{BaseRecord, DeliveryResult, ProducerContext, ThreadedProducer};
use rdkafka::ClientContext;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::BusError;

/// The produce-with-delivery-confirmation contract the executor depends
/// on. A trait rather than a concrete `GuaranteedProducer`, so the
/// executor's retry/error-emission logic can be exercised in tests
/// against an in-process fake bus.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError>;
}

type PendingMap = Arc<DashMap<String, oneshot::Sender<Result<(), String>>>>;

/// `ProducerContext` whose delivery callback resolves the pending map
/// entry keyed by `"<topic>:<key>"`.
#[derive(Clone)]
struct DeliveryContext {
    pending: PendingMap,
}

impl ClientContext for DeliveryContext {}

impl ProducerContext for DeliveryContext {
    type DeliveryOpaque = ();

    fn delivery(&self, report: &DeliveryResult<'_>, _opaque: Self::DeliveryOpaque) {
        let (topic, key) = match report {
            Ok(msg) => (
                msg.topic().to_string(),
                msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
            ),
            Err((_, msg)) => (
                msg.topic().to_string(),
                msg.key().map(|k| String::from_utf8_lossy(k).into_owned()),
            ),
        };
        let Some(key) = key else { return };
        let map_key = format!("{topic}:{key}");
        if let Some((_, sender)) = self.pending.remove(&map_key) {
            let result = match report {
                Ok(_) => Ok(()),
                Err((err, _)) => Err(err.to_string()),
            };
            let _ = sender.send(result);
        }
    }
}

/// Wraps the bus producer with delivery-report confirmation, per-key
/// dedup, and a liveness poll loop.
pub struct GuaranteedProducer {
    producer: ThreadedProducer<DeliveryContext>,
    pending: PendingMap,
    poll_task: Option<JoinHandle<()>>,
}

impl GuaranteedProducer {
    pub fn new(bootstrap_servers: &str) -> Result<Self, BusError> {
        let pending: PendingMap = Arc::new(DashMap::new());
        let producer: ThreadedProducer<DeliveryContext> = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("request.required.acks", "1")
            .create_with_context(DeliveryContext {
                pending: pending.clone(),
            })
            .map_err(|e: KafkaError| BusError::ProduceFailure(e.to_string()))?;

        // ThreadedProducer already polls on its own background thread, but
        // the 500ms tick surfaces delivery reports promptly even with a
        // BaseProducer swapped in for testing.
        let poll_producer = producer.clone();
        let poll_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                poll_producer.poll(Duration::from_millis(0));
            }
        });

        Ok(GuaranteedProducer {
            producer,
            pending,
            poll_task: Some(poll_task),
        })
    }

    /// Rejects immediately if `key` is empty; rejects with `DuplicateKey`
    /// if a produce for the same `(topic, key)` is already in flight.
    /// Callers must serialize by key.
    pub async fn produce(
        &self,
        topic: &str,
        partition: Option<i32>,
        payload: &[u8],
        key: &str,
        headers: Option<OwnedHeaders>,
    ) -> Result<(), BusError> {
        if key.is_empty() {
            return Err(BusError::EmptyKey);
        }
        let map_key = format!("{topic}:{key}");
        let (tx, rx) = oneshot::channel();
        {
            if self.pending.contains_key(&map_key) {
                return Err(BusError::DuplicateKey(map_key));
            }
            self.pending.insert(map_key.clone(), tx);
        }

        let mut record = BaseRecord::to(topic).payload(payload).key(key);
        if let Some(p) = partition {
            record = record.partition(p);
        }
        if let Some(h) = headers {
            record = record.headers(h);
        }

        if let Err((err, _owned)) = self.producer.send(record) {
            self.pending.remove(&map_key);
            return Err(BusError::ProduceFailure(err.to_string()));
        }

        match rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(BusError::ProduceFailure(reason)),
            Err(_) => Err(BusError::ResolverDropped),
        }
    }

    /// The pending map is empty when idle.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Stops the polling tick, flushes outstanding messages, and drops the
    /// underlying producer.
    pub async fn shutdown(mut self, flush_timeout: Duration) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
        let _ = self.producer.flush(flush_timeout);
    }
}

#[async_trait]
impl Producer for GuaranteedProducer {
    async fn produce(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BusError> {
        self.produce(topic, None, payload, key, None).await
    }
}

// `BaseProducer`/`ThreadedProducer` require `Clone` for the internal poll
// loop; rdkafka's producer handles are cheap `Arc`-backed clones.
impl Clone for GuaranteedProducer {
    fn clone(&self) -> Self {
        GuaranteedProducer {
            producer: self.producer.clone(),
            pending: self.pending.clone(),
            poll_task: None,
        }
    }
}
