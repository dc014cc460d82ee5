use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use changeprop_core::Event;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Message, OwnedMessage};
use tokio::sync::{mpsc, watch};

use crate::error::BusError;

/// Invoked once per decoded event; implemented by the executor. Kept
/// generic here so `changeprop-bus` has no dependency on the executor
/// crate.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, topic: &str, event: Event);
}

/// One worker per (topic, consumer-group). Subscribes with
/// `auto.offset.reset = largest` so new rules do not drain history,
/// disables automatic commit, and commits manually once the executor
/// returns for an event.
pub struct ConsumerWorker<H: EventHandler + 'static> {
    consumer: Arc<StreamConsumer>,
    handler: Arc<H>,
    /// The bus topic actually subscribed to (may carry a `<dc>.` prefix).
    subscribe_topic: String,
    /// The topic handed to [`EventHandler::handle`]: the bare, declared
    /// rule topic the registry is keyed by, with any `<dc>.` prefix
    /// already stripped. Source events are subscribed under
    /// `<consume_dc>.<topic>` but rules are keyed by the bare `<topic>`.
    logical_topic: String,
}

impl<H: EventHandler + 'static> ConsumerWorker<H> {
    /// `subscribe_topic` is the literal bus topic to subscribe to;
    /// `logical_topic` is what gets passed to the handler (for retry
    /// topics the two are the same, since the executor inspects the
    /// envelope itself rather than the topic argument).
    pub fn new(
        bootstrap_servers: &str,
        group_id: &str,
        subscribe_topic: &str,
        logical_topic: &str,
        handler: Arc<H>,
    ) -> Result<Self, BusError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "6000")
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "largest")
            .create()
            .map_err(|e| BusError::Consumer(e.to_string()))?;
        consumer
            .subscribe(&[subscribe_topic])
            .map_err(|e| BusError::Consumer(e.to_string()))?;

        Ok(ConsumerWorker {
            consumer: Arc::new(consumer),
            handler,
            subscribe_topic: subscribe_topic.to_string(),
            logical_topic: logical_topic.to_string(),
        })
    }

    /// Processing is serialized per partition (a dedicated task drains
    /// each partition's queue in receive order) and parallel across
    /// partitions.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut lanes: HashMap<i32, mpsc::UnboundedSender<OwnedMessage>> = HashMap::new();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                received = self.consumer.recv() => {
                    match received {
                        Ok(borrowed) => {
                            let owned = borrowed.detach();
                            let partition = owned.partition();
                            let lane = lanes.entry(partition).or_insert_with(|| {
                                spawn_partition_lane(
                                    self.consumer.clone(),
                                    self.handler.clone(),
                                    self.logical_topic.clone(),
                                )
                            });
                            if lane.send(owned).is_err() {
                                tracing::warn!(partition, "partition lane closed, dropping message");
                            }
                        }
                        Err(err) => {
                            tracing::error!(error = %err, topic = %self.subscribe_topic, "kafka poll error");
                        }
                    }
                }
            }
        }
    }
}

fn spawn_partition_lane<H: EventHandler + 'static>(
    consumer: Arc<StreamConsumer>,
    handler: Arc<H>,
    topic: String,
) -> mpsc::UnboundedSender<OwnedMessage> {
    let (tx, mut rx) = mpsc::unbounded_channel::<OwnedMessage>();
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg.payload() {
                Some(bytes) => match Event::decode(bytes) {
                    Ok(event) => {
                        handler.handle(&topic, event).await;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, topic = %topic, "decode failure, committing and skipping");
                    }
                },
                None => tracing::warn!(topic = %topic, "empty payload, committing and skipping"),
            }

            if let Err(err) = consumer.commit_message(&msg, CommitMode::Async) {
                tracing::error!(error = %err, topic = %topic, "failed to commit offset");
            }
        }
    });
    tx
}
