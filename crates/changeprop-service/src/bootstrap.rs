use std::sync::Arc;
use std::time::Duration;

use changeprop_bus::{source_topic, ConsumerWorker, GuaranteedProducer, Producer};
use changeprop_config::KafkaConfig;
use changeprop_executor::{Executor, ExecutorConfig, ReqwestHttpClient};
use changeprop_rules::RuleRegistry;
use tokio::sync::watch;

/// Everything the running process needs to hold onto for a clean shutdown.
pub struct Service {
    shutdown_tx: watch::Sender<bool>,
    worker_handles: Vec<tokio::task::JoinHandle<()>>,
    producer: GuaranteedProducer,
}

/// Wires the rule registry, guaranteed producer, executor, and one
/// consumer worker per source topic plus one per retry topic. The
/// run-time counterpart of `knhk-cli`'s `get_config` + command-dispatch
/// bootstrap, generalized to a long-running service.
pub async fn start(kafka: &KafkaConfig, rules: RuleRegistry) -> anyhow::Result<Service> {
    if let Some(delay_ms) = kafka.startup_delay {
        tracing::info!(delay_ms, "honoring configured startup delay");
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    let producer = GuaranteedProducer::new(&kafka.metadata_broker_list)?;
    let http = Arc::new(ReqwestHttpClient::new(Duration::from_secs(30))?);
    let registry = Arc::new(rules);

    // `GuaranteedProducer` clones cheaply (its rdkafka handle is
    // `Arc`-backed); the executor gets its own clone so `Service` keeps
    // the original, with its poll task, free to flush at shutdown.
    let producer_handle: Arc<dyn Producer> = Arc::new(producer.clone());
    let executor = Arc::new(Executor::new(
        registry.clone(),
        http,
        producer_handle,
        ExecutorConfig {
            emitter_id: emitter_id(),
            user_agent: "changeprop/0.1".to_string(),
            produce_dc: kafka.produce_dc(),
        },
    ));

    let group_id = kafka
        .consumer
        .group_id
        .clone()
        .unwrap_or_else(|| "changeprop".to_string());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut worker_handles = Vec::new();

    for topic in registry.topics() {
        let full_topic = source_topic(&kafka.consume_dc(), topic);
        let worker = ConsumerWorker::new(
            &kafka.metadata_broker_list,
            &group_id,
            &full_topic,
            topic,
            executor.clone(),
        )?;
        worker_handles.push(spawn_worker(worker, shutdown_rx.clone()));
    }

    for retry_topic in registry.retry_topics() {
        let worker = ConsumerWorker::new(
            &kafka.metadata_broker_list,
            &group_id,
            &retry_topic,
            &retry_topic,
            executor.clone(),
        )?;
        worker_handles.push(spawn_worker(worker, shutdown_rx.clone()));
    }

    Ok(Service {
        shutdown_tx,
        worker_handles,
        producer,
    })
}

fn spawn_worker<H: changeprop_bus::EventHandler + 'static>(
    worker: ConsumerWorker<H>,
    shutdown_rx: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(worker.run(shutdown_rx))
}

fn emitter_id() -> String {
    std::env::var("CHANGEPROP_EMITTER_ID").unwrap_or_else(|_| format!("changeprop-{}", uuid::Uuid::new_v4()))
}

impl Service {
    /// Signals every consumer worker to stop, waits for them to drain, then
    /// flushes the producer.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.worker_handles {
            let _ = handle.await;
        }
        self.producer.shutdown(Duration::from_secs(10)).await;
    }
}
