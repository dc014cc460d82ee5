//! Guaranteed producer and partition-ordered consumer worker over Kafka.

mod consumer;
mod error;
mod producer;
mod topics;

pub use consumer::{ConsumerWorker, EventHandler};
pub use error::BusError;
pub use producer::{GuaranteedProducer, Producer};
pub use topics::{source_topic, DatacenterConfig};
