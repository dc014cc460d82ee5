use thiserror::Error;

/// Bus-layer errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("produce key must not be empty")]
    EmptyKey,

    #[error("duplicate in-flight produce key: {0}")]
    DuplicateKey(String),

    #[error("produce failed: {0}")]
    ProduceFailure(String),

    #[error("consumer error: {0}")]
    Consumer(String),

    #[error("delivery resolver dropped before a report arrived")]
    ResolverDropped,
}
