//! Kafka and rules configuration loading, following `knhk-config`'s
//! load -> validate pipeline.

mod error;
mod kafka;
mod load;
mod rules;

pub use error::ConfigError;
pub use kafka::{KafkaConfig, TopicGroupConfig};
pub use load::{kafka_config_path, load_config, load_kafka_config, load_rules, rules_config_path};
pub use rules::load_rule_registry;
