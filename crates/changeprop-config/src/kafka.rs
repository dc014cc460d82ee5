use std::collections::BTreeMap;

use changeprop_bus::DatacenterConfig;
use serde::Deserialize;

use crate::error::ConfigError;

/// Shape of the Kafka configuration document: a required
/// `metadata_broker_list`, optional `consumer`/`producer` stanzas, and the
/// datacenter naming fields used to build topic names.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    pub metadata_broker_list: String,
    #[serde(default)]
    pub consumer: TopicGroupConfig,
    #[serde(default)]
    pub producer: TopicGroupConfig,
    #[serde(default)]
    pub dc_name: Option<String>,
    #[serde(default)]
    pub consume_dc: Option<String>,
    #[serde(default)]
    pub produce_dc: Option<String>,
    #[serde(default)]
    pub startup_delay: Option<u64>,
}

/// A `consumer`/`producer` stanza. `default_topic_conf` is a nested table in
/// the original config document but is lifted flat into `topic_config` here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopicGroupConfig {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    #[serde(default)]
    pub default_topic_conf: BTreeMap<String, String>,
}

impl TopicGroupConfig {
    /// Client-level options merged with the lifted topic-level table,
    /// ready to hand to `rdkafka::ClientConfig::set` one pair at a time.
    pub fn topic_config(&self) -> BTreeMap<String, String> {
        let mut merged = self.options.clone();
        merged.extend(self.default_topic_conf.clone());
        merged
    }
}

impl KafkaConfig {
    pub fn from_toml(content: &str, path: &str) -> Result<KafkaConfig, ConfigError> {
        let config: KafkaConfig = toml::from_str(content).map_err(|source| ConfigError::Toml {
            path: path.to_string(),
            source,
        })?;
        validate(&config)?;
        Ok(config)
    }

    /// `consumeDC`/`produceDC` fall back to `dc_name`, else the hard-coded
    /// default of `"datacenter1"`.
    pub fn datacenters(&self) -> DatacenterConfig {
        DatacenterConfig {
            consume_dc: self.consume_dc.clone(),
            produce_dc: self.produce_dc.clone(),
            dc_name: self.dc_name.clone(),
        }
    }

    pub fn consume_dc(&self) -> String {
        self.datacenters().consume_dc()
    }

    pub fn produce_dc(&self) -> String {
        self.datacenters().produce_dc()
    }
}

fn validate(config: &KafkaConfig) -> Result<(), ConfigError> {
    if config.metadata_broker_list.trim().is_empty() {
        return Err(ConfigError::Validation(
            "metadata_broker_list must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config() {
        let config = KafkaConfig::from_toml("metadata_broker_list = \"localhost:9092\"\n", "t.toml").unwrap();
        assert_eq!(config.consume_dc(), "datacenter1");
        assert_eq!(config.produce_dc(), "datacenter1");
    }

    #[test]
    fn dc_name_is_fallback_for_both() {
        let config = KafkaConfig::from_toml(
            "metadata_broker_list = \"localhost:9092\"\ndc_name = \"eqiad\"\n",
            "t.toml",
        )
        .unwrap();
        assert_eq!(config.consume_dc(), "eqiad");
        assert_eq!(config.produce_dc(), "eqiad");
    }

    #[test]
    fn consume_and_produce_dc_can_differ() {
        let config = KafkaConfig::from_toml(
            "metadata_broker_list = \"localhost:9092\"\ndc_name = \"eqiad\"\nconsume_dc = \"codfw\"\n",
            "t.toml",
        )
        .unwrap();
        assert_eq!(config.consume_dc(), "codfw");
        assert_eq!(config.produce_dc(), "eqiad");
    }

    #[test]
    fn empty_broker_list_is_rejected() {
        let err = KafkaConfig::from_toml("metadata_broker_list = \"\"\n", "t.toml");
        assert!(err.is_err());
    }

    #[test]
    fn default_topic_conf_is_lifted_into_topic_config() {
        let config = KafkaConfig::from_toml(
            r#"
metadata_broker_list = "localhost:9092"

[consumer]
group_id = "changeprop"

[consumer.default_topic_conf]
"auto.offset.reset" = "largest"
"#,
            "t.toml",
        )
        .unwrap();
        let topic_config = config.consumer.topic_config();
        assert_eq!(topic_config.get("auto.offset.reset"), Some(&"largest".to_string()));
    }
}
