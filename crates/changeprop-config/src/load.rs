use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use changeprop_rules::RuleRegistry;

use crate::error::ConfigError;
use crate::kafka::KafkaConfig;
use crate::rules::load_rule_registry;

/// `CHANGEPROP_CONFIG` / `CHANGEPROP_RULES` override the default file
/// locations; unset falls back to `config.toml` / `rules.yaml` in the
/// current directory, mirroring `knhk-config::get_config_file_path`'s
/// environment-first resolution.
pub fn kafka_config_path() -> PathBuf {
    env::var("CHANGEPROP_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"))
}

pub fn rules_config_path() -> PathBuf {
    env::var("CHANGEPROP_RULES")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("rules.yaml"))
}

pub fn load_kafka_config(path: &Path) -> Result<KafkaConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    KafkaConfig::from_toml(&content, &path.display().to_string())
}

pub fn load_rules(path: &Path) -> Result<RuleRegistry, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_rule_registry(&content, &path.display().to_string())
}

/// Loads both config documents from their resolved paths (env override, or
/// default). The top-level entry point `changeprop-service`'s bootstrap
/// calls once at start-up.
pub fn load_config() -> Result<(KafkaConfig, RuleRegistry), ConfigError> {
    let kafka = load_kafka_config(&kafka_config_path())?;
    let rules = load_rules(&rules_config_path())?;
    Ok((kafka, rules))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_kafka_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "metadata_broker_list = \"localhost:9092\"").unwrap();
        let config = load_kafka_config(file.path()).unwrap();
        assert_eq!(config.metadata_broker_list, "localhost:9092");
    }

    #[test]
    fn load_rules_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "r:\n  topic: t\n  match:\n    message: test\n").unwrap();
        let registry = load_rules(file.path()).unwrap();
        assert_eq!(registry.rules_for_topic("t").len(), 1);
    }

    #[test]
    fn missing_kafka_config_file_is_io_error() {
        let err = load_kafka_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }
}
