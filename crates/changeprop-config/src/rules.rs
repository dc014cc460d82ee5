use std::collections::BTreeMap;

use changeprop_rules::{RuleRegistry, RuleSpec};

use crate::error::ConfigError;

/// Parses the rules configuration document and compiles it into an
/// immutable [`RuleRegistry`] in one step, mirroring `knhk-config`'s
/// `load_config` -> `validate_config` pipeline but collapsed since rule
/// compilation doubles as validation here.
pub fn load_rule_registry(content: &str, path: &str) -> Result<RuleRegistry, ConfigError> {
    let specs: BTreeMap<String, RuleSpec> =
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_string(),
            source,
        })?;
    RuleRegistry::from_specs(specs.into_iter().collect()).map_err(|source| ConfigError::Rule {
        name: "<rules document>".to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_two_rules_bound_to_separate_topics() {
        let registry = load_rule_registry(
            r#"
simple_test_rule:
  topic: simple_test_rule
  match:
    message: test
  exec:
    - method: POST
      uri: "http://mock.com/"
      body:
        test_field_name: test_field_value

kafka_producing_rule:
  topic: kafka_producing_rule
  match:
    message: test
  exec:
    - method: POST
      uri: "http://mock.com/"
      body: {}
"#,
            "rules.yaml",
        )
        .unwrap();
        assert_eq!(registry.rules_for_topic("simple_test_rule").len(), 1);
        assert_eq!(registry.rules_for_topic("kafka_producing_rule").len(), 1);
    }

    #[test]
    fn rejects_rule_missing_topic() {
        let err = load_rule_registry("bad_rule:\n  match:\n    message: test\n", "rules.yaml");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_malformed_yaml() {
        let err = load_rule_registry("not: [valid", "rules.yaml");
        assert!(err.is_err());
    }
}
