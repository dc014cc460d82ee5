use std::collections::HashMap;

use crate::rule::{Rule, RuleSpec};
use crate::RuleError;

/// Maps topic to rules bound to it. Built once at start-up from the rules
/// config document and immutable thereafter.
pub struct RuleRegistry {
    by_topic: HashMap<String, Vec<Rule>>,
}

impl RuleRegistry {
    /// `rules` is an ordered map of rule name to spec, matching the rules
    /// configuration document's shape. Declaration order is preserved
    /// within a topic because rule evaluation order matters.
    pub fn from_specs(rules: Vec<(String, RuleSpec)>) -> Result<RuleRegistry, RuleError> {
        let mut by_topic: HashMap<String, Vec<Rule>> = HashMap::new();
        for (name, spec) in rules {
            let rule = Rule::new(name, spec)?;
            by_topic.entry(rule.topic.clone()).or_default().push(rule);
        }
        Ok(RuleRegistry { by_topic })
    }

    pub fn rules_for_topic(&self, topic: &str) -> &[Rule] {
        self.by_topic.get(topic).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Looks up a single rule by name, used when a retry-topic consumer
    /// re-enters the executor for exactly the rule that scheduled the
    /// retry.
    pub fn find_by_name(&self, name: &str) -> Option<&Rule> {
        self.by_topic.values().flatten().find(|r| r.name == name)
    }

    /// Every topic a rule is bound to, used to subscribe the consumer
    /// workers.
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.by_topic.keys().map(String::as_str)
    }

    /// Every per-rule retry topic this registry will ever produce onto,
    /// used to spin up one retry-consumer per rule.
    pub fn retry_topics(&self) -> Vec<String> {
        self.by_topic
            .values()
            .flatten()
            .map(Rule::retry_topic)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(topic: &str) -> RuleSpec {
        serde_yaml::from_str(&format!("topic: {topic}\nmatch:\n  message: test\n")).unwrap()
    }

    #[test]
    fn groups_rules_by_topic() {
        let registry = RuleRegistry::from_specs(vec![
            ("a".to_string(), spec("t1")),
            ("b".to_string(), spec("t1")),
            ("c".to_string(), spec("t2")),
        ])
        .unwrap();
        assert_eq!(registry.rules_for_topic("t1").len(), 2);
        assert_eq!(registry.rules_for_topic("t2").len(), 1);
        assert!(registry.rules_for_topic("missing").is_empty());
    }

    #[test]
    fn preserves_declaration_order_within_topic() {
        let registry = RuleRegistry::from_specs(vec![
            ("first".to_string(), spec("t1")),
            ("second".to_string(), spec("t1")),
        ])
        .unwrap();
        let names: Vec<&str> = registry
            .rules_for_topic("t1")
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "second"]);
        let _ = json!({});
    }
}
