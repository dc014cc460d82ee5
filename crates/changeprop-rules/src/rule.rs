use changeprop_core::Bindings;
use changeprop_match::{compile_retry_condition, default_ignore, default_retry_on, Matcher, RetryCondition};
use serde::Deserialize;
use serde_json::Value;

use crate::error::RuleError;
use crate::option::CompiledOption;
use crate::template::{ExecSpec, JsonTemplate, Template};

/// Declarative shape of one option/case in a rule config document.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OptionSpec {
    #[serde(rename = "match")]
    pub match_: Option<Value>,
    #[serde(default)]
    pub match_not: Option<Value>,
    #[serde(default)]
    pub exec: Option<Vec<ExecSpec>>,
}

/// Declarative shape of an entire rule config document.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub topic: String,
    #[serde(default)]
    pub retry_on: Option<Value>,
    #[serde(default)]
    pub ignore: Option<Value>,
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    #[serde(default = "default_retry_factor")]
    pub retry_factor: u32,
    #[serde(default)]
    pub decode_results: bool,
    #[serde(rename = "match")]
    #[serde(default)]
    pub match_: Option<Value>,
    #[serde(default)]
    pub match_not: Option<Value>,
    #[serde(default)]
    pub exec: Option<Vec<ExecSpec>>,
    #[serde(default)]
    pub cases: Option<Vec<OptionSpec>>,
    /// When set, a matching event is produced onto `<produce_dc>.<topic>`
    /// instead of running `exec`.
    #[serde(default)]
    pub produce_to_topic: Option<String>,
}

fn default_retry_delay() -> u64 {
    60_000
}
fn default_retry_limit() -> u32 {
    2
}
fn default_retry_factor() -> u32 {
    6
}

/// An immutable, compiled rule. Constructed once at start-up and held
/// for the process lifetime.
pub struct Rule {
    pub name: String,
    pub topic: String,
    pub retry_delay_ms: u64,
    pub retry_limit: u32,
    pub retry_factor: u32,
    pub decode_results: bool,
    pub produce_to_topic: Option<String>,
    retry_on: RetryCondition,
    ignore: RetryCondition,
    cases: Vec<CompiledOption>,
}

impl Rule {
    pub fn new(name: impl Into<String>, spec: RuleSpec) -> Result<Rule, RuleError> {
        let name = name.into();
        if spec.topic.is_empty() {
            return Err(RuleError::MissingField {
                name: name.clone(),
                field: "topic",
            });
        }

        let retry_on_spec = spec.retry_on.clone().unwrap_or_else(default_retry_on);
        let ignore_spec = spec.ignore.clone().unwrap_or_else(default_ignore);
        let retry_on = compile_retry_condition(&retry_on_spec).map_err(|source| RuleError::Compile {
            name: name.clone(),
            source,
        })?;
        let ignore = compile_retry_condition(&ignore_spec).map_err(|source| RuleError::Compile {
            name: name.clone(),
            source,
        })?;

        let option_specs = spec.cases.clone().unwrap_or_else(|| {
            vec![OptionSpec {
                match_: spec.match_.clone(),
                match_not: spec.match_not.clone(),
                exec: spec.exec.clone(),
            }]
        });

        let mut cases = Vec::with_capacity(option_specs.len());
        for option_spec in option_specs {
            cases.push(compile_option(&name, option_spec, spec.decode_results)?);
        }

        Ok(Rule {
            name,
            topic: spec.topic,
            retry_delay_ms: spec.retry_delay,
            retry_limit: spec.retry_limit,
            retry_factor: spec.retry_factor,
            decode_results: spec.decode_results,
            produce_to_topic: spec.produce_to_topic,
            retry_on,
            ignore,
            cases,
        })
    }

    /// Returns the index of the first option whose `match` holds and
    /// `match_not` does not.
    pub fn test(&self, event_value: &Value) -> Option<usize> {
        self.cases.iter().position(|case| case.test(event_value))
    }

    /// A `produce_to_topic` rule always has an action to perform, even
    /// with no `exec` steps declared. Only an `exec`-less, non-producing
    /// option is a true no-op.
    pub fn is_noop(&self, idx: usize) -> bool {
        self.produce_to_topic.is_none() && self.cases[idx].is_noop()
    }

    pub fn get_exec(&self, idx: usize) -> &[Box<dyn Template>] {
        self.cases[idx].exec()
    }

    pub fn expand(&self, idx: usize, event_value: &Value) -> Bindings {
        self.cases[idx].expand(event_value)
    }

    pub fn should_retry(&self, result: &Value) -> bool {
        self.retry_on.classify(result)
    }

    pub fn should_ignore(&self, result: &Value) -> bool {
        self.ignore.classify(result)
    }

    /// `change-prop.retry.<rule_name>`.
    pub fn retry_topic(&self) -> String {
        format!("change-prop.retry.{}", self.name)
    }
}

fn compile_option(
    rule_name: &str,
    spec: OptionSpec,
    rule_decode_results: bool,
) -> Result<CompiledOption, RuleError> {
    let matcher = spec
        .match_
        .as_ref()
        .map(Matcher::compile)
        .transpose()
        .map_err(|source| RuleError::Compile {
            name: rule_name.to_string(),
            source,
        })?;
    let anti_matcher = spec
        .match_not
        .as_ref()
        .map(Matcher::compile)
        .transpose()
        .map_err(|source| RuleError::Compile {
            name: rule_name.to_string(),
            source,
        })?;
    let exec: Vec<Box<dyn Template>> = spec
        .exec
        .unwrap_or_default()
        .into_iter()
        .map(|exec_spec| Box::new(JsonTemplate::new(exec_spec, rule_decode_results)) as Box<dyn Template>)
        .collect();

    Ok(CompiledOption::new(matcher, anti_matcher, exec))
}

/// `change-prop.error`, not per-rule, shared by all rules.
pub fn error_topic() -> &'static str {
    "change-prop.error"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(yaml: &str) -> RuleSpec {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn simple_rule_dispatches_first_matching_option() {
        let spec = parse(
            r#"
topic: simple_test_rule
match:
  message: test
exec:
  - method: POST
    uri: "http://mock.com/"
    body:
      test_field_name: test_field_value
      derived_field: "{{bindings.message}}"
"#,
        );
        let rule = Rule::new("simple_test_rule", spec).unwrap();
        assert_eq!(rule.test(&json!({"message": "no"})), None);
        let idx = rule.test(&json!({"message": "test"})).unwrap();
        assert_eq!(idx, 0);
        assert!(!rule.is_noop(idx));
        assert_eq!(rule.retry_topic(), "change-prop.retry.simple_test_rule");
    }

    #[test]
    fn option_without_exec_is_noop() {
        let spec = parse(
            r#"
topic: noop_rule
match:
  message: test
"#,
        );
        let rule = Rule::new("noop_rule", spec).unwrap();
        let idx = rule.test(&json!({"message": "test"})).unwrap();
        assert!(rule.is_noop(idx));
    }

    #[test]
    fn missing_topic_is_invalid_rule() {
        let spec = parse("match:\n  message: test\n");
        let err = Rule::new("bad", spec);
        assert!(err.is_err());
    }

    #[test]
    fn default_retry_and_ignore_match_spec() {
        let spec = parse("topic: t\n");
        let rule = Rule::new("t", spec).unwrap();
        assert!(rule.should_retry(&json!({"status": 503})));
        assert!(!rule.should_retry(&json!({"status": 404})));
        assert!(rule.should_ignore(&json!({"status": 412})));
    }
}
