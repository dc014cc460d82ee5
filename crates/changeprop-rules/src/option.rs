use changeprop_core::Bindings;
use changeprop_match::Matcher;
use serde_json::Value;

use crate::template::Template;

/// One branch of a rule. An option with no `exec` marks the rule as a
/// no-op for that branch: still consumed, commits the offset, performs no
/// HTTP.
pub struct CompiledOption {
    matcher: Option<Matcher>,
    anti_matcher: Option<Matcher>,
    exec: Vec<Box<dyn Template>>,
}

impl CompiledOption {
    pub fn new(
        matcher: Option<Matcher>,
        anti_matcher: Option<Matcher>,
        exec: Vec<Box<dyn Template>>,
    ) -> Self {
        CompiledOption {
            matcher,
            anti_matcher,
            exec,
        }
    }

    /// `match` holds AND `match_not` does not.
    pub fn test(&self, event_value: &Value) -> bool {
        let matched = self
            .matcher
            .as_ref()
            .map(|m| m.predicate(event_value))
            .unwrap_or(true);
        let excluded = self
            .anti_matcher
            .as_ref()
            .map(|m| m.predicate(event_value))
            .unwrap_or(false);
        matched && !excluded
    }

    pub fn expand(&self, event_value: &Value) -> Bindings {
        self.matcher
            .as_ref()
            .map(|m| m.binder(event_value))
            .unwrap_or_else(Bindings::empty)
    }

    pub fn exec(&self) -> &[Box<dyn Template>] {
        &self.exec
    }

    pub fn is_noop(&self) -> bool {
        self.exec.is_empty()
    }
}
