use serde_json::Value;

use crate::ast::MatchNode;
use crate::binder::bind_root;
use crate::compile::compile;
use crate::error::MatchError;
use crate::predicate::test;
use changeprop_core::Bindings;

/// A compiled match tree: a pure, total predicate plus a binder that
/// extracts the same structure's literals and regex captures.
#[derive(Debug, Clone)]
pub struct Matcher {
    root: MatchNode,
}

impl Matcher {
    pub fn compile(pattern: &Value) -> Result<Matcher, MatchError> {
        Ok(Matcher {
            root: compile(pattern)?,
        })
    }

    pub fn predicate(&self, target: &Value) -> bool {
        test(&self.root, Some(target))
    }

    pub fn binder(&self, target: &Value) -> Bindings {
        Bindings::from(bind_root(&self.root, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn predicate_false_implies_no_partial_binding_reliance() {
        let m = Matcher::compile(&json!({"message": "test"})).unwrap();
        let target = json!({"message": "no"});
        assert!(!m.predicate(&target));
        // binder is still total and pure even when the predicate is false;
        // callers must check `predicate` before trusting `binder`'s output.
        let bound = m.binder(&target);
        assert!(bound.0.is_empty() || bound.0.get("message") != Some(&json!("test")));
    }
}
