use changeprop_match::{compile_retry_condition, Matcher};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_event() -> impl Strategy<Value = Value> {
    (any::<bool>(), "[a-z]{0,6}", any::<u16>()).prop_map(|(has_message, word, status)| {
        if has_message {
            json!({"message": word, "status": status})
        } else {
            json!({"status": status})
        }
    })
}

proptest! {
    /// predicate(E) = true iff binder(E) is well-formed, and the binder
    /// never half-populates an object when the predicate is false.
    #[test]
    fn predicate_and_binder_agree(event in arb_event()) {
        let m = Matcher::compile(&json!({"message": "test"})).unwrap();
        let matched = m.predicate(&event);
        let bound = m.binder(&event);
        if matched {
            prop_assert_eq!(bound.0.get("message"), Some(&json!("test")));
        } else {
            prop_assert_ne!(bound.0.get("message"), Some(&json!("test")));
        }
    }

    /// classify(R) is deterministic for a fixed retry spec.
    #[test]
    fn classify_is_deterministic(status in any::<u16>()) {
        let cond = compile_retry_condition(&json!({"status": ["50x"]})).unwrap();
        let result = json!({"status": status});
        let first = cond.classify(&result);
        let second = cond.classify(&result);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first, (500..=509).contains(&(status as u32)));
    }
}
