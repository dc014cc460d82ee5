use serde_json::{Map, Value};

/// Values extracted by the matcher: literal constants and regex captures,
/// merged into the event for template expansion.
///
/// Binding keys never collide with event field names because they are
/// namespaced under a single reserved `"bindings"` key rather than spliced
/// directly into the event tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings(pub Map<String, Value>);

impl Bindings {
    pub fn empty() -> Self {
        Bindings(Map::new())
    }

    pub fn merge(mut self, other: Bindings) -> Self {
        for (k, v) in other.0 {
            self.0.insert(k, v);
        }
        self
    }

    /// Produces the tree a [`Template`](crate) renders against: the event's
    /// own value with a `bindings` key layered on top.
    pub fn expand(&self, event_value: &Value) -> Value {
        let mut merged = event_value.clone();
        if let Value::Object(ref mut map) = merged {
            map.insert("bindings".to_string(), Value::Object(self.0.clone()));
        }
        merged
    }
}

impl From<Map<String, Value>> for Bindings {
    fn from(map: Map<String, Value>) -> Self {
        Bindings(map)
    }
}
