//! Incremental state merging.
//!
//! After the first message the controller never resends full snapshots; it
//! sends deltas. A delta overwrites or creates exactly the keys it carries
//! and leaves everything else alone.

use serde_json::{Map, Value};

/// Merge `delta` into `dest`, key by key.
///
/// Nested objects merge recursively, arrays and scalars replace wholesale,
/// and no merge ever deletes a key.
pub fn merge(dest: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, incoming) in delta {
        match (dest.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge(existing, nested),
            (Some(slot), _) => *slot = incoming.clone(),
            (None, _) => {
                dest.insert(key.clone(), incoming.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn creates_missing_keys() {
        let mut state = Map::new();
        merge(&mut state, &obj(json!({"xx": "READY", "line": 0})));
        assert_eq!(Value::Object(state), json!({"xx": "READY", "line": 0}));
    }

    #[test]
    fn overwrites_scalars_last_write_wins() {
        let mut state = obj(json!({"line": 1}));
        merge(&mut state, &obj(json!({"line": 2})));
        merge(&mut state, &obj(json!({"line": 7})));
        assert_eq!(state["line"], json!(7));
    }

    #[test]
    fn deep_merges_nested_objects() {
        let mut state = obj(json!({"motor": {"0": {"enabled": true}, "1": {"enabled": true}}}));
        merge(&mut state, &obj(json!({"motor": {"0": {"enabled": false}}})));
        assert_eq!(
            Value::Object(state),
            json!({"motor": {"0": {"enabled": false}, "1": {"enabled": true}}})
        );
    }

    #[test]
    fn replaces_arrays_wholesale() {
        let mut state = obj(json!({"messages": [1, 2, 3]}));
        merge(&mut state, &obj(json!({"messages": [4]})));
        assert_eq!(state["messages"], json!([4]));
    }

    #[test]
    fn replaces_object_with_scalar_and_back() {
        let mut state = obj(json!({"tool": {"number": 1}}));
        merge(&mut state, &obj(json!({"tool": 0})));
        assert_eq!(state["tool"], json!(0));
        merge(&mut state, &obj(json!({"tool": {"number": 2}})));
        assert_eq!(state["tool"], json!({"number": 2}));
    }

    #[test]
    fn never_deletes_keys() {
        let mut state = obj(json!({"xx": "RUNNING", "line": 42}));
        merge(&mut state, &obj(json!({"xx": "READY"})));
        assert_eq!(state["line"], json!(42));
    }

    #[test]
    fn sequence_equals_left_fold() {
        let deltas = [
            obj(json!({"a": 1, "pos": {"x": 0.0}})),
            obj(json!({"pos": {"y": 2.0}})),
            obj(json!({"a": 3, "pos": {"x": 1.5}})),
        ];

        let mut folded = Map::new();
        for delta in &deltas {
            merge(&mut folded, delta);
        }

        assert_eq!(
            Value::Object(folded),
            json!({"a": 3, "pos": {"x": 1.5, "y": 2.0}})
        );
    }
}
