//! Structural diff between two remote resource representations.

use serde_json::{Map, Value};

/// Sparse patch turning `old` into `new`.
///
/// Top-level keys whose value changed (or that are new) carry the new value;
/// keys present in `old` but gone from `new` are set to null so the remote
/// clears them. Nested objects are compared and sent whole.
pub fn diff_patch(new: &Map<String, Value>, old: &Map<String, Value>) -> Map<String, Value> {
    let mut patch = Map::new();

    for (key, value) in new {
        if old.get(key) != Some(value) {
            patch.insert(key.clone(), value.clone());
        }
    }
    for key in old.keys() {
        if !new.contains_key(key) {
            patch.insert(key.clone(), Value::Null);
        }
    }

    patch
}
