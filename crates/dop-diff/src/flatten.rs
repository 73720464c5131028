//! Path-keyed projection of nested JSON trees.

use std::collections::BTreeMap;

use serde_json::Value;

/// Flatten a tree into one entry per scalar leaf.
///
/// Object keys are joined with `/`; list elements are addressed by their
/// index. `{"a": {"b": 1}, "c": [10, 20]}` flattens to `a/b = 1`,
/// `c/0 = 10`, `c/1 = 20`. Empty objects and lists contribute no entries.
/// A scalar root flattens to a single entry under the empty path.
pub fn flatten(tree: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    match tree {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(key.clone(), value, &mut out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(index.to_string(), value, &mut out);
            }
        }
        scalar => {
            out.insert(String::new(), scalar.clone());
        }
    }
    out
}

fn flatten_into(path: String, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(format!("{path}/{key}"), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(format!("{path}/{index}"), child, out);
            }
        }
        scalar => {
            out.insert(path, scalar.clone());
        }
    }
}
