//! Small helpers shared by the engine.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use serde_json::Value;

/// Memoized lookup: return the value cached under `key`, computing and
/// storing it with `compute` on first access.
pub fn get_or_insert_with<K, V, F>(cache: &mut HashMap<K, V>, key: K, compute: F) -> &mut V
where
    K: Eq + Hash,
    F: FnOnce() -> V,
{
    cache.entry(key).or_insert_with(compute)
}

/// Collect the named properties from a source, skipping ones it cannot
/// supply.
pub fn pick<'a, I, F>(properties: I, mut read: F) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> Option<String>,
{
    properties
        .into_iter()
        .filter_map(|property| read(property).map(|value| (property.to_string(), value)))
        .collect()
}

/// Shallow value equality.
///
/// Objects are equal when they have the same keys and each value is equal by
/// `==`; arrays when they have the same length and equal elements; anything
/// else by plain equality. Nested containers are compared by value too, since
/// JSON values have no identity to compare instead.
pub fn are_equivalent(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| other == value))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_or_insert_with_computes_once() {
        let mut cache = HashMap::new();
        let mut calls = 0;
        get_or_insert_with(&mut cache, "a", || {
            calls += 1;
            1
        });
        get_or_insert_with(&mut cache, "a", || {
            calls += 1;
            2
        });
        assert_eq!(calls, 1);
        assert_eq!(cache["a"], 1);
    }

    #[test]
    fn test_pick_skips_missing() {
        let picked = pick(["opacity", "color"], |property| {
            (property == "opacity").then(|| "1".to_string())
        });
        assert_eq!(picked.len(), 1);
        assert_eq!(picked["opacity"], "1");
    }

    #[test]
    fn test_are_equivalent() {
        assert!(are_equivalent(&json!({"a": 1, "b": "x"}), &json!({"b": "x", "a": 1})));
        assert!(!are_equivalent(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(are_equivalent(&json!([1, 2, 3]), &json!([1, 2, 3])));
        assert!(!are_equivalent(&json!([1, 2]), &json!([2, 1])));
        assert!(are_equivalent(&json!(5), &json!(5)));
        assert!(!are_equivalent(&json!(null), &json!(0)));
    }
}
