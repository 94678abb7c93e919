//! Ordered merge of configuration trees.
//!
//! Every "defaults under user values" step of the normalizer goes through
//! [`merge`] so the semantics are the same everywhere:
//!
//! | base      | over          | result                                   |
//! |-----------|---------------|------------------------------------------|
//! | object    | object        | key-wise, recursive                      |
//! | array     | array         | concatenated, base first (no dedup)      |
//! | array     | empty object  | base (a Lua `{}` is also an empty list)  |
//! | anything  | `null`        | base                                     |
//! | anything  | anything else | over                                     |
//!
//! Deduplication is never done by the merge; the derivation rules call
//! [`dedupe`] or [`dedupe_by`] on the lists where it matters.

use serde_json::Value;
use std::collections::HashSet;

/// Merge `over` into `base` in place.
pub fn merge(base: &mut Value, over: Value) {
    match (base, over) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(over_map)) => {
            for (key, value) in over_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        if !value.is_null() {
                            base_map.insert(key, value);
                        }
                    }
                }
            }
        }
        (Value::Array(base_list), Value::Array(over_list)) => {
            base_list.extend(over_list);
        }
        (Value::Array(_), Value::Object(over_map)) if over_map.is_empty() => {}
        (slot, value) => *slot = value,
    }
}

/// Remove duplicate values, keeping the first occurrence.
pub fn dedupe(list: &mut Vec<Value>) {
    let mut seen: Vec<Value> = Vec::with_capacity(list.len());
    list.retain(|item| {
        if seen.contains(item) {
            false
        } else {
            seen.push(item.clone());
            true
        }
    });
}

/// Remove entries whose key was already seen, keeping the first occurrence.
///
/// Entries for which `key` returns `None` are kept.
pub fn dedupe_by<F>(list: &mut Vec<Value>, key: F)
where
    F: Fn(&Value) -> Option<String>,
{
    let mut seen = HashSet::new();
    list.retain(|item| match key(item) {
        Some(k) => seen.insert(k),
        None => true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_objects_recursive() {
        let mut base = json!({ "build": { "minify": true, "env": { "A": "1" } } });
        merge(&mut base, json!({ "build": { "env": { "B": "2" } } }));
        assert_eq!(base, json!({ "build": { "minify": true, "env": { "A": "1", "B": "2" } } }));
    }

    #[test]
    fn test_merge_arrays_concatenate_without_dedup() {
        let mut base = json!({ "css": ["app.scss"] });
        merge(&mut base, json!({ "css": ["app.scss", "extra.scss"] }));
        assert_eq!(base["css"], json!(["app.scss", "app.scss", "extra.scss"]));
    }

    #[test]
    fn test_merge_primitive_over_wins() {
        let mut base = json!({ "animations": [] });
        merge(&mut base, json!({ "animations": "all" }));
        assert_eq!(base["animations"], "all");
    }

    #[test]
    fn test_merge_null_keeps_base() {
        let mut base = json!({ "port": 8080 });
        merge(&mut base, json!({ "port": null, "host": null }));
        assert_eq!(base, json!({ "port": 8080 }));
    }

    #[test]
    fn test_merge_empty_table_over_list_is_noop() {
        let mut base = json!({ "boot": ["axios"] });
        merge(&mut base, json!({ "boot": {} }));
        assert_eq!(base["boot"], json!(["axios"]));
    }

    #[test]
    fn test_dedupe_preserves_first() {
        let mut list = vec![json!("b"), json!("a"), json!("b"), json!("c"), json!("a")];
        dedupe(&mut list);
        assert_eq!(list, vec![json!("b"), json!("a"), json!("c")]);
    }

    #[test]
    fn test_dedupe_by_key() {
        let mut list = vec![
            json!({ "path": "/x", "server": false }),
            json!({ "path": "/y" }),
            json!({ "path": "/x" }),
        ];
        dedupe_by(&mut list, |v| v["path"].as_str().map(String::from));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0]["server"], false);
    }
}
