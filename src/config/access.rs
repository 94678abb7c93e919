//! Dotted-path access into configuration trees.

use serde_json::{Map, Value};

/// Convenience accessors over a `serde_json::Value` configuration tree.
///
/// Paths are dot separated object keys (`"build.publicPath"`). Keys that
/// themselves contain dots (raw define tables) must be accessed directly.
pub trait ValueExt {
    fn at(&self, path: &str) -> Option<&Value>;
    fn at_mut(&mut self, path: &str) -> Option<&mut Value>;
    fn set_at(&mut self, path: &str, value: Value);
    fn remove_at(&mut self, path: &str) -> Option<Value>;

    fn str_at(&self, path: &str) -> Option<&str> {
        self.at(path).and_then(Value::as_str)
    }

    fn bool_at(&self, path: &str) -> Option<bool> {
        self.at(path).and_then(Value::as_bool)
    }

    /// Loose truthiness: missing, `null`, `false`, `0` and `""` are false.
    fn truthy_at(&self, path: &str) -> bool {
        self.at(path).is_some_and(is_truthy)
    }

    /// Non-empty string at `path`.
    fn text_at(&self, path: &str) -> Option<&str> {
        self.str_at(path).filter(|s| !s.is_empty())
    }
}

impl ValueExt for Value {
    fn at(&self, path: &str) -> Option<&Value> {
        path.split('.').try_fold(self, |node, key| node.as_object()?.get(key))
    }

    fn at_mut(&mut self, path: &str) -> Option<&mut Value> {
        path.split('.').try_fold(self, |node, key| node.as_object_mut()?.get_mut(key))
    }

    fn set_at(&mut self, path: &str, value: Value) {
        let mut node = self;
        let mut keys = path.split('.').peekable();
        while let Some(key) = keys.next() {
            let map = ensure_object(node);
            if keys.peek().is_none() {
                map.insert(key.to_string(), value);
                return;
            }
            node = map.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
        }
    }

    fn remove_at(&mut self, path: &str) -> Option<Value> {
        let (parent, key) = match path.rsplit_once('.') {
            Some((parent, key)) => (self.at_mut(parent)?, key),
            None => (self, path),
        };
        parent.as_object_mut()?.shift_remove(key)
    }
}

/// Coerce `value` into an object, replacing any non-object content.
pub fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced by an object"),
    }
}

/// Coerce the value at `path` into an array and return it.
///
/// A scalar becomes a one-element list, anything else an empty list.
pub fn array_at_mut<'a>(root: &'a mut Value, path: &str) -> &'a mut Vec<Value> {
    if root.at(path).is_none() {
        root.set_at(path, Value::Array(vec![]));
    }
    let slot = root.at_mut(path).expect("path was just created");
    if !slot.is_array() {
        let previous = std::mem::take(slot);
        *slot = match previous {
            Value::String(_) | Value::Number(_) | Value::Bool(true) => Value::Array(vec![previous]),
            _ => Value::Array(vec![]),
        };
    }
    match slot {
        Value::Array(list) => list,
        _ => unreachable!("slot was just coerced to an array"),
    }
}

/// Loose truthiness of a single value.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_at_nested() {
        let cfg = json!({ "build": { "publicPath": "/app/" } });
        assert_eq!(cfg.str_at("build.publicPath"), Some("/app/"));
        assert_eq!(cfg.at("build.missing"), None);
        assert_eq!(cfg.at("build.publicPath.deeper"), None);
    }

    #[test]
    fn test_set_at_creates_parents() {
        let mut cfg = json!({});
        cfg.set_at("electron.builder.directories.app", json!("/dist"));
        assert_eq!(cfg["electron"]["builder"]["directories"]["app"], "/dist");
    }

    #[test]
    fn test_set_at_replaces_scalar_parent() {
        let mut cfg = json!({ "devServer": true });
        cfg.set_at("devServer.port", json!(9000));
        assert_eq!(cfg, json!({ "devServer": { "port": 9000 } }));
    }

    #[test]
    fn test_remove_at() {
        let mut cfg = json!({ "devServer": { "https": true, "port": 1 } });
        assert_eq!(cfg.remove_at("devServer.https"), Some(json!(true)));
        assert_eq!(cfg, json!({ "devServer": { "port": 1 } }));
        assert_eq!(cfg.remove_at("nope.nothing"), None);
    }

    #[test]
    fn test_truthy() {
        let cfg = json!({ "a": "", "b": 0, "c": "x", "d": [], "e": false });
        assert!(!cfg.truthy_at("a"));
        assert!(!cfg.truthy_at("b"));
        assert!(cfg.truthy_at("c"));
        assert!(cfg.truthy_at("d"));
        assert!(!cfg.truthy_at("e"));
        assert!(!cfg.truthy_at("missing"));
    }

    #[test]
    fn test_array_at_mut_coerces() {
        let mut cfg = json!({ "extras": "roboto-font", "css": {} });
        assert_eq!(array_at_mut(&mut cfg, "extras"), &vec![json!("roboto-font")]);
        assert!(array_at_mut(&mut cfg, "css").is_empty());
        array_at_mut(&mut cfg, "boot").push(json!("axios"));
        assert_eq!(cfg["boot"], json!(["axios"]));
    }
}
