//! Comparable serialization of the pipeline-affecting configuration subtrees.

use serde_json::{Map, Value};

use crate::config::ValueExt;

/// Subtrees whose changes require regenerating the pipeline configuration.
pub const WHITELIST: [&str; 8] = [
    "build",
    "ssr.pwa",
    "framework.autoImportComponentCase",
    "devServer",
    "pwa",
    "electron",
    "bex",
    "htmlVariables",
];

/// Serialized whitelist of one configuration.
///
/// Function-valued fields are already tagged text in the tree, so two
/// functions compare equal exactly when their source text is identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    /// Capture the whitelisted subtrees of `cfg`.
    pub fn capture(cfg: &Value) -> Self {
        let mut picked = Map::new();
        for path in WHITELIST {
            picked.insert(path.to_string(), cfg.at(path).cloned().unwrap_or(Value::Null));
        }
        Self(Value::Object(picked).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this snapshot differs from `previous`; no previous snapshot counts as a change.
    pub fn differs_from(&self, previous: Option<&Snapshot>) -> bool {
        previous != Some(self)
    }
}
