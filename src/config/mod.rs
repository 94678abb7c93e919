//! Configuration data model
//!
//! Provides the build [`Context`], caller [`Options`], the default skeleton,
//! the merge utility and the canonical [`Config`] produced by every cycle.

pub mod access;
pub mod context;
pub mod merge;
pub mod package;
pub mod skeleton;

pub use access::ValueExt;
pub use context::*;
pub use merge::{dedupe, dedupe_by, merge};
pub use package::PackageMeta;
pub use skeleton::{default_skeleton, ALL_ANIMATIONS, ANIMATIONS};

use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// The canonical, fully derived configuration of one cycle.
///
/// Rebuilt from scratch on every cycle; never mutated across cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Config(Value);

impl Config {
    pub(crate) fn new(value: Value) -> Self {
        Self(value)
    }

    /// The underlying tree.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// Value at a dotted path.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.at(path)
    }

    pub fn dev_server_host(&self) -> Option<&str> {
        self.0.str_at("devServer.host")
    }

    pub fn dev_server_port(&self) -> Option<u16> {
        self.0.at("devServer.port").and_then(Value::as_u64).and_then(|p| u16::try_from(p).ok())
    }

    pub fn public_path(&self) -> Option<&str> {
        self.0.str_at("build.publicPath")
    }

    pub fn router_mode(&self) -> Option<&str> {
        self.0.str_at("build.vueRouterMode")
    }

    pub fn router_base(&self) -> Option<&str> {
        self.0.str_at("build.vueRouterBase")
    }

    pub fn dist_dir(&self) -> Option<PathBuf> {
        self.0.str_at("build.distDir").map(PathBuf::from)
    }

    /// Resolved application URL (development only).
    pub fn app_url(&self) -> Option<&str> {
        self.0.str_at("__meta.appUrl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_accessors() {
        let cfg = Config::new(json!({
            "devServer": { "host": "0.0.0.0", "port": 8080 },
            "build": { "publicPath": "/", "vueRouterMode": "history", "distDir": "/p/dist/spa" }
        }));
        assert_eq!(cfg.dev_server_host(), Some("0.0.0.0"));
        assert_eq!(cfg.dev_server_port(), Some(8080));
        assert_eq!(cfg.public_path(), Some("/"));
        assert_eq!(cfg.router_mode(), Some("history"));
        assert_eq!(cfg.dist_dir(), Some(PathBuf::from("/p/dist/spa")));
        assert_eq!(cfg.app_url(), None);
    }

    #[test]
    fn test_config_serializes_transparently() {
        let cfg = Config::new(json!({ "css": [] }));
        assert_eq!(serde_json::to_string(&cfg).unwrap(), r#"{"css":[]}"#);
    }
}
