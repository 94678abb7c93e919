//! Project package metadata (`package.json`).

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ConfigError;

/// The subset of `package.json` the derivations read
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageMeta {
    pub name: Option<String>,
    pub product_name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
}

impl PackageMeta {
    /// Load `package.json` from the project root.
    ///
    /// A missing file yields empty metadata; an unreadable or malformed one is an error.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = project_root.join("package.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| ConfigError::ConfigValue {
            key: "package.json".to_string(),
            value: e.to_string(),
            expected: "a valid JSON document".to_string(),
        })
    }

    /// Product name: `productName`, then `name`, then `App`.
    pub fn product_name(&self) -> &str {
        self.product_name.as_deref().or(self.name.as_deref()).unwrap_or("App")
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn version(&self) -> &str {
        self.version.as_deref().unwrap_or("0.0.0")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_package_uses_defaults() {
        let temp = TempDir::new().expect("should create temp dir");
        let meta = PackageMeta::load(temp.path()).expect("missing package.json is fine");
        assert_eq!(meta.product_name(), "App");
        assert_eq!(meta.description(), "");
    }

    #[test]
    fn test_load_package_fields() {
        let temp = TempDir::new().expect("should create temp dir");
        fs::write(
            temp.path().join("package.json"),
            r#"{ "name": "my-app", "productName": "My App", "description": "Demo", "version": "1.2.3", "private": true }"#,
        )
        .expect("should write package.json");

        let meta = PackageMeta::load(temp.path()).expect("should parse package.json");
        assert_eq!(meta.product_name(), "My App");
        assert_eq!(meta.description(), "Demo");
        assert_eq!(meta.version(), "1.2.3");
    }

    #[test]
    fn test_product_name_falls_back_to_name() {
        let meta = PackageMeta { name: Some("plain".into()), ..Default::default() };
        assert_eq!(meta.product_name(), "plain");
    }

    #[test]
    fn test_load_malformed_package() {
        let temp = TempDir::new().expect("should create temp dir");
        fs::write(temp.path().join("package.json"), "{ not json").expect("should write file");
        assert!(matches!(PackageMeta::load(temp.path()), Err(ConfigError::ConfigValue { .. })));
    }
}
