//! List-valued derivations: animations, lint patterns, asset entries, dedup,
//! component naming.

use regex::Regex;
use serde_json::{json, Map, Value};
use std::path::Path;
use std::sync::OnceLock;

use crate::config::access::{array_at_mut, is_truthy};
use crate::config::{dedupe, dedupe_by, ValueExt, ALL_ANIMATIONS, ANIMATIONS};
use crate::error::ConfigError;

/// Marks an asset entry as already resolved; the marker itself is stripped.
pub const ESCAPE_MARKER: char = '~';

/// Accepted values of `framework.autoImportComponentCase`.
pub const COMPONENT_CASES: [&str; 3] = ["kebab", "pascal", "combined"];

/// Replace an `"all"` animation request with every known animation.
pub fn expand_animations(cfg: &mut Value) {
    let animations = array_at_mut(cfg, "animations");
    if animations.iter().any(|a| a.as_str() == Some(ALL_ANIMATIONS)) {
        *animations = ANIMATIONS.iter().map(|name| json!(name)).collect();
    }
}

/// Compile `eslint.include`/`eslint.exclude` into one alternation each.
pub fn lint_patterns(cfg: &mut Value) -> Result<(), ConfigError> {
    for (list, pattern) in [("include", "__includePattern"), ("exclude", "__excludePattern")] {
        let sources: Vec<String> = array_at_mut(cfg, &format!("eslint.{list}"))
            .iter()
            .filter(|entry| is_truthy(entry))
            .map(|entry| match entry {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();

        let key = format!("eslint.{pattern}");
        if sources.is_empty() {
            cfg.remove_at(&key);
            continue;
        }
        let joined = format!("(?:{})", sources.join("|"));
        if let Err(e) = Regex::new(&joined) {
            return Err(ConfigError::ConfigValue {
                key: format!("eslint.{list}"),
                value: sources.join(", "),
                expected: format!("valid regular expressions ({e})"),
            });
        }
        cfg.set_at(&key, json!(joined));
    }
    Ok(())
}

/// Resolve an asset entry against its default folder.
pub fn resolve_asset(entry: &str, prefix: &Path) -> String {
    match entry.strip_prefix(ESCAPE_MARKER) {
        Some(verbatim) => verbatim.to_string(),
        None => prefix.join(entry).to_string_lossy().into_owned(),
    }
}

/// Normalize css, boot and ssr middleware entries.
///
/// Falsy entries are dropped, paths resolved, and duplicates by resolved
/// path removed keeping the first occurrence.
pub fn resolve_assets(cfg: &mut Value, project_root: &Path) {
    let css_root = project_root.join("src/css");
    let css = array_at_mut(cfg, "css");
    css.retain(is_truthy);
    for entry in css.iter_mut() {
        if let Value::String(path) = entry {
            *path = resolve_asset(path, &css_root);
        }
    }
    dedupe_by(css, |entry| entry.as_str().map(str::to_string));

    for (path, folder) in [("boot", "src/boot"), ("ssr.middlewares", "src-ssr/middlewares")] {
        let prefix = project_root.join(folder);
        let list = array_at_mut(cfg, path);
        let entries = std::mem::take(list);
        *list = entries.into_iter().filter_map(|entry| boot_entry(entry, &prefix)).collect();
        dedupe_by(list, |entry| entry.str_at("path").map(str::to_string));
    }
}

/// A boot-style entry as `{ path, server?, client? }`, or `None` if falsy.
fn boot_entry(entry: Value, prefix: &Path) -> Option<Value> {
    match entry {
        Value::String(path) if !path.is_empty() => Some(json!({ "path": resolve_asset(&path, prefix) })),
        Value::Object(mut map) => {
            let path = map.get("path").and_then(Value::as_str).filter(|p| !p.is_empty())?;
            let resolved = resolve_asset(path, prefix);
            map.insert("path".to_string(), json!(resolved));
            Some(Value::Object(map))
        }
        _ => None,
    }
}

/// Dedupe plain list fields by value.
pub fn dedupe_lists(cfg: &mut Value) {
    for path in [
        "extras",
        "animations",
        "framework.components",
        "framework.directives",
        "framework.plugins",
        "electron.preloadScripts",
    ] {
        dedupe(array_at_mut(cfg, path));
    }
}

/// Reset an unknown or missing component naming case to `kebab`.
pub fn component_case(cfg: &mut Value) {
    let current = cfg.str_at("framework.autoImportComponentCase");
    if current.is_some_and(|case| COMPONENT_CASES.contains(&case)) {
        return;
    }
    if let Some(case) = current {
        tracing::warn!("framework.autoImportComponentCase: unknown value {:?}, using \"kebab\"", case);
    }
    cfg.set_at("framework.autoImportComponentCase", json!("kebab"));
}

fn component_name() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^Q[A-Z][A-Za-z0-9]*$").expect("static pattern is valid"))
}

/// Register the loading spinner component, if one is configured.
pub fn register_spinner(cfg: &mut Value) {
    let Some(spinner) = cfg.str_at("framework.config.loading.spinner").map(str::to_string) else {
        return;
    };
    if !component_name().is_match(&spinner) {
        return;
    }
    let components = array_at_mut(cfg, "framework.components");
    let entry = json!(spinner);
    if !components.contains(&entry) {
        components.push(entry);
    }
}

/// Object at `path`, created if missing.
pub(crate) fn object_at<'a>(cfg: &'a mut Value, path: &str) -> &'a mut Map<String, Value> {
    if !cfg.at(path).is_some_and(Value::is_object) {
        cfg.set_at(path, Value::Object(Map::new()));
    }
    match cfg.at_mut(path) {
        Some(Value::Object(map)) => map,
        _ => unreachable!("object was just created at {path}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_all_animations() {
        let mut cfg = json!({ "animations": "all" });
        expand_animations(&mut cfg);
        assert_eq!(cfg["animations"].as_array().unwrap().len(), ANIMATIONS.len());

        let mut cfg = json!({ "animations": ["fadeIn"] });
        expand_animations(&mut cfg);
        assert_eq!(cfg["animations"], json!(["fadeIn"]));
    }

    #[test]
    fn test_lint_patterns() {
        let mut cfg = json!({ "eslint": { "include": ["src/.*", "lib/.*"], "exclude": [] } });
        lint_patterns(&mut cfg).unwrap();
        assert_eq!(cfg["eslint"]["__includePattern"], json!("(?:src/.*|lib/.*)"));
        assert!(cfg["eslint"].get("__excludePattern").is_none());
    }

    #[test]
    fn test_lint_patterns_invalid_regex() {
        let mut cfg = json!({ "eslint": { "include": ["(unclosed"] } });
        assert!(matches!(lint_patterns(&mut cfg), Err(ConfigError::ConfigValue { .. })));
    }

    #[test]
    fn test_resolve_asset_escape_marker() {
        assert_eq!(resolve_asset("~pkg/style.css", Path::new("/p/src/css")), "pkg/style.css");
        assert_eq!(resolve_asset("app.scss", Path::new("/p/src/css")), "/p/src/css/app.scss");
    }

    #[test]
    fn test_resolve_assets_filters_and_dedupes() {
        let mut cfg = json!({
            "css": ["app.scss", "", false, "app.scss", "~lib/x.css"],
            "boot": ["axios", { "path": "i18n", "server": false }, "axios", null, { "path": "" }],
            "ssr": { "middlewares": ["render"] }
        });
        resolve_assets(&mut cfg, Path::new("/p"));

        assert_eq!(cfg["css"], json!(["/p/src/css/app.scss", "lib/x.css"]));
        assert_eq!(
            cfg["boot"],
            json!([{ "path": "/p/src/boot/axios" }, { "path": "/p/src/boot/i18n", "server": false }])
        );
        assert_eq!(cfg["ssr"]["middlewares"], json!([{ "path": "/p/src-ssr/middlewares/render" }]));
    }

    #[test]
    fn test_dedupe_lists_preserves_order() {
        let mut cfg = json!({
            "extras": ["roboto", "icons", "roboto"],
            "framework": { "plugins": ["Notify", "Dialog", "Notify"] }
        });
        dedupe_lists(&mut cfg);
        assert_eq!(cfg["extras"], json!(["roboto", "icons"]));
        assert_eq!(cfg["framework"]["plugins"], json!(["Notify", "Dialog"]));
        assert_eq!(cfg["animations"], json!([]));
    }

    #[test]
    fn test_component_case() {
        let mut cfg = json!({ "framework": { "autoImportComponentCase": "pascal" } });
        component_case(&mut cfg);
        assert_eq!(cfg["framework"]["autoImportComponentCase"], json!("pascal"));

        let mut cfg = json!({ "framework": { "autoImportComponentCase": "snake" } });
        component_case(&mut cfg);
        assert_eq!(cfg["framework"]["autoImportComponentCase"], json!("kebab"));

        let mut cfg = json!({ "framework": {} });
        component_case(&mut cfg);
        assert_eq!(cfg["framework"]["autoImportComponentCase"], json!("kebab"));
    }

    #[test]
    fn test_register_spinner() {
        let mut cfg = json!({ "framework": { "components": [], "config": { "loading": { "spinner": "QSpinnerGears" } } } });
        register_spinner(&mut cfg);
        register_spinner(&mut cfg);
        assert_eq!(cfg["framework"]["components"], json!(["QSpinnerGears"]));

        let mut cfg = json!({ "framework": { "components": [], "config": { "loading": { "spinner": "my-spinner" } } } });
        register_spinner(&mut cfg);
        assert_eq!(cfg["framework"]["components"], json!([]));
    }

    #[test]
    fn test_object_at_replaces_scalars() {
        let mut cfg = json!({ "ssr": true });
        object_at(&mut cfg, "ssr").insert("pwa".into(), json!(false));
        assert_eq!(cfg, json!({ "ssr": { "pwa": false } }));
    }
}
