//! Build options: constants, defaults, mode overrides, output directory,
//! public path and source file conventions.

use regex::Regex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::access::ensure_object;
use crate::config::{merge, Context, PackageMeta, ValueExt};

/// Staging subdirectory of electron and bex builds.
pub const UNPACKAGED_DIR: &str = "UnPackaged";

/// Extensions probed for the store entry (none first).
const STORE_EXTENSIONS: [&str; 4] = ["", ".js", ".ts", ".mjs"];

/// Build-time constant table and the debugging flag.
pub fn apply_defines(cfg: &mut Value, ctx: &Context) {
    let debugging = ctx.dev || ctx.debug;
    let ssr_pwa = ctx.mode.ssr && cfg.truthy_at("ssr.pwa");
    cfg.set_at("__meta.debugging", json!(debugging));
    cfg.set_at(
        "__meta.defines",
        json!({
            "__APP_DEV__": ctx.dev,
            "__APP_PROD__": ctx.prod,
            "__APP_DEBUG__": debugging,
            "__APP_SSR__": ctx.mode.ssr,
            "__APP_SSR_PWA__": ssr_pwa,
            "__APP_DEVTOOLS__": ctx.dev || ctx.debug,
        }),
    );
}

/// Merge build defaults under the user's build options, then apply mode overrides.
pub fn apply_build_defaults(cfg: &mut Value, ctx: &Context, package: &PackageMeta) {
    let mut build = json!({
        "productName": package.product_name(),
        "productDescription": package.description(),
        "minify": ctx.prod,
        "sourcemap": ctx.dev,
        "extractCss": ctx.prod,
        "gzip": false,
        "analyze": false,
        "distDir": format!("dist/{}", ctx.mode_name),
        "vueRouterMode": "hash",
        "htmlFilename": "index.html",
        "ssrPwaHtmlFilename": "offline.html",
        "htmlMinifyOptions": {
            "removeComments": true,
            "collapseWhitespace": true,
            "removeAttributeQuotes": true,
            "collapseBooleanAttributes": true,
            "removeScriptTypeAttributes": true
        }
    });
    merge(&mut build, cfg.remove_at("build").unwrap_or(Value::Null));

    let overrides = ensure_object(&mut build);
    if ctx.dev {
        overrides.insert("minify".into(), json!(false));
        overrides.insert("gzip".into(), json!(false));
    }
    if ctx.debug {
        overrides.insert("sourcemap".into(), json!(true));
    }
    if ctx.mode.ssr {
        overrides.insert("vueRouterMode".into(), json!("history"));
        overrides.insert("gzip".into(), json!(false));
    }
    if ctx.mode_name.is_shell() {
        overrides.insert("htmlFilename".into(), json!("index.html"));
        overrides.insert("vueRouterMode".into(), json!("hash"));
        overrides.insert("gzip".into(), json!(false));
    }

    let banner = format!(
        "/*!\n * {} v{}\n * Built for {} ({})\n */",
        build.str_at("productName").unwrap_or_default(),
        package.version(),
        ctx.mode_name,
        ctx.build_type(),
    );
    cfg.set_at("build", build);
    cfg.set_at("__meta.banner", json!(banner));
}

/// Resolve `build.distDir`, nesting shell targets and staging electron/bex output.
pub fn resolve_dist_dir(cfg: &mut Value, ctx: &Context, project_root: &Path) {
    let configured = cfg.text_at("build.distDir").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("dist"));
    let mut dist = if configured.is_absolute() { configured } else { project_root.join(configured) };

    if ctx.mode_name.is_shell() {
        if let Some(target) = &ctx.target_name {
            dist = dist.join(target);
        }
    }
    if ctx.mode_name.is_staged() {
        cfg.set_at("__meta.packagedDistDir", json!(dist.to_string_lossy()));
        dist = dist.join(UNPACKAGED_DIR);
    }
    cfg.set_at("build.distDir", json!(dist.to_string_lossy()));
}

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z][A-Za-z0-9+.\-]*:)?//[^/]*(?P<path>/.*)?$").expect("static pattern is valid")
    })
}

/// Whether `s` is an absolute URL (`scheme://` or protocol-relative `//`).
pub fn is_absolute_url(s: &str) -> bool {
    url_pattern().is_match(s)
}

/// Normalize a public path: trailing separator always, leading one unless it is a URL.
pub fn format_public_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut out = path.to_string();
    if !out.ends_with('/') {
        out.push('/');
    }
    if is_absolute_url(&out) || out.starts_with('/') {
        return out;
    }
    format!("/{out}")
}

/// Router base for a public path: the URL path component, or the path itself.
fn router_base_for(public_path: &str) -> String {
    let base = match url_pattern().captures(public_path) {
        Some(caps) => caps.name("path").map_or("", |m| m.as_str()).to_string(),
        None => public_path.to_string(),
    };
    if base.is_empty() {
        "/".to_string()
    } else {
        base
    }
}

/// Derive `publicPath`, `vueRouterBase` and `appBase`.
pub fn resolve_public_path(cfg: &mut Value, ctx: &Context) {
    let hash = cfg.str_at("build.vueRouterMode") == Some("hash");
    let public_path = match cfg.text_at("build.publicPath") {
        Some(path) if ctx.mode_name.serves_from_path() => format_public_path(path),
        _ if hash => String::new(),
        _ => "/".to_string(),
    };

    if cfg.str_at("build.vueRouterBase").is_none() {
        cfg.set_at("build.vueRouterBase", json!(router_base_for(&public_path)));
    }
    if cfg.str_at("build.appBase").is_none() {
        cfg.set_at("build.appBase", json!(public_path));
    }
    cfg.set_at("build.publicPath", json!(public_path));
}

/// Merge source file conventions under user overrides and detect the store.
pub fn resolve_source_files(cfg: &mut Value, project_root: &Path) {
    let mut files = json!({
        "rootComponent": "src/App.vue",
        "router": "src/router/index",
        "store": "src/stores/index",
        "indexHtmlTemplate": "index.html",
        "pwaRegisterServiceWorker": "src-pwa/register-service-worker",
        "pwaServiceWorker": "src-pwa/custom-service-worker",
        "pwaManifestFile": "src-pwa/manifest.json",
        "electronMain": "src-electron/electron-main",
        "electronPreload": "src-electron/electron-preload"
    });
    merge(&mut files, cfg.remove_at("sourceFiles").unwrap_or(Value::Null));

    let store = files.text_at("store").and_then(|entry| find_store(&project_root.join(entry)));
    cfg.set_at("__meta.hasStore", json!(store.is_some()));
    if let Some(store) = store {
        cfg.set_at("__meta.storeFile", json!(store.to_string_lossy()));
    }
    cfg.set_at("sourceFiles", files);
}

fn find_store(base: &Path) -> Option<PathBuf> {
    STORE_EXTENSIONS.iter().map(|ext| PathBuf::from(format!("{}{}", base.display(), ext))).find(|p| p.is_file())
}

/// Template variables default to the product name and description.
pub fn html_variables(cfg: &mut Value) {
    let mut vars = json!({
        "productName": cfg.str_at("build.productName").unwrap_or_default(),
        "productDescription": cfg.str_at("build.productDescription").unwrap_or_default(),
    });
    merge(&mut vars, cfg.remove_at("htmlVariables").unwrap_or(Value::Null));
    cfg.set_at("htmlVariables", vars);
}
