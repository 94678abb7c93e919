//! Per-mode option blocks, merged with their defaults only when the mode is active.

use serde_json::{json, Map, Value};
use std::path::Path;

use super::assets::object_at;
use super::build::is_absolute_url;
use crate::config::access::{array_at_mut, ensure_object};
use crate::config::{dedupe, merge, Context, PackageMeta, ValueExt};
use crate::error::ConfigError;

/// Endpoint the dev server exposes for opening files in the editor.
pub const OPEN_IN_EDITOR_ENDPOINT: &str = "/__open-in-editor";

/// Accepted `pwa.workboxMode` values.
pub const WORKBOX_MODES: [&str; 2] = ["GenerateSW", "InjectManifest"];

/// Accepted `electron.bundler` values.
pub const ELECTRON_BUNDLERS: [&str; 2] = ["packager", "builder"];

/// Thirty days, in milliseconds.
const SSR_MAX_AGE_MS: u64 = 1000 * 60 * 60 * 24 * 30;

/// Replace the subtree at `key` with `defaults` merged under it.
fn merge_defaults(cfg: &mut Value, key: &str, mut defaults: Value) {
    merge(&mut defaults, cfg.remove_at(key).unwrap_or(Value::Null));
    cfg.set_at(key, defaults);
}

/// Server-rendering options; `ssr.pwa` turns on the installable-web-app flag.
pub fn ssr_block(cfg: &mut Value, ctx: &mut Context) {
    if !ctx.mode.ssr {
        return;
    }
    merge_defaults(
        cfg,
        "ssr",
        json!({
            "pwa": false,
            "manualStoreHydration": false,
            "manualPostHydrationTrigger": false,
            "prodPort": 3000,
            "maxAge": SSR_MAX_AGE_MS
        }),
    );
    if cfg.truthy_at("ssr.pwa") {
        ctx.mode.pwa = true;
    }
}

/// Dev-server options and the resolved application URL (development only).
///
/// `devServer.host`/`devServer.port` must already hold the negotiated address.
pub fn dev_server_block(cfg: &mut Value, ctx: &Context, project_root: &Path, live_reload: bool) {
    if !ctx.dev {
        return;
    }
    let public_path = cfg.str_at("build.publicPath").unwrap_or_default().to_string();
    let history_fallback = if cfg.str_at("build.vueRouterMode") == Some("history") {
        let html = cfg.str_at("build.htmlFilename").unwrap_or("index.html");
        json!({ "index": format!("{public_path}{html}") })
    } else {
        json!(false)
    };

    let mut user = cfg.remove_at("devServer").unwrap_or_else(|| json!({}));
    translate_legacy_https(&mut user);

    let mut server = json!({
        "open": true,
        "hmr": live_reload,
        "compress": true,
        "static": {
            "directory": project_root.join("public").to_string_lossy(),
            "publicPath": public_path,
            "watch": false
        },
        "historyApiFallback": history_fallback,
        "server": { "type": "http" }
    });
    merge(&mut server, user);
    ensure_object(&mut server).insert("__openInEditor".into(), json!(OPEN_IN_EDITOR_ENDPOINT));

    let protocol = if server.str_at("server.type") == Some("https") { "https" } else { "http" };
    let host = match server.str_at("host") {
        None | Some("0.0.0.0") => "localhost",
        Some(host) => host,
    };
    let port = server.at("port").and_then(Value::as_u64).unwrap_or(0);
    let url = format!("{protocol}://{host}:{port}{public_path}");

    cfg.set_at("devServer", server);
    cfg.set_at("__meta.appUrl", json!(url));
}

/// Turn a legacy `https` flag into `server = { type = "https", ... }`.
///
/// An explicit `server` always wins; `https` is removed either way.
fn translate_legacy_https(dev_server: &mut Value) {
    let Some(https) = dev_server.remove_at("https") else {
        return;
    };
    if dev_server.at("server").is_some() {
        return;
    }
    let server = match https {
        Value::Bool(false) | Value::Null => return,
        Value::Object(options) if !options.is_empty() => json!({ "type": "https", "options": options }),
        _ => json!({ "type": "https" }),
    };
    dev_server.set_at("server", server);
}

/// Installable-web-app options: manifest, meta variables and icon paths.
pub fn pwa_block(cfg: &mut Value, ctx: &Context, package: &PackageMeta) -> Result<(), ConfigError> {
    if !ctx.mode.pwa {
        return Ok(());
    }
    let product_name = cfg.str_at("build.productName").unwrap_or_else(|| package.product_name()).to_string();
    let description = cfg.str_at("build.productDescription").unwrap_or_else(|| package.description()).to_string();

    merge_defaults(
        cfg,
        "pwa",
        json!({
            "workboxMode": "GenerateSW",
            "swFilename": "sw.js",
            "manifestFilename": "manifest.json",
            "injectPwaMetaTags": true,
            "useCredentialsForManifestTag": false,
            "manifest": {
                "name": product_name,
                "short_name": product_name,
                "description": description,
                "display": "standalone",
                "start_url": ".",
                "orientation": "portrait",
                "background_color": "#ffffff",
                "theme_color": "#027be3"
            },
            "metaVariables": {
                "appleMobileWebAppCapable": "yes",
                "appleMobileWebAppStatusBarStyle": "default",
                "appleTouchIcon120": "icons/apple-icon-120x120.png",
                "appleTouchIcon180": "icons/apple-icon-180x180.png",
                "appleTouchIcon152": "icons/apple-icon-152x152.png",
                "appleTouchIcon167": "icons/apple-icon-167x167.png",
                "appleSafariPinnedTab": "icons/safari-pinned-tab.svg",
                "msapplicationTileImage": "icons/ms-icon-144x144.png",
                "msapplicationTileColor": "#000000"
            }
        }),
    );

    let mode = cfg.str_at("pwa.workboxMode").unwrap_or_default();
    if !WORKBOX_MODES.contains(&mode) {
        return Err(ConfigError::invalid_value("pwa.workboxMode", mode, &WORKBOX_MODES));
    }

    let public_path = cfg.str_at("build.publicPath").unwrap_or_default().to_string();
    let icons = array_at_mut(cfg, "pwa.manifest.icons");
    if icons.is_empty() {
        return Err(ConfigError::Manifest("pwa.manifest.icons must list at least one icon".to_string()));
    }
    for icon in icons.iter_mut() {
        let Some(Value::String(src)) = icon.get_mut("src") else {
            continue;
        };
        if !is_absolute_url(src) {
            *src = format!("{public_path}{src}");
        }
    }
    Ok(())
}

/// Desktop-shell options for either packaging backend.
pub fn electron_block(
    cfg: &mut Value,
    ctx: &Context,
    project_root: &Path,
    package: &PackageMeta,
) -> Result<(), ConfigError> {
    if !ctx.mode.electron {
        return Ok(());
    }
    merge_defaults(cfg, "electron", json!({ "bundler": "packager", "inspectPort": 5858 }));

    let bundler = cfg.str_at("electron.bundler").unwrap_or_default().to_string();
    if !ELECTRON_BUNDLERS.contains(&bundler.as_str()) {
        return Err(ConfigError::invalid_value("electron.bundler", bundler, &ELECTRON_BUNDLERS));
    }

    let preload = array_at_mut(cfg, "electron.preloadScripts");
    if preload.is_empty() {
        preload.push(json!("electron-preload"));
    }
    dedupe(preload);

    let dist = cfg.str_at("build.distDir").unwrap_or_default().to_string();
    let packaged = cfg.str_at("__meta.packagedDistDir").map(str::to_string).unwrap_or_else(|| dist.clone());
    let output = Path::new(&packaged).join("Packaged").to_string_lossy().into_owned();
    let product_name = cfg.str_at("build.productName").unwrap_or_else(|| package.product_name()).to_string();
    let target = ctx.target_name.as_deref();

    if bundler == "packager" {
        merge_defaults(
            cfg,
            "electron.packager",
            json!({
                "asar": true,
                "icon": project_root.join("src-electron/icons/icon").to_string_lossy(),
                "overwrite": true
            }),
        );
        let packager = object_at(cfg, "electron.packager");
        packager.insert("dir".into(), json!(dist));
        packager.insert("out".into(), json!(output));
        match target {
            Some("all") => {
                packager.insert("all".into(), json!(true));
            }
            Some(platform) => {
                packager.insert("platform".into(), json!(platform));
            }
            None => {}
        }
        if let Some(arch) = &ctx.arch_name {
            packager.insert("arch".into(), json!(arch));
        }
    } else {
        let app_id = package.name.as_deref().unwrap_or("app").to_string();
        merge_defaults(
            cfg,
            "electron.builder",
            json!({
                "appId": app_id,
                "productName": product_name,
                "directories": {
                    "buildResources": project_root.join("src-electron").to_string_lossy()
                }
            }),
        );
        let builder = object_at(cfg, "electron.builder");
        let mut directories = builder.remove("directories").unwrap_or_else(|| json!({}));
        let paths = ensure_object(&mut directories);
        paths.insert("app".into(), json!(dist));
        paths.insert("output".into(), json!(output));
        builder.insert("directories".into(), directories);
        builder.insert("__targets".into(), builder_targets(target));
        if let Some(arch) = &ctx.arch_name {
            builder.insert("__arch".into(), json!(arch));
        }
    }
    Ok(())
}

/// Platform flags for the builder backend.
fn builder_targets(target: Option<&str>) -> Value {
    let mut flags = Map::new();
    let all = target == Some("all");
    flags.insert("mac".into(), json!(all || matches!(target, Some("mac" | "darwin" | "mas"))));
    flags.insert("linux".into(), json!(all || target == Some("linux")));
    flags.insert("win".into(), json!(all || matches!(target, Some("win" | "win32"))));
    Value::Object(flags)
}

/// Browser-extension input/output wiring.
pub fn bex_block(cfg: &mut Value, ctx: &Context, project_root: &Path) {
    if !ctx.mode.bex {
        return;
    }
    let output = cfg.str_at("build.distDir").unwrap_or_default().to_string();
    let packaged = cfg.str_at("__meta.packagedDistDir").map(str::to_string).unwrap_or_else(|| output.clone());
    cfg.set_at(
        "bex.__dir",
        json!({
            "input": project_root.join("src-bex").to_string_lossy(),
            "output": output,
            "packaged": packaged
        }),
    );
}
