//! Config normalization
//!
//! Merges the factory result over the default skeleton and derives the
//! computed fields. The rules run in a fixed order; each may read what an
//! earlier rule produced:
//!
//! 1. build-time constants
//! 2. lint include/exclude patterns
//! 3. asset lists (css, boot, ssr middlewares)
//! 4. plain list dedup
//! 5. component naming case
//! 6. spinner component registration
//! 7. build defaults and mode overrides
//! 8. output directory
//! 9. public path, router base, app base
//! 10. source file conventions and template variables
//! 11. mode blocks (ssr, dev server, pwa, electron, bex)
//! 12. global define table
//!
//! Env file resolution and address negotiation are asynchronous and run
//! from the cycle driver in [`crate::config_file`].

pub mod address;
pub mod assets;
pub mod build;
pub mod env;
pub mod modes;

pub use address::{requested_address, resolve_address, AddressNegotiator, PortProbe, DEFAULT_HOST, DEFAULT_PORT};
pub use env::{DotenvResolver, EnvRequest, EnvResolver};

use serde_json::Value;
use std::path::Path;

use crate::config::{default_skeleton, merge, Context, PackageMeta, ValueExt};
use crate::error::ConfigError;

/// Tables the skeleton leaves empty but later rules write into.
const NESTED_SECTIONS: [&str; 2] = ["devServer.server", "electron.builder.directories"];

/// What the derivations read besides the configuration itself
#[derive(Debug, Clone, Copy)]
pub struct Environment<'a> {
    /// Directory holding the config script
    pub project_root: &'a Path,
    /// `package.json` metadata
    pub package: &'a PackageMeta,
    /// Dev-server live reload requested by the caller
    pub live_reload: bool,
}

/// Serialized context, as injected under `ctx`.
pub fn context_value(ctx: &Context) -> Value {
    serde_json::to_value(ctx).unwrap_or_default()
}

/// Merge the user configuration over a fresh skeleton and expand animations.
pub fn prepare(user: Value, ctx: &Context) -> Value {
    let mut cfg = default_skeleton();
    merge(&mut cfg, user);
    cfg.set_at("ctx", context_value(ctx));
    assets::expand_animations(&mut cfg);
    cfg
}

/// Apply every synchronous derivation rule, in order.
///
/// `ctx` may gain the pwa flag when server rendering enables it.
pub fn derive(cfg: &mut Value, ctx: &mut Context, env: &Environment<'_>) -> Result<(), ConfigError> {
    let root = env.project_root;

    check_sections(cfg)?;
    build::apply_defines(cfg, ctx);
    assets::lint_patterns(cfg)?;
    assets::resolve_assets(cfg, root);
    assets::dedupe_lists(cfg);
    assets::component_case(cfg);
    assets::register_spinner(cfg);

    build::apply_build_defaults(cfg, ctx, env.package);
    build::resolve_dist_dir(cfg, ctx, root);
    build::resolve_public_path(cfg, ctx);
    build::resolve_source_files(cfg, root);
    build::html_variables(cfg);

    modes::ssr_block(cfg, ctx);
    modes::dev_server_block(cfg, ctx, root, env.live_reload);
    modes::pwa_block(cfg, ctx, env.package)?;
    modes::electron_block(cfg, ctx, root, env.package)?;
    modes::bex_block(cfg, ctx, root);

    env::apply_raw_define(cfg, ctx);
    cfg.set_at("ctx", context_value(ctx));
    Ok(())
}

/// Reject scalars and lists where the skeleton declares a table.
pub fn check_sections(cfg: &Value) -> Result<(), ConfigError> {
    check_against(&default_skeleton(), cfg, "")?;
    for path in NESTED_SECTIONS {
        if let Some(found) = cfg.at(path) {
            expect_table(path, found)?;
        }
    }
    Ok(())
}

fn check_against(skeleton: &Value, cfg: &Value, prefix: &str) -> Result<(), ConfigError> {
    let Some(defaults) = skeleton.as_object() else {
        return Ok(());
    };
    for (key, default) in defaults {
        if !default.is_object() {
            continue;
        }
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        if let Some(found) = cfg.get(key.as_str()) {
            expect_table(&path, found)?;
            check_against(default, found, &path)?;
        }
    }
    Ok(())
}

fn expect_table(path: &str, found: &Value) -> Result<(), ConfigError> {
    if found.is_object() {
        return Ok(());
    }
    Err(ConfigError::ConfigValue {
        key: path.to_string(),
        value: found.to_string(),
        expected: "a table".to_string(),
    })
}
