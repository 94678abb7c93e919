//! Loads compiled artifacts and extracts the config factory.
//!
//! One interpreter state lives for the whole session. Loads are tracked in a
//! versioned registry keyed by artifact path: invalidating an entry bumps
//! its version and drops the cached export together with every bundled
//! module the interpreter cached for it, so stale code is never reused.

use mlua::{Function, Lua, LuaSerdeExt, RegistryKey, Table, Value as LuaValue};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Context;
use crate::error::{ConfigError, SchemaViolation};
use crate::script::compiler::CompiledScript;
use crate::script::value::{to_json, ChunkSource};

/// The effective export of a loaded script
#[derive(Debug, Clone)]
pub enum FactoryExport {
    /// A callable factory
    Valid(Function),
    /// Anything else; carries the offending type name
    WrongShape(String),
}

impl FactoryExport {
    /// Turn the export into a factory or a schema error.
    pub fn into_factory(self) -> Result<Function, ConfigError> {
        match self {
            FactoryExport::Valid(function) => Ok(function),
            FactoryExport::WrongShape(found) => Err(SchemaViolation::NotAFunction(found).into()),
        }
    }
}

/// Outcome of invoking the factory
#[derive(Debug, Clone, PartialEq)]
pub enum FactoryResult {
    /// The factory returned a table
    Object(Value),
    /// The factory returned something else
    NotAnObject(String),
}

/// One cached load of an artifact path.
#[derive(Debug)]
struct LoadedModule {
    version: u64,
    export: RegistryKey,
    modules: Vec<String>,
    chunk_name: String,
    source: Arc<str>,
}

/// Removes the artifact when dropped, on every exit path.
struct ArtifactGuard<'a>(&'a Path);

impl Drop for ArtifactGuard<'_> {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs::remove_file(self.0) {
                tracing::warn!("Could not remove {}: {}", self.0.display(), e);
            }
        }
    }
}

/// Versioned registry of loaded config modules.
pub struct ModuleRegistry {
    lua: Lua,
    entries: HashMap<PathBuf, LoadedModule>,
    versions: HashMap<PathBuf, u64>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry").field("versions", &self.versions).finish_non_exhaustive()
    }
}

impl ModuleRegistry {
    /// Create a registry with a fresh interpreter state.
    pub fn new() -> Self {
        Self { lua: Lua::new(), entries: HashMap::new(), versions: HashMap::new() }
    }

    /// Current load version of an artifact path (0 if never loaded).
    pub fn version(&self, artifact: &Path) -> u64 {
        self.versions.get(artifact).copied().unwrap_or(0)
    }

    /// Whether a load of `artifact` is currently cached.
    pub fn is_loaded(&self, artifact: &Path) -> bool {
        self.entries.contains_key(artifact)
    }

    /// Drop any cached load of `artifact` and bump its version.
    pub fn invalidate(&mut self, artifact: &Path) {
        *self.versions.entry(artifact.to_path_buf()).or_insert(0) += 1;
        let Some(previous) = self.entries.remove(artifact) else {
            return;
        };
        tracing::debug!("Invalidating {} (version {})", artifact.display(), previous.version);
        if let Err(e) = self.forget_modules(&previous.modules) {
            tracing::warn!("Could not clear cached modules of {}: {}", artifact.display(), e);
        }
        if let Err(e) = self.lua.remove_registry_value(previous.export) {
            tracing::warn!("Could not release export of {}: {}", artifact.display(), e);
        }
    }

    fn forget_modules(&self, modules: &[String]) -> mlua::Result<()> {
        let package: Table = self.lua.globals().get("package")?;
        let loaded: Table = package.get("loaded")?;
        let preload: Table = package.get("preload")?;
        for id in modules {
            loaded.set(id.as_str(), LuaValue::Nil)?;
            preload.set(id.as_str(), LuaValue::Nil)?;
        }
        Ok(())
    }

    /// Load a compiled artifact and extract its factory.
    ///
    /// The artifact file is removed before this returns, whatever the outcome.
    pub fn load(&mut self, compiled: &CompiledScript) -> Result<FactoryExport, ConfigError> {
        let artifact = compiled.artifact.as_path();
        let _guard = ArtifactGuard(artifact);
        self.invalidate(artifact);

        let load_error = |message: String| ConfigError::Load { artifact: artifact.to_path_buf(), message };
        let text = fs::read_to_string(artifact).map_err(|e| load_error(e.to_string()))?;
        let chunk_name = format!("={}", artifact.display());
        let exported: LuaValue =
            self.lua.load(text.as_str()).set_name(chunk_name.as_str()).eval().map_err(|e| load_error(e.to_string()))?;

        let effective = match &exported {
            LuaValue::Table(table) => match table.get::<LuaValue>("default") {
                Ok(LuaValue::Nil) | Err(_) => exported.clone(),
                Ok(default) => default,
            },
            _ => exported.clone(),
        };

        let export = match &effective {
            LuaValue::Function(function) => FactoryExport::Valid(function.clone()),
            other => FactoryExport::WrongShape(other.type_name().to_string()),
        };

        let key = self.lua.create_registry_value(effective).map_err(|e| load_error(e.to_string()))?;
        let version = self.version(artifact);
        self.entries.insert(
            artifact.to_path_buf(),
            LoadedModule {
                version,
                export: key,
                modules: compiled.modules.clone(),
                chunk_name,
                source: Arc::from(text),
            },
        );
        tracing::debug!("Loaded {} (version {})", artifact.display(), version);
        Ok(export)
    }

    /// Invoke a factory with the context, awaiting it, and convert the result.
    pub async fn call_factory(
        &self,
        artifact: &Path,
        factory: &Function,
        ctx: &Context,
    ) -> Result<FactoryResult, ConfigError> {
        let runtime = |e: mlua::Error| ConfigError::Runtime(e.to_string());
        let ctx_value = self.lua.to_value(ctx).map_err(runtime)?;
        let returned: LuaValue = factory.call_async(ctx_value).await.map_err(runtime)?;

        if !matches!(returned, LuaValue::Table(_)) {
            return Ok(FactoryResult::NotAnObject(returned.type_name().to_string()));
        }

        let (name, text) = match self.entries.get(artifact) {
            Some(module) => (module.chunk_name.as_str(), module.source.as_ref()),
            None => ("", ""),
        };
        match to_json(&returned, ChunkSource { name, text }).map_err(ConfigError::Runtime)? {
            value @ Value::Object(_) => Ok(FactoryResult::Object(value)),
            // sequence tables convert to arrays
            _ => Ok(FactoryResult::NotAnObject("array".to_string())),
        }
    }
}
