//! Extension hooks run once per normalization cycle.
//!
//! Extensions are registered on an [`ExtensionRunner`]. Every cycle calls
//! [`ExtensionRunner::run_hook`] with [`EXTEND_CONFIG_HOOK`]; each extension
//! is awaited in registration order and may mutate the in-progress
//! configuration tree.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BoxError, ConfigError};

/// Hook name for configuration extension.
pub const EXTEND_CONFIG_HOOK: &str = "extendConfig";

/// Identifies the extension a hook invocation belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDescriptor {
    /// Owning extension id
    pub id: String,
    /// Hook being run
    pub hook: &'static str,
}

/// An installed app extension
#[async_trait(?Send)]
pub trait Extension {
    /// Unique extension id
    fn id(&self) -> &str;

    /// Mutate the in-progress configuration.
    async fn extend_config(&self, config: &mut Value, hook: &HookDescriptor) -> Result<(), BoxError>;
}

/// Runs hooks across registered extensions, sequentially.
#[derive(Default)]
pub struct ExtensionRunner {
    extensions: Vec<Box<dyn Extension>>,
}

impl std::fmt::Debug for ExtensionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.extensions.iter().map(|e| e.id()).collect();
        f.debug_struct("ExtensionRunner").field("extensions", &ids).finish()
    }
}

impl ExtensionRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an extension; hooks run in registration order.
    pub fn register(&mut self, extension: impl Extension + 'static) {
        self.extensions.push(Box::new(extension));
    }

    /// Run `hook` for every extension over `config`, stopping at the first failure.
    pub async fn run_hook(&self, hook: &'static str, config: &mut Value) -> Result<(), ConfigError> {
        for extension in &self.extensions {
            let descriptor = HookDescriptor { id: extension.id().to_string(), hook };
            tracing::info!("Extension({}): running {} hook", descriptor.id, hook);
            let result = match hook {
                EXTEND_CONFIG_HOOK => extension.extend_config(config, &descriptor).await,
                _ => Ok(()),
            };
            result.map_err(|e| ConfigError::Extension { id: descriptor.id.clone(), message: e.to_string() })?;
        }
        Ok(())
    }
}
