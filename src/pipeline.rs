//! Downstream asset-pipeline generator interface.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;
use crate::error::BoxError;

/// Turns a canonical configuration into the pipeline builder's own configuration.
///
/// Called on the first cycle of a session and whenever a later cycle's
/// change affects the pipeline.
#[async_trait(?Send)]
pub trait PipelineGenerator {
    async fn generate(&self, config: &Config) -> Result<Value, BoxError>;
}

/// Generator that hands back the canonical configuration unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

#[async_trait(?Send)]
impl PipelineGenerator for Passthrough {
    async fn generate(&self, config: &Config) -> Result<Value, BoxError> {
        Ok(config.as_value().clone())
    }
}
