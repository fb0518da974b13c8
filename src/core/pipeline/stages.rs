//! Pipeline stage interfaces
//!
//! Each stage is an async trait object so alternative sources, cleaning
//! rules or sinks can be plugged in without touching the worker loop.
//! Implementations report failures with the matching `PipeError`
//! variant; the worker treats any error as a failure of that stage.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::types::Dataset;

/// Reads one file into a dataset
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Short name for logs (e.g., "csv")
    fn name(&self) -> &str;

    async fn extract(&self, path: &Path) -> Result<Dataset>;
}

/// Cleans or derives a dataset
#[async_trait]
pub trait Transformer: Send + Sync {
    fn name(&self) -> &str;

    async fn transform(&self, data: Dataset) -> Result<Dataset>;
}

/// Durably persists a dataset
///
/// Returns the number of records written. A load must be all-or-nothing
/// from the caller's point of view: on error nothing is considered
/// persisted and the file stays unprocessed.
#[async_trait]
pub trait Loader: Send + Sync {
    fn name(&self) -> &str;

    async fn load(&self, data: &Dataset) -> Result<usize>;
}

/// The three collaborators driven by every worker
#[derive(Clone)]
pub struct PipelineStages {
    pub extractor: Arc<dyn Extractor>,
    pub transformer: Arc<dyn Transformer>,
    pub loader: Arc<dyn Loader>,
}

impl PipelineStages {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        transformer: Arc<dyn Transformer>,
        loader: Arc<dyn Loader>,
    ) -> Self {
        Self {
            extractor,
            transformer,
            loader,
        }
    }

    /// Stage names joined for logging, e.g. "csv -> cleaning -> jsonl"
    pub fn describe(&self) -> String {
        format!(
            "{} -> {} -> {}",
            self.extractor.name(),
            self.transformer.name(),
            self.loader.name()
        )
    }
}

/// Transformer that passes data through untouched
pub struct PassthroughTransformer;

#[async_trait]
impl Transformer for PassthroughTransformer {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn transform(&self, data: Dataset) -> Result<Dataset> {
        Ok(data)
    }
}
