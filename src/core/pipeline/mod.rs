//! Extract -> transform -> load pipeline.
//!
//! - **stages**: collaborator traits (`Extractor`, `Transformer`, `Loader`)
//! - **extract**, **transform**, **load**: default CSV / cleaning / JSON-lines stages
//! - **sink**: observability event sinks
//! - **worker**: per-file driver and worker pool
//! - **orchestrator**: lifecycle and shutdown

pub mod extract;
pub mod load;
pub mod orchestrator;
pub mod sink;
pub mod stages;
pub mod transform;
pub mod worker;

pub use extract::CsvExtractor;
pub use load::JsonLinesLoader;
pub use orchestrator::{Orchestrator, RunMode, RunSummary};
pub use sink::{EventSink, FanoutSink, JsonLinesSink, TracingSink};
pub use stages::{Extractor, Loader, PassthroughTransformer, PipelineStages, Transformer};
pub use transform::CleaningTransformer;
pub use worker::{PipelineDriver, PipelineStats, StatsSnapshot, WorkerPool};
