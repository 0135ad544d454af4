//! Workflow orchestration
//!
//! The two request pipelines, the retry/failover executor that wraps
//! generation calls, and the job poller that finalizes deferred renders.
//! Pipelines report progress through a [`ProgressSink`] rather than touching
//! session state directly.

pub mod asset_pipeline;
pub mod concept_pipeline;
pub mod failover;
pub mod job_poller;

pub use asset_pipeline::{AssetOutcome, AssetPipeline, AssetSettings, AssetStage};
pub use concept_pipeline::{rank_concepts, ConceptOutcome, ConceptPipeline, ConceptSettings, ConceptStage};
pub use failover::{FailoverExecutor, Recovered, RecoveryMetrics, RetryNotice};
pub use job_poller::{CompletionCallback, JobHandle, JobPoller, PollingPolicy};

use studio_common::models::WorkflowPayload;

/// How a payload is merged into session history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    /// Replace the last entry if it has the same component type
    Upsert,
    /// Always add a new entry
    Append,
}

/// Receives payloads as a pipeline advances
pub trait ProgressSink: Send + Sync {
    fn emit(&self, mode: EmitMode, payload: WorkflowPayload);

    /// The run's final payload has been emitted
    fn settle(&self);
}

impl<T: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<T> {
    fn emit(&self, mode: EmitMode, payload: WorkflowPayload) {
        (**self).emit(mode, payload)
    }

    fn settle(&self) {
        (**self).settle()
    }
}
