//! Studio data model shared by the agent service and its clients
//!
//! Wire format is camelCase JSON throughout, matching the front end.

mod asset;
mod concept;
mod job;
mod payload;

pub use asset::{
    AssetFormat, CampaignStatus, GeneratedCampaign, ImageQuality, MemoryStatus, Observability,
};
pub use concept::{CreativeConcept, Evaluation};
pub use job::{estimate_next_progress, Job, JobStatus, JOB_FAILED_MESSAGE, PROGRESS_ESTIMATE_CEILING};
pub use payload::{
    AgentStatusEntry, AlertData, AlertSeverity, ComponentData, ComponentType, PermissionData,
    SelectionCardData, StatusBarData, StatusState, TextData, WorkflowPayload,
};
