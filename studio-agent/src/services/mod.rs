//! Remote service clients
//!
//! - [`contract`]: the creative backend operations the pipelines call
//! - [`http_service`] / [`canned`]: live and offline implementations
//! - [`workflow_client`]: whole-request submission with offline fallback

pub mod canned;
pub mod contract;
pub mod http_service;
pub mod workflow_client;

pub use canned::CannedCreativeService;
pub use contract::{
    ComplianceRequest, ComplianceVerdict, CreativeService, EvaluationRequest, GenerationResponse,
    GuidelineResponse, GuidelineSource, ImageRequest, JobPollResponse, RemoteJobState,
    SynthesisRequest, SynthesisResponse, TriageCategory, TriageVerdict, VideoRequest,
    VoiceoverRequest,
};
pub use http_service::HttpCreativeService;
pub use workflow_client::{
    CannedWorkflowClient, FallbackWorkflowClient, HttpWorkflowClient, WorkflowClient,
    WorkflowSettings, WorkflowSubmission,
};
