//! Remote creative-generation service contract
//!
//! One method per remote operation the pipelines depend on. Wire shapes are
//! camelCase JSON; implementations live in [`super::http_service`] (live
//! backend) and [`super::canned`] (offline data).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studio_common::models::{CreativeConcept, Evaluation, ImageQuality};
use studio_common::Result;

/// Triage classifier verdict category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriageCategory {
    CreativeRequest,
    SafetyViolation,
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageVerdict {
    pub category: TriageCategory,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRequest {
    pub agent_id: String,
    pub task_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceVerdict {
    pub approved: bool,
    #[serde(default)]
    pub reason: String,
}

/// Which guideline store to query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuidelineSource {
    /// Full brand knowledge base
    Primary,
    /// Narrower cached subset
    Backup,
}

impl GuidelineSource {
    pub fn as_str(self) -> &'static str {
        match self {
            GuidelineSource::Primary => "primary",
            GuidelineSource::Backup => "backup",
        }
    }
}

/// Guideline lookup answer: `{result}` or `{error}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GuidelineResponse {
    Found { result: String },
    Unavailable { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub prompt: String,
    /// Retrieved brand guidelines
    pub context: String,
    /// Concepts the user picked earlier in the session
    pub session_history: Vec<CreativeConcept>,
    pub concept_count: usize,
    pub aspect_ratio: String,
}

/// Synthesis answer: structured concepts, or free text asking for more input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SynthesisResponse {
    Concepts { concepts: Vec<CreativeConcept> },
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    pub user_input: String,
    pub context: String,
    pub candidate_concept: CreativeConcept,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    pub quality: ImageQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRequest {
    pub prompt: String,
    pub aspect_ratio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceoverRequest {
    pub script: String,
    pub voice_profile: String,
    pub language: String,
}

/// Result of a generation call
///
/// The backend either returns media inline, defers to an async job, or
/// declines without invoking any generation tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenerationResponse {
    Inline {
        #[serde(rename = "mediaUrl")]
        media_url: String,
    },
    Deferred {
        #[serde(rename = "jobId")]
        job_id: String,
    },
    Declined { explanation: String },
}

/// Remote job state as reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteJobState {
    Pending,
    Processing,
    #[serde(alias = "completed")]
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPollResponse {
    pub status: RemoteJobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

/// Creative-generation backend
#[async_trait]
pub trait CreativeService: Send + Sync {
    /// Short name used in logs and agent status traces
    fn service_name(&self) -> &'static str;

    async fn classify(&self, request: &str) -> Result<TriageVerdict>;

    async fn delegate_compliance(&self, request: &ComplianceRequest) -> Result<ComplianceVerdict>;

    async fn retrieve_guidelines(
        &self,
        query: &str,
        source: GuidelineSource,
    ) -> Result<GuidelineResponse>;

    async fn synthesize_concepts(&self, request: &SynthesisRequest) -> Result<SynthesisResponse>;

    async fn evaluate_concept(&self, request: &EvaluationRequest) -> Result<Evaluation>;

    async fn generate_image(&self, request: &ImageRequest) -> Result<GenerationResponse>;

    async fn generate_video(&self, request: &VideoRequest) -> Result<GenerationResponse>;

    async fn generate_voiceover(&self, request: &VoiceoverRequest) -> Result<GenerationResponse>;

    async fn poll_job(&self, job_id: &str) -> Result<JobPollResponse>;

    /// Record a concept selection in the long-term preference log
    async fn log_preference(&self, concept: &CreativeConcept) -> Result<()>;

    /// Persist a confirmed style preference
    async fn save_style_preference(&self, style: &str) -> Result<()>;
}
