//! Asset generation pipeline
//!
//! MEMORY_LOG (best effort) → GENERATE → (ASYNC_POLL) → DONE
//!
//! Generation runs through the [`FailoverExecutor`] with a per-format
//! failover: images drop one quality tier, voiceovers switch to the fallback
//! voice, video has none. A deferred result returns an in-flight campaign
//! immediately; the caller attaches a job poller to finish it.

use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;
use studio_common::config::WorkflowConfig;
use studio_common::models::{
    AssetFormat, CampaignStatus, CreativeConcept, GeneratedCampaign, ImageQuality, MemoryStatus,
    Observability, StatusState, WorkflowPayload,
};
use studio_common::Result;
use tracing::{info, warn};
use uuid::Uuid;

use super::failover::{FailoverExecutor, Recovered, RetryNotice};
use super::{EmitMode, ProgressSink};
use crate::services::{
    CreativeService, GenerationResponse, ImageRequest, VideoRequest, VoiceoverRequest,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStage {
    MemoryLog,
    Generate,
    AsyncPoll,
    Done,
}

impl AssetStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetStage::MemoryLog => "MEMORY_LOG",
            AssetStage::Generate => "GENERATE",
            AssetStage::AsyncPoll => "ASYNC_POLL",
            AssetStage::Done => "DONE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AssetOutcome {
    /// Media returned inline
    Ready { campaign: GeneratedCampaign },
    /// Render deferred to a job; campaign is `processing`
    InFlight { campaign: GeneratedCampaign },
    /// Backend declined without generating anything
    Refusal { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssetSettings {
    pub max_retries: u32,
    pub image_quality: ImageQuality,
    pub aspect_ratio: String,
    pub voice_profile: String,
    pub fallback_voice_profile: Option<String>,
    pub language: String,
}

impl AssetSettings {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            image_quality: config.image_quality,
            aspect_ratio: config.aspect_ratio.clone(),
            voice_profile: config.voice_profile.clone(),
            fallback_voice_profile: config.fallback_voice_profile.clone(),
            language: config.language.clone(),
        }
    }
}

impl Default for AssetSettings {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

/// Upserts a GENERATE status bar describing each retry
fn retry_reporter(sink: &dyn ProgressSink) -> impl FnMut(&RetryNotice<'_>) + '_ {
    move |notice| {
        sink.emit(
            EmitMode::Upsert,
            WorkflowPayload::status(
                AssetStage::Generate.as_str(),
                StatusState::InProgress,
                format!(
                    "Attempt {} of {} failed, retrying {}",
                    notice.attempt, notice.max_attempts, notice.operation
                ),
            ),
        );
    }
}

#[derive(Clone)]
pub struct AssetPipeline {
    service: Arc<dyn CreativeService>,
    executor: FailoverExecutor,
    settings: AssetSettings,
}

impl AssetPipeline {
    pub fn new(service: Arc<dyn CreativeService>, settings: AssetSettings) -> Self {
        Self {
            service,
            executor: FailoverExecutor::new(settings.max_retries),
            settings,
        }
    }

    pub fn settings(&self) -> &AssetSettings {
        &self.settings
    }

    pub async fn run(
        &self,
        concept: &CreativeConcept,
        format: AssetFormat,
        sink: &dyn ProgressSink,
    ) -> Result<AssetOutcome> {
        // MEMORY_LOG
        sink.emit(
            EmitMode::Upsert,
            WorkflowPayload::status(
                AssetStage::MemoryLog.as_str(),
                StatusState::InProgress,
                "Recording preference",
            ),
        );
        let memory_status = match self.service.log_preference(concept).await {
            Ok(()) => MemoryStatus::Logged,
            Err(e) => {
                warn!(concept_id = %concept.id, error = %e, "Preference log failed, continuing");
                MemoryStatus::Skipped
            }
        };
        sink.emit(
            EmitMode::Upsert,
            WorkflowPayload::status(
                AssetStage::MemoryLog.as_str(),
                StatusState::Complete,
                match memory_status {
                    MemoryStatus::Logged => "Preference recorded",
                    MemoryStatus::Skipped => "Preference log skipped",
                },
            ),
        );

        // GENERATE
        sink.emit(
            EmitMode::Upsert,
            WorkflowPayload::status(
                AssetStage::Generate.as_str(),
                StatusState::InProgress,
                format!("Generating {}", format.as_str()),
            ),
        );

        let on_retry = retry_reporter(sink);

        let recovered = match format {
            AssetFormat::Image => self.generate_image(concept, on_retry).await,
            AssetFormat::Video => self.generate_video(concept, on_retry).await,
            AssetFormat::Voiceover => self.generate_voiceover(concept, on_retry).await,
        };
        let Recovered { result, metrics } = match recovered {
            Ok(recovered) => recovered,
            Err(e) => {
                sink.emit(
                    EmitMode::Upsert,
                    WorkflowPayload::status(
                        AssetStage::Generate.as_str(),
                        StatusState::Failed,
                        "Generation failed",
                    ),
                );
                return Err(e);
            }
        };

        if metrics.failover_used {
            warn!(format = format.as_str(), retries = metrics.retries, "Asset produced by failover");
        }

        let observability = Observability {
            compliance_score: concept.score().unwrap_or(0.0),
            tool_failover_used: metrics.failover_used,
            retries: metrics.retries,
            memory_status,
        };
        let campaign = |media_url: Option<String>, job_id: Option<String>, status| GeneratedCampaign {
            campaign_id: Uuid::new_v4(),
            concept: concept.clone(),
            media_url,
            format,
            job_id,
            status,
            observability: observability.clone(),
        };

        match result {
            GenerationResponse::Inline { media_url } => {
                info!(format = format.as_str(), "Asset generated inline");
                sink.emit(
                    EmitMode::Upsert,
                    WorkflowPayload::status(
                        AssetStage::Done.as_str(),
                        StatusState::Complete,
                        "Asset ready",
                    ),
                );
                sink.settle();
                Ok(AssetOutcome::Ready {
                    campaign: campaign(Some(media_url), None, CampaignStatus::Complete),
                })
            }
            GenerationResponse::Deferred { job_id } => {
                info!(format = format.as_str(), job_id = %job_id, "Asset generation deferred to job");
                sink.emit(
                    EmitMode::Upsert,
                    WorkflowPayload::job_status(
                        job_id.clone(),
                        StatusState::InProgress,
                        0.0,
                        format!("Rendering {}", format.as_str()),
                    ),
                );
                Ok(AssetOutcome::InFlight {
                    campaign: campaign(None, Some(job_id), CampaignStatus::Processing),
                })
            }
            GenerationResponse::Declined { explanation } => {
                info!(format = format.as_str(), "Generation declined");
                sink.emit(
                    EmitMode::Upsert,
                    WorkflowPayload::status(
                        AssetStage::Generate.as_str(),
                        StatusState::Failed,
                        "Generation declined",
                    ),
                );
                sink.emit(EmitMode::Append, WorkflowPayload::text(explanation.clone()));
                sink.settle();
                Ok(AssetOutcome::Refusal {
                    reason: explanation,
                })
            }
        }
    }

    async fn generate_image<N>(
        &self,
        concept: &CreativeConcept,
        on_retry: N,
    ) -> Result<Recovered<GenerationResponse>>
    where
        N: FnMut(&RetryNotice<'_>),
    {
        let request = ImageRequest {
            prompt: concept.image_prompt.clone(),
            aspect_ratio: self.settings.aspect_ratio.clone(),
            quality: self.settings.image_quality,
        };

        let failover: Option<BoxFuture<'static, Result<GenerationResponse>>> =
            request.quality.downgrade().map(|lower| {
                let service = self.service.clone();
                let degraded = ImageRequest {
                    quality: lower,
                    ..request.clone()
                };
                info!(from = request.quality.as_str(), to = lower.as_str(), "Image failover tier prepared");
                Box::pin(async move { service.generate_image(&degraded).await }) as BoxFuture<'static, _>
            });

        let service = &self.service;
        let request = &request;
        self.executor
            .execute(
                "image generation",
                move || service.generate_image(request),
                failover,
                on_retry,
            )
            .await
    }

    async fn generate_video<N>(
        &self,
        concept: &CreativeConcept,
        on_retry: N,
    ) -> Result<Recovered<GenerationResponse>>
    where
        N: FnMut(&RetryNotice<'_>),
    {
        let request = VideoRequest {
            prompt: concept
                .video_prompt
                .clone()
                .unwrap_or_else(|| concept.image_prompt.clone()),
            aspect_ratio: self.settings.aspect_ratio.clone(),
            duration_seconds: concept.duration_seconds,
        };

        let service = &self.service;
        let request = &request;
        self.executor
            .execute(
                "video generation",
                move || service.generate_video(request),
                None,
                on_retry,
            )
            .await
    }

    async fn generate_voiceover<N>(
        &self,
        concept: &CreativeConcept,
        on_retry: N,
    ) -> Result<Recovered<GenerationResponse>>
    where
        N: FnMut(&RetryNotice<'_>),
    {
        let request = VoiceoverRequest {
            script: concept
                .voiceover_prompt
                .clone()
                .unwrap_or_else(|| concept.description.clone()),
            voice_profile: self.settings.voice_profile.clone(),
            language: self.settings.language.clone(),
        };

        let failover: Option<BoxFuture<'static, Result<GenerationResponse>>> = self
            .settings
            .fallback_voice_profile
            .as_ref()
            .filter(|voice| **voice != request.voice_profile)
            .map(|voice| {
                let service = self.service.clone();
                let alternate = VoiceoverRequest {
                    voice_profile: voice.clone(),
                    ..request.clone()
                };
                Box::pin(async move { service.generate_voiceover(&alternate).await }) as BoxFuture<'static, _>
            });

        let service = &self.service;
        let request = &request;
        self.executor
            .execute(
                "voiceover generation",
                move || service.generate_voiceover(request),
                failover,
                on_retry,
            )
            .await
    }
}
