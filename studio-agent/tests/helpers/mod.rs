//! Test helper utilities
//!
//! A scripted [`CreativeService`] whose behaviour each test tunes, plus
//! builders for a studio wired to it.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use studio_agent::services::{
    CannedWorkflowClient, ComplianceRequest, ComplianceVerdict, CreativeService, EvaluationRequest,
    GenerationResponse, GuidelineResponse, GuidelineSource, ImageRequest, JobPollResponse,
    RemoteJobState, SynthesisRequest, SynthesisResponse, TriageCategory, TriageVerdict,
    VideoRequest, VoiceoverRequest,
};
use studio_agent::Studio;
use studio_common::config::StudioConfig;
use studio_common::events::EventBus;
use studio_common::models::{CreativeConcept, Evaluation, ImageQuality};
use studio_common::{Error, Result};

pub const DEFERRED_JOB_ID: &str = "job_42";
pub const DEFERRED_MEDIA_URL: &str = "https://x/a.mp4";

pub fn concept(id: &str, style: &str) -> CreativeConcept {
    CreativeConcept {
        id: id.to_string(),
        title: format!("{} direction", style),
        description: format!("A {} take on the brief", style.to_lowercase()),
        style: style.to_string(),
        image_prompt: format!("{} hero shot", style),
        video_prompt: Some(format!("{} product reveal", style)),
        voiceover_prompt: None,
        duration_seconds: Some(15),
        evaluation: None,
    }
}

/// Backend double; every knob is adjustable mid-test
pub struct ScriptedService {
    pub triage: Mutex<TriageVerdict>,
    pub compliance: Mutex<ComplianceVerdict>,
    pub compliance_calls: AtomicU32,
    pub guideline_calls: AtomicU32,
    pub primary_guidelines_error: Mutex<Option<String>>,
    pub backup_guidelines_error: Mutex<Option<String>>,
    /// Judge score per concept id
    pub scores: Mutex<Vec<(String, f64)>>,
    pub concepts: Mutex<Vec<CreativeConcept>>,
    /// Free text returned by synthesis instead of concepts
    pub synthesis_text: Mutex<Option<String>>,
    /// Explanation returned by image generation instead of media
    pub generation_decline: Mutex<Option<String>>,
    /// Judge calls currently awaiting a score, and the peak seen
    pub judges_in_flight: AtomicU32,
    pub peak_judges_in_flight: AtomicU32,
    /// Remaining image calls that fail with a 503
    pub image_failures: AtomicU32,
    /// Quality tier of every image call, in order
    pub image_calls: Mutex<Vec<ImageQuality>>,
    pub reject_credentials: AtomicBool,
    /// Polls answered `processing` before the job completes
    pub polls_before_complete: AtomicU32,
    pub poll_count: AtomicU32,
    pub synthesis_calls: AtomicU32,
    pub saved_styles: Mutex<Vec<String>>,
}

impl Default for ScriptedService {
    fn default() -> Self {
        Self {
            triage: Mutex::new(TriageVerdict {
                category: TriageCategory::CreativeRequest,
                reason: String::new(),
            }),
            compliance: Mutex::new(ComplianceVerdict {
                approved: true,
                reason: String::new(),
            }),
            compliance_calls: AtomicU32::new(0),
            guideline_calls: AtomicU32::new(0),
            primary_guidelines_error: Mutex::new(None),
            backup_guidelines_error: Mutex::new(None),
            scores: Mutex::new(vec![
                ("c1".to_string(), 9.2),
                ("c2".to_string(), 8.5),
                ("c3".to_string(), 2.0),
            ]),
            concepts: Mutex::new(vec![
                concept("c1", "Minimalist"),
                concept("c2", "Cinematic"),
                concept("c3", "Retro"),
            ]),
            synthesis_text: Mutex::new(None),
            generation_decline: Mutex::new(None),
            judges_in_flight: AtomicU32::new(0),
            peak_judges_in_flight: AtomicU32::new(0),
            image_failures: AtomicU32::new(0),
            image_calls: Mutex::new(Vec::new()),
            reject_credentials: AtomicBool::new(false),
            polls_before_complete: AtomicU32::new(2),
            poll_count: AtomicU32::new(0),
            synthesis_calls: AtomicU32::new(0),
            saved_styles: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedService {
    pub fn set_triage(&self, category: TriageCategory, reason: &str) {
        *self.triage.lock().unwrap() = TriageVerdict {
            category,
            reason: reason.to_string(),
        };
    }

    pub fn reject_compliance(&self, reason: &str) {
        *self.compliance.lock().unwrap() = ComplianceVerdict {
            approved: false,
            reason: reason.to_string(),
        };
    }

    fn check_credentials(&self) -> Result<()> {
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(Error::Credential("API key not valid".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CreativeService for ScriptedService {
    fn service_name(&self) -> &'static str {
        "scripted"
    }

    async fn classify(&self, _request: &str) -> Result<TriageVerdict> {
        self.check_credentials()?;
        Ok(self.triage.lock().unwrap().clone())
    }

    async fn delegate_compliance(&self, _request: &ComplianceRequest) -> Result<ComplianceVerdict> {
        self.compliance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.compliance.lock().unwrap().clone())
    }

    async fn retrieve_guidelines(
        &self,
        _query: &str,
        source: GuidelineSource,
    ) -> Result<GuidelineResponse> {
        self.guideline_calls.fetch_add(1, Ordering::SeqCst);
        let failure = match source {
            GuidelineSource::Primary => self.primary_guidelines_error.lock().unwrap().clone(),
            GuidelineSource::Backup => self.backup_guidelines_error.lock().unwrap().clone(),
        };
        match failure {
            Some(message) => Err(Error::Transport(message)),
            None => Ok(GuidelineResponse::Found {
                result: format!("{} guidelines: warm tone, no superlatives", source.as_str()),
            }),
        }
    }

    async fn synthesize_concepts(&self, _request: &SynthesisRequest) -> Result<SynthesisResponse> {
        self.synthesis_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(text) = self.synthesis_text.lock().unwrap().clone() {
            return Ok(SynthesisResponse::Text { text });
        }
        Ok(SynthesisResponse::Concepts {
            concepts: self.concepts.lock().unwrap().clone(),
        })
    }

    async fn evaluate_concept(&self, request: &EvaluationRequest) -> Result<Evaluation> {
        let in_flight = self.judges_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_judges_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        // Hand control back so sibling judge calls can start
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }
        self.judges_in_flight.fetch_sub(1, Ordering::SeqCst);

        let score = self
            .scores
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| *id == request.candidate_concept.id)
            .map(|(_, score)| *score)
            .unwrap_or(0.0);
        Ok(Evaluation {
            score,
            reasoning: format!("Scored {}", score),
            violation_detected: false,
        })
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<GenerationResponse> {
        self.check_credentials()?;
        self.image_calls.lock().unwrap().push(request.quality);
        if let Some(explanation) = self.generation_decline.lock().unwrap().clone() {
            return Ok(GenerationResponse::Declined { explanation });
        }
        let remaining = self.image_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.image_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Remote {
                status: 503,
                message: "image model overloaded".to_string(),
            });
        }
        Ok(GenerationResponse::Inline {
            media_url: format!("https://x/{}.png", request.quality.as_str()),
        })
    }

    async fn generate_video(&self, _request: &VideoRequest) -> Result<GenerationResponse> {
        self.check_credentials()?;
        Ok(GenerationResponse::Deferred {
            job_id: DEFERRED_JOB_ID.to_string(),
        })
    }

    async fn generate_voiceover(&self, request: &VoiceoverRequest) -> Result<GenerationResponse> {
        Ok(GenerationResponse::Inline {
            media_url: format!("https://x/{}.mp3", request.voice_profile),
        })
    }

    async fn poll_job(&self, job_id: &str) -> Result<JobPollResponse> {
        if job_id != DEFERRED_JOB_ID {
            return Err(Error::NotFound(format!("Job {}", job_id)));
        }
        let polls = self.poll_count.fetch_add(1, Ordering::SeqCst) + 1;
        if polls > self.polls_before_complete.load(Ordering::SeqCst) {
            Ok(JobPollResponse {
                status: RemoteJobState::Complete,
                media_url: Some(DEFERRED_MEDIA_URL.to_string()),
            })
        } else {
            Ok(JobPollResponse {
                status: RemoteJobState::Processing,
                media_url: None,
            })
        }
    }

    async fn log_preference(&self, _concept: &CreativeConcept) -> Result<()> {
        Ok(())
    }

    async fn save_style_preference(&self, style: &str) -> Result<()> {
        self.saved_styles.lock().unwrap().push(style.to_string());
        Ok(())
    }
}

/// Studio wired to `service` with default configuration
pub fn studio_with(service: Arc<ScriptedService>) -> Studio {
    studio_with_config(service, &StudioConfig::default())
}

pub fn studio_with_config(service: Arc<ScriptedService>, config: &StudioConfig) -> Studio {
    Studio::new(
        config,
        service,
        Arc::new(CannedWorkflowClient),
        EventBus::new(256),
    )
}

/// Let spawned tasks run without advancing the clock
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
