//! Offline creative service with deterministic data
//!
//! Used when no backend is configured (or `--canned` is passed) so the studio
//! stays demonstrable without network access. Deferred video jobs complete
//! after a fixed number of polls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use studio_common::models::{CreativeConcept, Evaluation};
use studio_common::{Error, Result};
use tracing::{debug, info};

use super::contract::{
    ComplianceRequest, ComplianceVerdict, CreativeService, EvaluationRequest, GenerationResponse,
    GuidelineResponse, GuidelineSource, ImageRequest, JobPollResponse, RemoteJobState,
    SynthesisRequest, SynthesisResponse, TriageCategory, TriageVerdict, VideoRequest,
    VoiceoverRequest,
};

const MEDIA_HOST: &str = "https://cdn.studio.local";

/// Requests shorter than this are too vague to act on
const MIN_REQUEST_WORDS: usize = 4;

const BLOCKED_TERMS: &[&str] = &["weapon", "violence", "gore", "hate"];

const UNSUBSTANTIATED_CLAIMS: &[&str] = &["guaranteed", "cure", "risk-free", "miracle"];

/// Polls a canned video job needs before it reports completion
pub const DEFAULT_POLLS_TO_COMPLETE: u32 = 3;

pub struct CannedCreativeService {
    polls_to_complete: u32,
    next_job: AtomicU64,
    /// Poll count per issued job id
    jobs: Mutex<HashMap<String, u32>>,
}

impl Default for CannedCreativeService {
    fn default() -> Self {
        Self::new()
    }
}

impl CannedCreativeService {
    pub fn new() -> Self {
        Self::with_polls_to_complete(DEFAULT_POLLS_TO_COMPLETE)
    }

    pub fn with_polls_to_complete(polls_to_complete: u32) -> Self {
        Self {
            polls_to_complete: polls_to_complete.max(1),
            next_job: AtomicU64::new(1),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, u32>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Sample concepts for a prompt, in fixed style order
///
/// Shared with the canned workflow client so both offline paths show the
/// same directions.
pub fn sample_concepts(prompt: &str) -> Vec<CreativeConcept> {
    let subject = prompt.trim();
    let styles = [
        (
            "Minimalist",
            "Clean Lines",
            "A single hero shot on a white field, no copy beyond the logo.",
        ),
        (
            "Cinematic",
            "Golden Hour Story",
            "A short narrative arc shot in warm light with a closing product reveal.",
        ),
        (
            "Retro",
            "Analog Throwback",
            "Film grain, muted palette and hand-drawn type recalling 1970s print ads.",
        ),
    ];

    styles
        .iter()
        .enumerate()
        .map(|(i, (style, title, description))| CreativeConcept {
            id: format!("concept-{}", i + 1),
            title: title.to_string(),
            description: description.to_string(),
            style: style.to_string(),
            image_prompt: format!("{} style key visual: {}", style, subject),
            video_prompt: Some(format!("{} style 15 second spot: {}", style, subject)),
            voiceover_prompt: Some(format!("Warm {} voiceover introducing {}", style.to_lowercase(), subject)),
            duration_seconds: Some(15),
            evaluation: None,
        })
        .collect()
}

fn canned_score(style: &str) -> (f64, &'static str) {
    match style {
        "Minimalist" => (9.2, "Strong brand fit and clear focal point."),
        "Cinematic" => (8.5, "Emotive and on-brand; production cost is higher."),
        "Retro" => (6.0, "Distinctive, but the palette drifts from brand colours."),
        _ => (5.0, "No scoring notes for this style."),
    }
}

fn slug(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .take(4)
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[async_trait]
impl CreativeService for CannedCreativeService {
    fn service_name(&self) -> &'static str {
        "canned"
    }

    async fn classify(&self, request: &str) -> Result<TriageVerdict> {
        let lowered = request.to_lowercase();
        if let Some(term) = BLOCKED_TERMS.iter().find(|t| lowered.contains(*t)) {
            return Ok(TriageVerdict {
                category: TriageCategory::SafetyViolation,
                reason: format!("The request references prohibited content ({}).", term),
            });
        }
        if request.split_whitespace().count() < MIN_REQUEST_WORDS {
            return Ok(TriageVerdict {
                category: TriageCategory::Ambiguous,
                reason: "Please describe the product, the audience and the tone you want."
                    .to_string(),
            });
        }
        Ok(TriageVerdict {
            category: TriageCategory::CreativeRequest,
            reason: "Marketing asset request.".to_string(),
        })
    }

    async fn delegate_compliance(&self, request: &ComplianceRequest) -> Result<ComplianceVerdict> {
        let lowered = request.task_description.to_lowercase();
        if let Some(claim) = UNSUBSTANTIATED_CLAIMS.iter().find(|c| lowered.contains(*c)) {
            return Ok(ComplianceVerdict {
                approved: false,
                reason: format!(
                    "Advertising standards: the claim \"{}\" cannot be substantiated.",
                    claim
                ),
            });
        }
        Ok(ComplianceVerdict {
            approved: true,
            reason: "No regulated claims found.".to_string(),
        })
    }

    async fn retrieve_guidelines(
        &self,
        _query: &str,
        source: GuidelineSource,
    ) -> Result<GuidelineResponse> {
        let result = match source {
            GuidelineSource::Primary => {
                "Brand voice: confident, warm, concise. Palette: deep teal, sand, white. \
                 Logo always bottom-right with clear space. No superlatives without evidence."
            }
            GuidelineSource::Backup => "Brand voice: confident, warm, concise.",
        };
        Ok(GuidelineResponse::Found {
            result: result.to_string(),
        })
    }

    async fn synthesize_concepts(&self, request: &SynthesisRequest) -> Result<SynthesisResponse> {
        let mut concepts = sample_concepts(&request.prompt);
        concepts.truncate(request.concept_count.max(1));
        Ok(SynthesisResponse::Concepts { concepts })
    }

    async fn evaluate_concept(&self, request: &EvaluationRequest) -> Result<Evaluation> {
        let (score, reasoning) = canned_score(&request.candidate_concept.style);
        Ok(Evaluation {
            score,
            reasoning: reasoning.to_string(),
            violation_detected: false,
        })
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<GenerationResponse> {
        Ok(GenerationResponse::Inline {
            media_url: format!(
                "{}/image/{}-{}.png",
                MEDIA_HOST,
                slug(&request.prompt),
                request.quality.as_str()
            ),
        })
    }

    async fn generate_video(&self, _request: &VideoRequest) -> Result<GenerationResponse> {
        let job_id = format!("job_{}", self.next_job.fetch_add(1, Ordering::Relaxed));
        self.jobs().insert(job_id.clone(), 0);
        info!(job_id = %job_id, "Canned video job queued");
        Ok(GenerationResponse::Deferred { job_id })
    }

    async fn generate_voiceover(&self, request: &VoiceoverRequest) -> Result<GenerationResponse> {
        Ok(GenerationResponse::Inline {
            media_url: format!(
                "{}/audio/{}-{}.mp3",
                MEDIA_HOST,
                slug(&request.script),
                request.voice_profile
            ),
        })
    }

    async fn poll_job(&self, job_id: &str) -> Result<JobPollResponse> {
        let mut jobs = self.jobs();
        let polls = {
            let polls = jobs
                .get_mut(job_id)
                .ok_or_else(|| Error::NotFound(format!("Job {}", job_id)))?;
            *polls += 1;
            *polls
        };
        debug!(job_id, polls, "Canned job polled");

        if polls >= self.polls_to_complete {
            jobs.remove(job_id);
            Ok(JobPollResponse {
                status: RemoteJobState::Complete,
                media_url: Some(format!("{}/video/{}.mp4", MEDIA_HOST, job_id)),
            })
        } else {
            Ok(JobPollResponse {
                status: RemoteJobState::Processing,
                media_url: None,
            })
        }
    }

    async fn log_preference(&self, concept: &CreativeConcept) -> Result<()> {
        debug!(style = %concept.style, "Canned preference logged");
        Ok(())
    }

    async fn save_style_preference(&self, style: &str) -> Result<()> {
        info!(style, "Canned style preference saved");
        Ok(())
    }
}
