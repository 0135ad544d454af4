//! Concept generation pipeline
//!
//! TRIAGE → LEGAL_REVIEW → BRAND_RETRIEVAL → CONCEPT_SYNTHESIS →
//! EVALUATION_FILTER → READY
//!
//! Every stage is a gate: a rejection ends the run with a typed
//! [`ConceptOutcome`] instead of an error. Only transport-level and
//! credential failures come back as `Err`. Each stage upserts a status bar
//! when it starts and again when it resolves.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use studio_common::config::WorkflowConfig;
use studio_common::models::{AgentStatusEntry, CreativeConcept, StatusState, WorkflowPayload};
use studio_common::{Error, ErrorKind, Result};
use tracing::{debug, info, warn};

use super::{EmitMode, ProgressSink};
use crate::services::{
    ComplianceRequest, CreativeService, EvaluationRequest, GuidelineResponse, GuidelineSource,
    SynthesisRequest, SynthesisResponse, TriageCategory,
};

const TRIAGE_SERVICE: &str = "triage-classifier";
const COMPLIANCE_SERVICE: &str = "compliance-agent";
const KNOWLEDGE_SERVICE: &str = "brand-knowledge";
const SYNTHESIS_SERVICE: &str = "concept-synthesizer";
const JUDGE_SERVICE: &str = "concept-judge";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConceptStage {
    Triage,
    LegalReview,
    BrandRetrieval,
    ConceptSynthesis,
    EvaluationFilter,
    Ready,
}

impl ConceptStage {
    pub fn as_str(self) -> &'static str {
        match self {
            ConceptStage::Triage => "TRIAGE",
            ConceptStage::LegalReview => "LEGAL_REVIEW",
            ConceptStage::BrandRetrieval => "BRAND_RETRIEVAL",
            ConceptStage::ConceptSynthesis => "CONCEPT_SYNTHESIS",
            ConceptStage::EvaluationFilter => "EVALUATION_FILTER",
            ConceptStage::Ready => "READY",
        }
    }
}

/// Terminal result of one concept run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum ConceptOutcome {
    /// Compliant concepts ranked best first
    Ready { concepts: Vec<CreativeConcept> },
    Refusal { stage: ConceptStage, reason: String },
    Clarification { stage: ConceptStage, reason: String },
}

impl ConceptOutcome {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ConceptOutcome::Ready { .. } => None,
            ConceptOutcome::Refusal { .. } => Some(ErrorKind::Refusal),
            ConceptOutcome::Clarification { .. } => Some(ErrorKind::Clarification),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConceptSettings {
    /// Minimum judge score to reach the user
    pub evaluation_threshold: f64,
    pub concept_count: usize,
    pub aspect_ratio: String,
    /// Identity presented to the compliance sub-service
    pub agent_id: String,
}

impl ConceptSettings {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            evaluation_threshold: config.evaluation_threshold,
            concept_count: config.concept_count,
            aspect_ratio: config.aspect_ratio.clone(),
            agent_id: "creative-director".to_string(),
        }
    }
}

impl Default for ConceptSettings {
    fn default() -> Self {
        Self::from_config(&WorkflowConfig::default())
    }
}

/// Keep concepts scoring at least `threshold`, best first
///
/// Unevaluated concepts are dropped.
pub fn rank_concepts(concepts: Vec<CreativeConcept>, threshold: f64) -> Vec<CreativeConcept> {
    let mut passing: Vec<CreativeConcept> = concepts
        .into_iter()
        .filter(|c| c.score().is_some_and(|s| s >= threshold))
        .collect();
    passing.sort_by(|a, b| {
        let a = a.score().unwrap_or(0.0);
        let b = b.score().unwrap_or(0.0);
        b.total_cmp(&a)
    });
    passing
}

/// Status-bar emitter that carries the running agent trace
struct StageReporter<'a> {
    sink: &'a dyn ProgressSink,
    trace: Vec<AgentStatusEntry>,
}

impl<'a> StageReporter<'a> {
    fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            trace: Vec::new(),
        }
    }

    fn mark(&mut self, service: &str, status: &str, verified: bool) {
        match self.trace.iter_mut().find(|e| e.service_name == service) {
            Some(entry) => {
                entry.status = status.to_string();
                entry.identity_verified = verified;
            }
            None => self
                .trace
                .push(AgentStatusEntry::new(service, status, verified)),
        }
    }

    fn start(&mut self, stage: ConceptStage, service: &str, message: &str) {
        info!(stage = stage.as_str(), "Stage started");
        self.mark(service, "running", false);
        self.sink.emit(
            EmitMode::Upsert,
            WorkflowPayload::status(stage.as_str(), StatusState::InProgress, message)
                .with_trace(self.trace.clone()),
        );
    }

    fn resolve(&mut self, stage: ConceptStage, service: &str, state: StatusState, message: &str) {
        info!(stage = stage.as_str(), ?state, "Stage resolved");
        let status = match state {
            StatusState::Complete => "completed",
            StatusState::Failed => "rejected",
            StatusState::InProgress => "running",
        };
        self.mark(service, status, true);
        self.sink.emit(
            EmitMode::Upsert,
            WorkflowPayload::status(stage.as_str(), state, message).with_trace(self.trace.clone()),
        );
    }

    fn finish(&self, payload: WorkflowPayload) {
        self.sink
            .emit(EmitMode::Append, payload.with_trace(self.trace.clone()));
        self.sink.settle();
    }
}

/// Credential failures always propagate; other failures become text
fn describe_failure(err: Error) -> Result<String> {
    if err.kind() == ErrorKind::Credential {
        return Err(err);
    }
    Ok(err.to_string())
}

#[derive(Clone)]
pub struct ConceptPipeline {
    service: Arc<dyn CreativeService>,
    settings: ConceptSettings,
}

impl ConceptPipeline {
    pub fn new(service: Arc<dyn CreativeService>, settings: ConceptSettings) -> Self {
        Self { service, settings }
    }

    pub fn settings(&self) -> &ConceptSettings {
        &self.settings
    }

    /// Run every gate for `prompt`
    ///
    /// `session_history` is the list of concepts the user picked earlier; it
    /// is passed to synthesis so new directions can build on them.
    pub async fn run(
        &self,
        prompt: &str,
        session_history: &[CreativeConcept],
        sink: &dyn ProgressSink,
    ) -> Result<ConceptOutcome> {
        let mut reporter = StageReporter::new(sink);

        // TRIAGE
        reporter.start(ConceptStage::Triage, TRIAGE_SERVICE, "Classifying request");
        let verdict = self.service.classify(prompt).await?;
        match verdict.category {
            TriageCategory::CreativeRequest => {
                reporter.resolve(
                    ConceptStage::Triage,
                    TRIAGE_SERVICE,
                    StatusState::Complete,
                    "Creative request",
                );
            }
            TriageCategory::SafetyViolation => {
                reporter.resolve(
                    ConceptStage::Triage,
                    TRIAGE_SERVICE,
                    StatusState::Failed,
                    "Request refused",
                );
                return Ok(self.refuse(&reporter, ConceptStage::Triage, verdict.reason));
            }
            TriageCategory::Ambiguous => {
                reporter.resolve(
                    ConceptStage::Triage,
                    TRIAGE_SERVICE,
                    StatusState::Failed,
                    "More detail needed",
                );
                return Ok(self.clarify(&reporter, ConceptStage::Triage, verdict.reason));
            }
        }

        // LEGAL_REVIEW
        reporter.start(
            ConceptStage::LegalReview,
            COMPLIANCE_SERVICE,
            "Delegating to compliance review",
        );
        let compliance = self
            .service
            .delegate_compliance(&ComplianceRequest {
                agent_id: self.settings.agent_id.clone(),
                task_description: prompt.to_string(),
            })
            .await?;
        if !compliance.approved {
            reporter.resolve(
                ConceptStage::LegalReview,
                COMPLIANCE_SERVICE,
                StatusState::Failed,
                "Compliance rejected the request",
            );
            return Ok(self.refuse(&reporter, ConceptStage::LegalReview, compliance.reason));
        }
        reporter.resolve(
            ConceptStage::LegalReview,
            COMPLIANCE_SERVICE,
            StatusState::Complete,
            "Approved",
        );

        // BRAND_RETRIEVAL
        reporter.start(
            ConceptStage::BrandRetrieval,
            KNOWLEDGE_SERVICE,
            "Retrieving brand guidelines",
        );
        let context = match self.retrieve_context(prompt).await? {
            Ok(context) => context,
            Err(reason) => {
                reporter.resolve(
                    ConceptStage::BrandRetrieval,
                    KNOWLEDGE_SERVICE,
                    StatusState::Failed,
                    "Guidelines unavailable",
                );
                return Ok(self.refuse(&reporter, ConceptStage::BrandRetrieval, reason));
            }
        };
        reporter.resolve(
            ConceptStage::BrandRetrieval,
            KNOWLEDGE_SERVICE,
            StatusState::Complete,
            "Guidelines loaded",
        );

        // CONCEPT_SYNTHESIS
        reporter.start(
            ConceptStage::ConceptSynthesis,
            SYNTHESIS_SERVICE,
            "Drafting concepts",
        );
        let synthesis = self
            .service
            .synthesize_concepts(&SynthesisRequest {
                prompt: prompt.to_string(),
                context: context.clone(),
                session_history: session_history.to_vec(),
                concept_count: self.settings.concept_count,
                aspect_ratio: self.settings.aspect_ratio.clone(),
            })
            .await?;
        let concepts = match synthesis {
            SynthesisResponse::Concepts { concepts } if !concepts.is_empty() => concepts,
            SynthesisResponse::Concepts { .. } => {
                reporter.resolve(
                    ConceptStage::ConceptSynthesis,
                    SYNTHESIS_SERVICE,
                    StatusState::Failed,
                    "No concepts produced",
                );
                return Ok(self.clarify(
                    &reporter,
                    ConceptStage::ConceptSynthesis,
                    "No concepts could be drafted for this request. Try adding more detail."
                        .to_string(),
                ));
            }
            SynthesisResponse::Text { text } => {
                reporter.resolve(
                    ConceptStage::ConceptSynthesis,
                    SYNTHESIS_SERVICE,
                    StatusState::Failed,
                    "More detail needed",
                );
                return Ok(self.clarify(&reporter, ConceptStage::ConceptSynthesis, text));
            }
        };
        reporter.resolve(
            ConceptStage::ConceptSynthesis,
            SYNTHESIS_SERVICE,
            StatusState::Complete,
            &format!("{} concepts drafted", concepts.len()),
        );

        // EVALUATION_FILTER
        reporter.start(
            ConceptStage::EvaluationFilter,
            JUDGE_SERVICE,
            "Scoring concepts",
        );
        let evaluated = self.evaluate_all(prompt, &context, concepts).await?;
        let ranked = rank_concepts(evaluated, self.settings.evaluation_threshold);
        if ranked.is_empty() {
            reporter.resolve(
                ConceptStage::EvaluationFilter,
                JUDGE_SERVICE,
                StatusState::Failed,
                "No compliant concepts",
            );
            return Ok(self.clarify(
                &reporter,
                ConceptStage::EvaluationFilter,
                "No compliant concepts passed review. Try rephrasing the request.".to_string(),
            ));
        }
        reporter.resolve(
            ConceptStage::EvaluationFilter,
            JUDGE_SERVICE,
            StatusState::Complete,
            &format!("{} concepts passed review", ranked.len()),
        );

        // READY
        info!(stage = ConceptStage::Ready.as_str(), concepts = ranked.len(), "Concepts ready");
        reporter.finish(WorkflowPayload::selection(
            Some("Choose a creative direction".to_string()),
            ranked.clone(),
        ));
        Ok(ConceptOutcome::Ready { concepts: ranked })
    }

    /// Primary guidelines, then backup
    ///
    /// Inner `Err` is the combined critical-failure reason.
    async fn retrieve_context(&self, query: &str) -> Result<std::result::Result<String, String>> {
        let primary_error = match self
            .service
            .retrieve_guidelines(query, GuidelineSource::Primary)
            .await
        {
            Ok(GuidelineResponse::Found { result }) => return Ok(Ok(result)),
            Ok(GuidelineResponse::Unavailable { error }) => error,
            Err(e) => describe_failure(e)?,
        };
        warn!(error = %primary_error, "Primary guideline source failed, trying backup");

        let backup_error = match self
            .service
            .retrieve_guidelines(query, GuidelineSource::Backup)
            .await
        {
            Ok(GuidelineResponse::Found { result }) => {
                debug!("Using backup guideline subset");
                return Ok(Ok(result));
            }
            Ok(GuidelineResponse::Unavailable { error }) => error,
            Err(e) => describe_failure(e)?,
        };

        warn!(
            primary_error = %primary_error,
            backup_error = %backup_error,
            "Both guideline sources failed"
        );
        Ok(Err(format!(
            "Critical failure: brand guidelines unavailable (primary: {}; backup: {})",
            primary_error, backup_error
        )))
    }

    /// Score every concept concurrently
    ///
    /// A failed judge call drops that concept; a credential failure aborts.
    async fn evaluate_all(
        &self,
        prompt: &str,
        context: &str,
        concepts: Vec<CreativeConcept>,
    ) -> Result<Vec<CreativeConcept>> {
        let calls = concepts.into_iter().map(|concept| async move {
            let request = EvaluationRequest {
                user_input: prompt.to_string(),
                context: context.to_string(),
                candidate_concept: concept,
            };
            let result = self.service.evaluate_concept(&request).await;
            (request.candidate_concept, result)
        });

        let mut evaluated = Vec::new();
        for (mut concept, result) in join_all(calls).await {
            match result {
                Ok(evaluation) => {
                    debug!(concept_id = %concept.id, score = evaluation.score, "Concept scored");
                    concept.evaluation = Some(evaluation);
                    evaluated.push(concept);
                }
                Err(e) if e.kind() == ErrorKind::Credential => return Err(e),
                Err(e) => {
                    warn!(concept_id = %concept.id, error = %e, "Concept evaluation failed, dropping concept");
                }
            }
        }
        Ok(evaluated)
    }

    fn refuse(&self, reporter: &StageReporter<'_>, stage: ConceptStage, reason: String) -> ConceptOutcome {
        info!(stage = stage.as_str(), reason = %reason, "Pipeline refused request");
        reporter.finish(WorkflowPayload::text(reason.clone()));
        ConceptOutcome::Refusal { stage, reason }
    }

    fn clarify(&self, reporter: &StageReporter<'_>, stage: ConceptStage, reason: String) -> ConceptOutcome {
        info!(stage = stage.as_str(), reason = %reason, "Pipeline needs clarification");
        reporter.finish(WorkflowPayload::text(reason.clone()));
        ConceptOutcome::Clarification { stage, reason }
    }
}
