//! Studio façade
//!
//! Owns the session and connects the pipelines, job poller and event bus to
//! it. Every payload a pipeline reports goes through a [`SessionSink`] bound
//! to the run it started in, so output from a superseded run never reaches
//! history. Job completions are gated on the session epoch: after a reset
//! nothing a poller produces is applied.

use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use studio_common::config::{StudioConfig, WorkflowConfig};
use studio_common::events::{EventBus, StudioEvent};
use studio_common::models::{
    AlertSeverity, AssetFormat, ComponentData, CreativeConcept, GeneratedCampaign, Job, JobStatus,
    StatusState, WorkflowPayload,
};
use studio_common::{Error, ErrorKind, Result};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::{CreativeService, WorkflowClient, WorkflowSettings, WorkflowSubmission};
use crate::session::{HistoryAction, HistorySnapshot, HistoryStore, PendingAsset, PendingPattern, RunToken, StudioSession};
use crate::workflow::{
    AssetOutcome, AssetPipeline, AssetSettings, AssetStage, CompletionCallback, ConceptOutcome,
    ConceptPipeline, ConceptSettings, EmitMode, JobPoller, PollingPolicy, ProgressSink,
};

const REAUTH_MESSAGE: &str = "The generation service rejected the API key. Select a valid key to continue.";

/// Result of selecting a concept
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Selection {
    /// Style repeated; asset generation waits for the memory answer
    AwaitingConsent { pattern: PendingPattern },
    Asset(AssetOutcome),
}

struct StudioInner {
    session: Mutex<StudioSession>,
    concept_pipeline: ConceptPipeline,
    asset_pipeline: AssetPipeline,
    poller: JobPoller,
    service: Arc<dyn CreativeService>,
    workflow_client: Arc<dyn WorkflowClient>,
    workflow_config: WorkflowConfig,
    event_bus: EventBus,
    /// One user request at a time
    run_lock: tokio::sync::Mutex<()>,
}

impl StudioInner {
    fn session(&self) -> MutexGuard<'_, StudioSession> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Routes pipeline payloads into history for one run
struct SessionSink<'a> {
    inner: &'a StudioInner,
    token: RunToken,
}

impl ProgressSink for SessionSink<'_> {
    fn emit(&self, mode: EmitMode, payload: WorkflowPayload) {
        let applied = {
            let mut session = self.inner.session();
            if !session.is_current(self.token) {
                debug!(component = ?payload.component_type(), "Dropping payload from superseded run");
                return;
            }
            session
                .history
                .dispatch(HistoryAction::from_emit(mode, payload.clone()))
        };

        if let Some(applied) = applied {
            self.inner.event_bus.emit_lossy(StudioEvent::HistoryUpdated {
                index: applied.index,
                replaced: applied.replaced,
                payload,
                timestamp: Utc::now(),
            });
        }
    }

    fn settle(&self) {
        let mut session = self.inner.session();
        if session.is_current(self.token) {
            session.history.dispatch(HistoryAction::Settle);
        }
    }
}

/// Cloneable handle to one studio session
#[derive(Clone)]
pub struct Studio {
    inner: Arc<StudioInner>,
}

impl Studio {
    pub fn new(
        config: &StudioConfig,
        service: Arc<dyn CreativeService>,
        workflow_client: Arc<dyn WorkflowClient>,
        event_bus: EventBus,
    ) -> Self {
        let inner = StudioInner {
            session: Mutex::new(StudioSession::new(config.workflow.memory_pattern_threshold)),
            concept_pipeline: ConceptPipeline::new(
                service.clone(),
                ConceptSettings::from_config(&config.workflow),
            ),
            asset_pipeline: AssetPipeline::new(
                service.clone(),
                AssetSettings::from_config(&config.workflow),
            ),
            poller: JobPoller::new(service.clone(), PollingPolicy::from(&config.polling)),
            service,
            workflow_client,
            workflow_config: config.workflow.clone(),
            event_bus,
            run_lock: tokio::sync::Mutex::new(()),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    fn sink(&self, token: RunToken) -> SessionSink<'_> {
        SessionSink {
            inner: &self.inner,
            token,
        }
    }

    fn start_run(&self) -> (RunToken, Vec<CreativeConcept>, Vec<WorkflowPayload>) {
        let (token, selections, previous) = {
            let mut session = self.inner.session();
            let previous = session.history.payloads();
            let selections = session.memory.selections().to_vec();
            (session.begin_run(), selections, previous)
        };
        self.inner
            .event_bus
            .emit_lossy(StudioEvent::HistoryCleared { timestamp: Utc::now() });
        (token, selections, previous)
    }

    /// Surface a failed run in history
    fn report_failure(&self, sink: &SessionSink<'_>, err: &Error) {
        let kind = err.kind();
        error!(error = %err, kind = ?kind, "Workflow run failed");
        let payload = match kind {
            ErrorKind::Credential => WorkflowPayload::reauth_alert(REAUTH_MESSAGE),
            _ => WorkflowPayload::alert(AlertSeverity::Error, err.to_string()),
        };
        sink.emit(EmitMode::Append, payload);
    }

    /// Run the concept pipeline for a new prompt
    ///
    /// Clears history first. Refusals and clarifications are returned as
    /// outcomes; only hard failures are errors.
    pub async fn generate_concepts(&self, prompt: &str) -> Result<ConceptOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::InvalidInput("Prompt must not be empty".to_string()));
        }

        let _run = self.inner.run_lock.lock().await;
        let (token, selections, _) = self.start_run();
        let sink = self.sink(token);
        info!(run = token.run, "Concept run started");

        match self.inner.concept_pipeline.run(prompt, &selections, &sink).await {
            Ok(outcome) => {
                if let ConceptOutcome::Ready { concepts } = &outcome {
                    let mut session = self.inner.session();
                    if session.is_current(token) {
                        session.concepts = concepts.clone();
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                self.report_failure(&sink, &e);
                Err(e)
            }
        }
    }

    /// Select one of the offered concepts and generate its asset
    ///
    /// When the selection completes a style pattern the asset is parked until
    /// [`Studio::confirm_memory`] or [`Studio::decline_memory`].
    pub async fn select_concept(&self, concept_id: &str, format: AssetFormat) -> Result<Selection> {
        let _run = self.inner.run_lock.lock().await;

        let (token, concept, pattern) = {
            let mut session = self.inner.session();
            if let Some(pending) = session.memory.pending() {
                return Err(Error::InvalidInput(format!(
                    "Answer the memory prompt for the {} style first",
                    pending.style
                )));
            }
            let concept = session
                .find_concept(concept_id)
                .cloned()
                .ok_or_else(|| Error::NotFound(format!("Concept {}", concept_id)))?;

            let pattern = if session.memory.record_selection(concept.clone()) {
                session.pending_asset = Some(PendingAsset {
                    concept: concept.clone(),
                    format,
                });
                session.memory.pending().cloned()
            } else {
                None
            };
            (session.token(), concept, pattern)
        };

        if let Some(pattern) = pattern {
            self.sink(token).emit(
                EmitMode::Append,
                WorkflowPayload::permission(
                    pattern.style.clone(),
                    Some(concept),
                    format!(
                        "You have chosen the {} style {} times. Remember it for future campaigns?",
                        pattern.style, pattern.count
                    ),
                ),
            );
            self.inner.event_bus.emit_lossy(StudioEvent::MemoryPatternDetected {
                style: pattern.style.clone(),
                count: pattern.count,
                timestamp: Utc::now(),
            });
            return Ok(Selection::AwaitingConsent { pattern });
        }

        let outcome = self.run_asset(token, &concept, format).await?;
        Ok(Selection::Asset(outcome))
    }

    /// Remember the pending style, then resume the parked asset
    pub async fn confirm_memory(&self) -> Result<AssetOutcome> {
        self.resolve_memory(true).await
    }

    /// Forget the pending style prompt, then resume the parked asset
    pub async fn decline_memory(&self) -> Result<AssetOutcome> {
        self.resolve_memory(false).await
    }

    async fn resolve_memory(&self, save: bool) -> Result<AssetOutcome> {
        let _run = self.inner.run_lock.lock().await;

        let (token, pattern, parked) = {
            let mut session = self.inner.session();
            let pattern = if save {
                session.memory.confirm_save()
            } else {
                session.memory.decline_save()
            }
            .ok_or_else(|| Error::InvalidInput("No style pattern is awaiting an answer".to_string()))?;
            let parked = session.pending_asset.take();
            (session.token(), pattern, parked)
        };
        let PendingAsset { concept, format } = parked.ok_or_else(|| {
            Error::Internal(format!("No asset parked behind the {} style prompt", pattern.style))
        })?;

        let saved = if save {
            match self.inner.service.save_style_preference(&pattern.style).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(style = %pattern.style, error = %e, "Saving style preference failed");
                    false
                }
            }
        } else {
            false
        };
        info!(style = %pattern.style, save, saved, "Memory prompt answered");

        self.inner.event_bus.emit_lossy(StudioEvent::MemoryPatternResolved {
            style: pattern.style.clone(),
            saved,
            timestamp: Utc::now(),
        });
        let note = match (save, saved) {
            (true, true) => format!("Saved {} as a preferred style.", pattern.style),
            (true, false) => format!("Could not save the {} style; continuing.", pattern.style),
            (false, _) => format!("The {} style will not be remembered.", pattern.style),
        };
        self.sink(token).emit(EmitMode::Append, WorkflowPayload::text(note));

        self.run_asset(token, &concept, format).await
    }

    async fn run_asset(
        &self,
        token: RunToken,
        concept: &CreativeConcept,
        format: AssetFormat,
    ) -> Result<AssetOutcome> {
        let sink = self.sink(token);
        let outcome = match self.inner.asset_pipeline.run(concept, format, &sink).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.report_failure(&sink, &e);
                return Err(e);
            }
        };

        match &outcome {
            AssetOutcome::Ready { campaign } => self.store_campaign(token, campaign.clone()),
            AssetOutcome::InFlight { campaign } => {
                self.store_campaign(token, campaign.clone());
                self.attach_poller(token, campaign);
            }
            AssetOutcome::Refusal { .. } => {}
        }
        Ok(outcome)
    }

    fn store_campaign(&self, token: RunToken, campaign: GeneratedCampaign) {
        {
            let mut session = self.inner.session();
            if !session.is_live(token) {
                debug!(campaign_id = %campaign.campaign_id, "Session reset, discarding campaign");
                return;
            }
            session.upsert_campaign(campaign.clone());
        }
        self.inner.event_bus.emit_lossy(StudioEvent::CampaignUpdated {
            campaign,
            timestamp: Utc::now(),
        });
    }

    fn attach_poller(&self, token: RunToken, campaign: &GeneratedCampaign) {
        let Some(job_id) = campaign.job_id.clone() else {
            return;
        };
        let campaign_id = campaign.campaign_id;
        let weak = Arc::downgrade(&self.inner);

        let on_complete: CompletionCallback = {
            let weak = weak.clone();
            Box::new(move |media_url: String| {
                if let Some(inner) = weak.upgrade() {
                    Studio { inner }.finish_campaign(token, campaign_id, media_url);
                }
            })
        };

        let progress = {
            let mut session = self.inner.session();
            if !session.is_live(token) {
                return;
            }
            let handle = self.inner.poller.track_job(job_id.clone(), Some(on_complete));
            let progress = handle.subscribe();
            session.attach_poller(campaign_id, handle);
            progress
        };

        info!(
            campaign_id = %campaign_id,
            job_id = %job_id,
            stage = AssetStage::AsyncPoll.as_str(),
            "Job poller attached"
        );
        tokio::spawn(watch_job_progress(weak, token, campaign_id, progress));
    }

    /// Apply a completed job's media URL to its campaign
    fn finish_campaign(&self, token: RunToken, campaign_id: Uuid, media_url: String) {
        let updated = {
            let mut session = self.inner.session();
            if !session.is_live(token) {
                debug!(campaign_id = %campaign_id, "Discarding job result for a reset session");
                return;
            }
            session.complete_campaign(campaign_id, media_url).cloned()
        };

        match updated {
            Some(campaign) => {
                info!(campaign_id = %campaign_id, "Campaign complete");
                self.inner.event_bus.emit_lossy(StudioEvent::CampaignUpdated {
                    campaign,
                    timestamp: Utc::now(),
                });
            }
            None => debug!(campaign_id = %campaign_id, "Campaign deleted before its job finished"),
        }
    }

    fn apply_job_progress(&self, token: RunToken, campaign_id: Uuid, job: &Job) {
        let payload = match job.status {
            JobStatus::Complete => {
                WorkflowPayload::job_status(job.id.clone(), StatusState::Complete, 100.0, "Render complete")
            }
            JobStatus::Failed => WorkflowPayload::job_status(
                job.id.clone(),
                StatusState::Failed,
                job.progress,
                job.error.clone().unwrap_or_else(|| "Render failed".to_string()),
            ),
            JobStatus::Pending | JobStatus::Processing => WorkflowPayload::job_status(
                job.id.clone(),
                StatusState::InProgress,
                job.progress,
                "Rendering",
            ),
        };

        let (applied, failed) = {
            let mut session = self.inner.session();
            if !session.is_live(token) {
                return;
            }
            let applied = if session.is_current(token) {
                let applied = session.history.upsert(payload.clone());
                if job.status.is_terminal() {
                    session.history.dispatch(HistoryAction::Settle);
                }
                Some(applied)
            } else {
                None
            };
            let failed = if job.status == JobStatus::Failed {
                session.fail_campaign(campaign_id).cloned()
            } else {
                None
            };
            (applied, failed)
        };

        let bus = &self.inner.event_bus;
        bus.emit_lossy(StudioEvent::JobProgress {
            campaign_id,
            job_id: job.id.clone(),
            status: job.status,
            progress: job.progress,
            timestamp: Utc::now(),
        });
        if let Some(applied) = applied {
            bus.emit_lossy(StudioEvent::HistoryUpdated {
                index: applied.index,
                replaced: applied.replaced,
                payload,
                timestamp: Utc::now(),
            });
        }
        if let Some(campaign) = failed {
            warn!(campaign_id = %campaign_id, error = ?job.error, "Campaign render failed");
            bus.emit_lossy(StudioEvent::CampaignUpdated {
                campaign,
                timestamp: Utc::now(),
            });
        }
    }

    /// Submit a prompt to the remote workflow endpoint and reconcile the reply
    ///
    /// The payloads of the previous run are sent along as context. A
    /// selection card in the reply makes its concepts selectable.
    pub async fn submit_workflow(
        &self,
        prompt: &str,
        format: AssetFormat,
        uploaded_image: Option<String>,
    ) -> Result<Vec<WorkflowPayload>> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::InvalidInput("Prompt must not be empty".to_string()));
        }

        let _run = self.inner.run_lock.lock().await;
        let (token, _, previous) = self.start_run();
        let sink = self.sink(token);

        let submission = WorkflowSubmission {
            prompt: prompt.to_string(),
            session_history: previous,
            settings: WorkflowSettings::from_config(format, &self.inner.workflow_config),
            uploaded_image,
        };

        let payloads = match self.inner.workflow_client.submit(&submission).await {
            Ok(payloads) => payloads,
            Err(e) => {
                self.report_failure(&sink, &e);
                return Err(e);
            }
        };
        info!(
            client = self.inner.workflow_client.client_name(),
            count = payloads.len(),
            "Workflow reply received"
        );

        for payload in &payloads {
            sink.emit(HistoryStore::streaming_mode(payload.component_type()), payload.clone());
        }

        let offered = payloads.iter().rev().find_map(|p| match &p.data {
            ComponentData::SelectionCard(card) if !card.concepts.is_empty() => Some(card.concepts.clone()),
            _ => None,
        });
        if let Some(concepts) = offered {
            let mut session = self.inner.session();
            if session.is_current(token) {
                session.concepts = concepts;
            }
        }

        Ok(payloads)
    }

    pub fn history(&self) -> HistorySnapshot {
        self.inner.session().history.snapshot()
    }

    pub fn campaigns(&self) -> Vec<GeneratedCampaign> {
        self.inner.session().campaigns().to_vec()
    }

    pub fn campaign(&self, campaign_id: Uuid) -> Option<GeneratedCampaign> {
        self.inner.session().campaign(campaign_id).cloned()
    }

    pub fn pending_pattern(&self) -> Option<PendingPattern> {
        self.inner.session().memory.pending().cloned()
    }

    pub fn active_pollers(&self) -> usize {
        self.inner.session().active_pollers()
    }

    /// Delete a campaign, stopping its poller if still rendering
    pub fn delete_campaign(&self, campaign_id: Uuid) -> Result<GeneratedCampaign> {
        let removed = self
            .inner
            .session()
            .remove_campaign(campaign_id)
            .ok_or_else(|| Error::NotFound(format!("Campaign {}", campaign_id)))?;
        info!(campaign_id = %campaign_id, "Campaign deleted");
        self.inner.event_bus.emit_lossy(StudioEvent::CampaignDeleted {
            campaign_id,
            timestamp: Utc::now(),
        });
        Ok(removed)
    }

    /// Discard the whole session and stop every poller
    pub fn reset(&self) {
        let stopped = self.inner.session().reset();
        info!(stopped_pollers = stopped, "Session reset");
        self.inner
            .event_bus
            .emit_lossy(StudioEvent::SessionReset { timestamp: Utc::now() });
    }
}

/// Mirror poller state changes into history and events until terminal
async fn watch_job_progress(
    inner: Weak<StudioInner>,
    token: RunToken,
    campaign_id: Uuid,
    mut progress: watch::Receiver<Job>,
) {
    loop {
        if progress.changed().await.is_err() {
            break;
        }
        let job = progress.borrow_and_update().clone();
        let Some(inner) = inner.upgrade() else {
            break;
        };
        Studio { inner }.apply_job_progress(token, campaign_id, &job);
        if job.is_terminal() {
            break;
        }
    }
}
