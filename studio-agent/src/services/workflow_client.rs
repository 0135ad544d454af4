//! Workflow submission clients
//!
//! The live path posts a whole request to the agent backend and receives
//! workflow payloads back. When the backend cannot be reached at all the
//! [`FallbackWorkflowClient`] switches to a canned payload sequence; any
//! answer from the backend, including an error body, is passed through.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studio_common::config::{RemoteConfig, WorkflowConfig};
use studio_common::models::{
    AgentStatusEntry, AlertSeverity, AssetFormat, ImageQuality, StatusState, WorkflowPayload,
};
use studio_common::{classify_error, Error, ErrorKind, Result};
use tracing::{debug, warn};

use super::canned::sample_concepts;
use super::http_service::remote_message;

/// Output-format settings sent with a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSettings {
    pub format: AssetFormat,
    pub aspect_ratio: String,
    pub image_quality: ImageQuality,
    pub voice_profile: String,
    pub language: String,
}

impl WorkflowSettings {
    pub fn from_config(format: AssetFormat, config: &WorkflowConfig) -> Self {
        Self {
            format,
            aspect_ratio: config.aspect_ratio.clone(),
            image_quality: config.image_quality,
            voice_profile: config.voice_profile.clone(),
            language: config.language.clone(),
        }
    }
}

/// Body of `POST /workflow`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSubmission {
    pub prompt: String,
    pub session_history: Vec<WorkflowPayload>,
    pub settings: WorkflowSettings,
    /// Base64 data URL of a reference image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_image: Option<String>,
}

#[async_trait]
pub trait WorkflowClient: Send + Sync {
    fn client_name(&self) -> &'static str;

    async fn submit(&self, submission: &WorkflowSubmission) -> Result<Vec<WorkflowPayload>>;
}

/// Decode a success body: an array of payloads or a single payload object
pub fn decode_payloads(body: &str) -> Result<Vec<WorkflowPayload>> {
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("Workflow response is not JSON: {}", e)))?;
    if value.is_array() {
        serde_json::from_value(value)
            .map_err(|e| Error::Parse(format!("Invalid workflow payload list: {}", e)))
    } else {
        let payload: WorkflowPayload = serde_json::from_value(value)
            .map_err(|e| Error::Parse(format!("Invalid workflow payload: {}", e)))?;
        Ok(vec![payload])
    }
}

/// Turn a non-2xx JSON error body into a SystemAlert
///
/// Returns `None` when the body carries no `error`/`message` field, in which
/// case the caller treats the response as a hard remote error.
pub fn alert_from_error_body(body: &str) -> Option<WorkflowPayload> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if value.get("error").is_none() && value.get("message").is_none() {
        return None;
    }
    let message = remote_message(body);
    let alert = match classify_error(&message) {
        ErrorKind::Credential => WorkflowPayload::reauth_alert(message),
        _ => WorkflowPayload::alert(AlertSeverity::Error, message),
    };
    Some(alert)
}

pub struct HttpWorkflowClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpWorkflowClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| Error::Config("remote.base_url is not set".to_string()))?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/workflow", base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl WorkflowClient for HttpWorkflowClient {
    fn client_name(&self) -> &'static str {
        "http"
    }

    async fn submit(&self, submission: &WorkflowSubmission) -> Result<Vec<WorkflowPayload>> {
        let mut request = self.client.post(&self.endpoint).json(submission);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        if status.is_success() {
            return decode_payloads(&body);
        }

        debug!(status = status.as_u16(), "Workflow endpoint returned an error");
        match alert_from_error_body(&body) {
            Some(alert) => Ok(vec![alert]),
            None => Err(Error::from_remote(status.as_u16(), remote_message(&body))),
        }
    }
}

/// Offline payload sequence mirroring a live run
#[derive(Debug, Default)]
pub struct CannedWorkflowClient;

#[async_trait]
impl WorkflowClient for CannedWorkflowClient {
    fn client_name(&self) -> &'static str {
        "canned"
    }

    async fn submit(&self, submission: &WorkflowSubmission) -> Result<Vec<WorkflowPayload>> {
        let running = vec![AgentStatusEntry::new("workflow-router", "running", false)];
        let done = vec![
            AgentStatusEntry::new("workflow-router", "completed", false),
            AgentStatusEntry::new("concept-synthesizer", "completed", false),
        ];

        Ok(vec![
            WorkflowPayload::status("WORKFLOW", StatusState::InProgress, "Routing request")
                .with_trace(running),
            WorkflowPayload::status("WORKFLOW", StatusState::Complete, "Offline sample ready")
                .with_trace(done),
            WorkflowPayload::text(
                "The studio backend is unreachable, showing offline sample concepts.",
            ),
            WorkflowPayload::selection(
                Some("Sample directions".to_string()),
                sample_concepts(&submission.prompt),
            ),
        ])
    }
}

/// Live client with a canned fallback on transport failure
pub struct FallbackWorkflowClient {
    primary: Arc<dyn WorkflowClient>,
    fallback: Arc<dyn WorkflowClient>,
}

impl FallbackWorkflowClient {
    pub fn new(primary: Arc<dyn WorkflowClient>, fallback: Arc<dyn WorkflowClient>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl WorkflowClient for FallbackWorkflowClient {
    fn client_name(&self) -> &'static str {
        "fallback"
    }

    async fn submit(&self, submission: &WorkflowSubmission) -> Result<Vec<WorkflowPayload>> {
        match self.primary.submit(submission).await {
            Err(e) if e.is_transport() => {
                warn!(
                    primary = self.primary.client_name(),
                    fallback = self.fallback.client_name(),
                    error = %e,
                    "Workflow backend unreachable, using fallback payloads"
                );
                self.fallback.submit(submission).await
            }
            other => other,
        }
    }
}
