//! HTTP client for the creative-generation backend
//!
//! JSON over HTTPS with bearer authentication. Every request waits on a
//! client-side rate limiter so retries cannot flood the paid backend.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::num::NonZeroU32;
use studio_common::config::RemoteConfig;
use studio_common::models::{CreativeConcept, Evaluation};
use studio_common::{Error, Result};
use tracing::debug;

use super::contract::{
    ComplianceRequest, ComplianceVerdict, CreativeService, EvaluationRequest, GenerationResponse,
    GuidelineResponse, GuidelineSource, ImageRequest, JobPollResponse, SynthesisRequest,
    SynthesisResponse, TriageVerdict, VideoRequest, VoiceoverRequest,
};

const USER_AGENT: &str = concat!("studio-agent/", env!("CARGO_PKG_VERSION"));

pub struct HttpCreativeService {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl HttpCreativeService {
    /// Build a client from the `[remote]` config section
    ///
    /// Fails if no base URL is configured.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| Error::Config("remote.base_url is not set".to_string()))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            Error::Config("remote.requests_per_second must be at least 1".to_string())
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.send(self.client.get(self.url(path))).await
    }

    async fn send<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R> {
        self.execute(request)
            .await?
            .json::<R>()
            .await
            .map_err(|e| Error::Parse(format!("Invalid response body: {}", e)))
    }

    /// POST where only the status matters (the body may be empty)
    async fn post_ack<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        self.execute(self.client.post(self.url(path)).json(body)).await?;
        Ok(())
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response> {
        self.rate_limiter.until_ready().await;

        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Creative backend returned an error");
            return Err(Error::from_remote(status.as_u16(), remote_message(&body)));
        }
        Ok(response)
    }
}

/// Pull a human-readable message out of an error body
///
/// Accepts `{"message"}`, `{"error": "..."}` and `{"error": {"message"}}`;
/// anything else is returned as-is.
pub(crate) fn remote_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    value
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| value.get("error").and_then(|e| e.as_str()))
        .or_else(|| {
            value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl CreativeService for HttpCreativeService {
    fn service_name(&self) -> &'static str {
        "http"
    }

    async fn classify(&self, request: &str) -> Result<TriageVerdict> {
        self.post("/triage", &json!({ "request": request })).await
    }

    async fn delegate_compliance(&self, request: &ComplianceRequest) -> Result<ComplianceVerdict> {
        self.post("/compliance/delegate", request).await
    }

    async fn retrieve_guidelines(
        &self,
        query: &str,
        source: GuidelineSource,
    ) -> Result<GuidelineResponse> {
        let path = format!("/guidelines/{}", source.as_str());
        self.post(&path, &json!({ "query": query })).await
    }

    async fn synthesize_concepts(&self, request: &SynthesisRequest) -> Result<SynthesisResponse> {
        self.post("/concepts/synthesize", request).await
    }

    async fn evaluate_concept(&self, request: &EvaluationRequest) -> Result<Evaluation> {
        self.post("/concepts/evaluate", request).await
    }

    async fn generate_image(&self, request: &ImageRequest) -> Result<GenerationResponse> {
        self.post("/generate/image", request).await
    }

    async fn generate_video(&self, request: &VideoRequest) -> Result<GenerationResponse> {
        self.post("/generate/video", request).await
    }

    async fn generate_voiceover(&self, request: &VoiceoverRequest) -> Result<GenerationResponse> {
        self.post("/generate/voiceover", request).await
    }

    async fn poll_job(&self, job_id: &str) -> Result<JobPollResponse> {
        self.get(&format!("/jobs/{}", job_id)).await
    }

    async fn log_preference(&self, concept: &CreativeConcept) -> Result<()> {
        self.post_ack("/memory/preferences", concept).await
    }

    async fn save_style_preference(&self, style: &str) -> Result<()> {
        self.post_ack("/memory/styles", &json!({ "style": style })).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_base_url_is_config_error() {
        let config = RemoteConfig::default();
        assert!(matches!(
            HttpCreativeService::new(&config),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = RemoteConfig {
            base_url: Some("https://studio.example.test/api/".to_string()),
            ..RemoteConfig::default()
        };
        let service = HttpCreativeService::new(&config).unwrap();
        assert_eq!(service.url("/triage"), "https://studio.example.test/api/triage");
    }

    #[test]
    fn remote_message_shapes() {
        assert_eq!(remote_message(r#"{"message":"quota exceeded"}"#), "quota exceeded");
        assert_eq!(remote_message(r#"{"error":"bad prompt"}"#), "bad prompt");
        assert_eq!(
            remote_message(r#"{"error":{"code":404,"message":"Requested entity was not found."}}"#),
            "Requested entity was not found."
        );
        assert_eq!(remote_message("upstream timeout\n"), "upstream timeout");
    }
}
