//! Studio session endpoints
//!
//! Every mutating call returns the resulting history snapshot alongside its
//! outcome so simple clients can skip the event stream.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use studio_common::models::{AssetFormat, GeneratedCampaign};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::session::{HistorySnapshot, PendingPattern};
use crate::studio::Selection;
use crate::workflow::{AssetOutcome, ConceptOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ConceptRequest {
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct ConceptResponse {
    #[serde(flatten)]
    pub outcome: ConceptOutcome,
    pub history: HistorySnapshot,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub concept_id: String,
    #[serde(default = "default_format")]
    pub format: AssetFormat,
}

fn default_format() -> AssetFormat {
    AssetFormat::Image
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectResponse {
    pub awaiting_consent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<PendingPattern>,
    #[serde(flatten)]
    pub asset: Option<AssetOutcome>,
    pub history: HistorySnapshot,
}

#[derive(Debug, Serialize)]
pub struct AssetResponse {
    #[serde(flatten)]
    pub outcome: AssetOutcome,
    pub history: HistorySnapshot,
}

#[derive(Debug, Serialize)]
pub struct MemoryResponse {
    pub pending: Option<PendingPattern>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// POST /studio/concepts
pub async fn generate_concepts(
    State(state): State<AppState>,
    Json(req): Json<ConceptRequest>,
) -> ApiResult<Json<ConceptResponse>> {
    let outcome = state.studio.generate_concepts(&req.prompt).await?;
    Ok(Json(ConceptResponse {
        outcome,
        history: state.studio.history(),
    }))
}

/// POST /studio/select
pub async fn select_concept(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> ApiResult<Json<SelectResponse>> {
    let selection = state.studio.select_concept(&req.concept_id, req.format).await?;
    let (awaiting_consent, pattern, asset) = match selection {
        Selection::AwaitingConsent { pattern } => (true, Some(pattern), None),
        Selection::Asset(outcome) => (false, None, Some(outcome)),
    };
    Ok(Json(SelectResponse {
        awaiting_consent,
        pattern,
        asset,
        history: state.studio.history(),
    }))
}

/// GET /studio/memory
pub async fn pending_memory(State(state): State<AppState>) -> Json<MemoryResponse> {
    Json(MemoryResponse {
        pending: state.studio.pending_pattern(),
    })
}

/// POST /studio/memory/confirm
pub async fn confirm_memory(State(state): State<AppState>) -> ApiResult<Json<AssetResponse>> {
    let outcome = state.studio.confirm_memory().await?;
    Ok(Json(AssetResponse {
        outcome,
        history: state.studio.history(),
    }))
}

/// POST /studio/memory/decline
pub async fn decline_memory(State(state): State<AppState>) -> ApiResult<Json<AssetResponse>> {
    let outcome = state.studio.decline_memory().await?;
    Ok(Json(AssetResponse {
        outcome,
        history: state.studio.history(),
    }))
}

/// GET /studio/history
pub async fn get_history(State(state): State<AppState>) -> Json<HistorySnapshot> {
    Json(state.studio.history())
}

/// GET /studio/campaigns
pub async fn list_campaigns(State(state): State<AppState>) -> Json<Vec<GeneratedCampaign>> {
    Json(state.studio.campaigns())
}

/// GET /studio/campaigns/:id
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<GeneratedCampaign>> {
    state
        .studio
        .campaign(campaign_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Campaign {}", campaign_id)))
}

/// DELETE /studio/campaigns/:id
pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<GeneratedCampaign>> {
    let removed = state.studio.delete_campaign(campaign_id)?;
    Ok(Json(removed))
}

/// POST /studio/reset
pub async fn reset_session(State(state): State<AppState>) -> Json<StatusResponse> {
    info!("Session reset requested");
    state.studio.reset();
    Json(StatusResponse {
        status: "reset".to_string(),
    })
}

/// Build studio session routes
pub fn studio_routes() -> Router<AppState> {
    Router::new()
        .route("/studio/concepts", post(generate_concepts))
        .route("/studio/select", post(select_concept))
        .route("/studio/memory", get(pending_memory))
        .route("/studio/memory/confirm", post(confirm_memory))
        .route("/studio/memory/decline", post(decline_memory))
        .route("/studio/history", get(get_history))
        .route("/studio/campaigns", get(list_campaigns))
        .route(
            "/studio/campaigns/:id",
            get(get_campaign).delete(delete_campaign),
        )
        .route("/studio/reset", post(reset_session))
}
