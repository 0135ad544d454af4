//! Remote workflow submission endpoint

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use studio_common::models::{AssetFormat, WorkflowPayload};

use crate::error::ApiResult;
use crate::session::HistorySnapshot;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub prompt: String,
    #[serde(default = "default_format")]
    pub format: AssetFormat,
    /// Base64 data URL of a reference image
    #[serde(default)]
    pub uploaded_image: Option<String>,
}

fn default_format() -> AssetFormat {
    AssetFormat::Image
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub payloads: Vec<WorkflowPayload>,
    pub history: HistorySnapshot,
}

/// POST /workflow/submit
pub async fn submit_workflow(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> ApiResult<Json<SubmitResponse>> {
    let payloads = state
        .studio
        .submit_workflow(&req.prompt, req.format, req.uploaded_image)
        .await?;
    Ok(Json(SubmitResponse {
        payloads,
        history: state.studio.history(),
    }))
}

pub fn workflow_routes() -> Router<AppState> {
    Router::new().route("/workflow/submit", post(submit_workflow))
}
