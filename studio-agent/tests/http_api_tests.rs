//! HTTP routing tests
//!
//! Exercise the router with `oneshot` requests against a scripted backend.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use helpers::{studio_with, ScriptedService};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use studio_agent::{build_router, AppState};
use studio_common::config::StudioConfig;
use tower::ServiceExt;

fn test_app(service: Arc<ScriptedService>) -> Router {
    let studio = studio_with(service);
    build_router(AppState::new(studio, StudioConfig::default()))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_module_identity() {
    // Given: a running router
    let app = test_app(Arc::new(ScriptedService::default()));

    // When: GET /health
    let (status, body) = send(&app, get("/health")).await;

    // Then
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "studio-agent");
    assert_eq!(body["active_jobs"], 0);
    assert_eq!(body["offline"], true);
}

#[tokio::test]
async fn health_reports_live_backend() {
    let mut config = StudioConfig::default();
    config.remote.base_url = Some("https://studio.example.com".to_string());
    let service = Arc::new(ScriptedService::default());
    let app = build_router(AppState::new(
        helpers::studio_with_config(service.clone(), &config),
        config,
    ));

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["offline"], false);
}

#[tokio::test]
async fn concept_request_returns_outcome_and_history() {
    let app = test_app(Arc::new(ScriptedService::default()));

    let (status, body) = send(
        &app,
        post_json("/studio/concepts", json!({ "prompt": "Spring launch for a trail shoe" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ready");
    assert_eq!(body["concepts"].as_array().unwrap().len(), 2);
    assert_eq!(body["concepts"][0]["id"], "c1");
    assert_eq!(body["history"]["state"], "settled");
    assert_eq!(body["history"]["entries"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn empty_prompt_is_bad_request() {
    let app = test_app(Arc::new(ScriptedService::default()));

    let (status, body) = send(&app, post_json("/studio/concepts", json!({ "prompt": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn rejected_key_maps_to_unauthorized() {
    let service = Arc::new(ScriptedService::default());
    service.reject_credentials.store(true, Ordering::SeqCst);
    let app = test_app(service);

    let (status, body) = send(&app, post_json("/studio/concepts", json!({ "prompt": "Any brief" }))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "CREDENTIAL_REQUIRED");

    // The re-auth alert is still visible in history
    let (_, history) = send(&app, get("/studio/history")).await;
    let entries = history["entries"].as_array().unwrap();
    assert_eq!(entries.last().unwrap()["payload"]["componentType"], "SystemAlert");
}

#[tokio::test]
async fn select_then_list_campaigns() {
    let app = test_app(Arc::new(ScriptedService::default()));
    send(&app, post_json("/studio/concepts", json!({ "prompt": "Spring launch for a trail shoe" }))).await;

    // When: image selection
    let (status, body) = send(
        &app,
        post_json("/studio/select", json!({ "conceptId": "c2", "format": "image" })),
    )
    .await;

    // Then: ready campaign
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["awaitingConsent"], false);
    assert_eq!(body["outcome"], "ready");
    assert_eq!(body["campaign"]["status"], "complete");
    let campaign_id = body["campaign"]["campaignId"].as_str().unwrap().to_string();

    let (status, list) = send(&app, get("/studio/campaigns")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, one) = send(&app, get(&format!("/studio/campaigns/{}", campaign_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["id"], "c2");
}

#[tokio::test]
async fn unknown_concept_is_not_found() {
    let app = test_app(Arc::new(ScriptedService::default()));
    send(&app, post_json("/studio/concepts", json!({ "prompt": "Spring launch for a trail shoe" }))).await;

    let (status, body) = send(&app, post_json("/studio/select", json!({ "conceptId": "nope" }))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn delete_removes_campaign_once() {
    let app = test_app(Arc::new(ScriptedService::default()));
    send(&app, post_json("/studio/concepts", json!({ "prompt": "Spring launch for a trail shoe" }))).await;
    let (_, body) = send(&app, post_json("/studio/select", json!({ "conceptId": "c1" }))).await;
    let uri = format!("/studio/campaigns/{}", body["campaign"]["campaignId"].as_str().unwrap());

    let delete = || Request::builder().method("DELETE").uri(&uri).body(Body::empty()).unwrap();
    let (first, _) = send(&app, delete()).await;
    let (second, _) = send(&app, delete()).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn memory_prompt_round_trip() {
    let mut config = StudioConfig::default();
    config.workflow.memory_pattern_threshold = 1;
    let service = Arc::new(ScriptedService::default());
    let app = build_router(AppState::new(
        helpers::studio_with_config(service.clone(), &config),
        config,
    ));
    send(&app, post_json("/studio/concepts", json!({ "prompt": "Spring launch for a trail shoe" }))).await;

    // When: the first selection already meets the threshold
    let (_, body) = send(&app, post_json("/studio/select", json!({ "conceptId": "c1" }))).await;

    // Then: the prompt is pending
    assert_eq!(body["awaitingConsent"], true);
    assert_eq!(body["pattern"]["style"], "Minimalist");
    let (_, pending) = send(&app, get("/studio/memory")).await;
    assert_eq!(pending["pending"]["style"], "Minimalist");

    // When: confirmed
    let (status, body) = send(&app, post_json("/studio/memory/confirm", json!({}))).await;

    // Then: asset generated and nothing pending
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "ready");
    let (_, pending) = send(&app, get("/studio/memory")).await;
    assert!(pending["pending"].is_null());
    let (status, _) = send(&app, post_json("/studio/memory/decline", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reset_clears_history() {
    let app = test_app(Arc::new(ScriptedService::default()));
    send(&app, post_json("/studio/concepts", json!({ "prompt": "Spring launch for a trail shoe" }))).await;

    let (status, body) = send(&app, post_json("/studio/reset", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "reset");

    let (_, history) = send(&app, get("/studio/history")).await;
    assert!(history["entries"].as_array().unwrap().is_empty());
    assert_eq!(history["state"], "empty");
}

#[tokio::test]
async fn workflow_submit_reconciles_payloads() {
    let app = test_app(Arc::new(ScriptedService::default()));

    let (status, body) = send(
        &app,
        post_json("/workflow/submit", json!({ "prompt": "Spring launch", "format": "video" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payloads"].as_array().unwrap().len(), 4);
    // Two status bars collapse into one entry
    assert_eq!(body["history"]["entries"].as_array().unwrap().len(), 3);
}
