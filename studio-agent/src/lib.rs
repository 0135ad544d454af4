//! studio-agent library interface
//!
//! Exposes the studio façade, pipelines and HTTP router for integration
//! testing and for the `studio-agent` binary.

pub mod api;
pub mod error;
pub mod services;
pub mod session;
pub mod studio;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};
pub use crate::studio::{Selection, Studio};

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use studio_common::config::StudioConfig;
use studio_common::events::EventBus;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub studio: Studio,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub config: Arc<StudioConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(studio: Studio, config: StudioConfig) -> Self {
        Self {
            event_bus: studio.event_bus().clone(),
            studio,
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::studio_routes())
        .merge(api::workflow_routes())
        .route("/studio/events", get(api::studio_event_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
