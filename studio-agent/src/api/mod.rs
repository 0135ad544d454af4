//! HTTP API handlers for studio-agent
//!
//! REST endpoints drive the session; `/studio/events` streams every change.

pub mod health;
pub mod sse;
pub mod studio;
pub mod workflow;

pub use health::health_routes;
pub use sse::studio_event_stream;
pub use studio::studio_routes;
pub use workflow::workflow_routes;
