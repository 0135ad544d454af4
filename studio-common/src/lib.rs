//! # Creative Studio Common Library
//!
//! Shared code for the studio agent service and its tooling:
//! - Data model (jobs, concepts, campaigns, workflow payloads)
//! - Event types (StudioEvent enum) and EventBus
//! - Error types and error classification
//! - Configuration loading
//! - SSE helpers

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;

pub use error::{classify_error, Error, ErrorKind, Result};
