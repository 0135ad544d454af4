//! Event types for the studio event system
//!
//! Provides the shared event definitions and the EventBus that carries
//! session updates to SSE clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{GeneratedCampaign, JobStatus, WorkflowPayload};

/// Studio event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StudioEvent {
    /// A payload was reconciled into the session history
    ///
    /// `replaced` is true when the payload overwrote the last entry in place.
    HistoryUpdated {
        index: usize,
        replaced: bool,
        payload: WorkflowPayload,
        timestamp: DateTime<Utc>,
    },

    /// History was cleared for a new request
    HistoryCleared { timestamp: DateTime<Utc> },

    /// Progress tick from a job poller
    JobProgress {
        campaign_id: Uuid,
        job_id: String,
        status: JobStatus,
        progress: f64,
        timestamp: DateTime<Utc>,
    },

    /// A campaign record was created or updated in place
    CampaignUpdated {
        campaign: GeneratedCampaign,
        timestamp: DateTime<Utc>,
    },

    /// A campaign was deleted by the user
    CampaignDeleted {
        campaign_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// A repeated style was detected; the workflow waits for consent
    MemoryPatternDetected {
        style: String,
        count: usize,
        timestamp: DateTime<Utc>,
    },

    /// User answered the memory prompt
    MemoryPatternResolved {
        style: String,
        saved: bool,
        timestamp: DateTime<Utc>,
    },

    /// Session reset: pollers stopped, history and memory discarded
    SessionReset { timestamp: DateTime<Utc> },
}

impl StudioEvent {
    /// SSE event name
    pub fn event_type(&self) -> &str {
        match self {
            StudioEvent::HistoryUpdated { .. } => "HistoryUpdated",
            StudioEvent::HistoryCleared { .. } => "HistoryCleared",
            StudioEvent::JobProgress { .. } => "JobProgress",
            StudioEvent::CampaignUpdated { .. } => "CampaignUpdated",
            StudioEvent::CampaignDeleted { .. } => "CampaignDeleted",
            StudioEvent::MemoryPatternDetected { .. } => "MemoryPatternDetected",
            StudioEvent::MemoryPatternResolved { .. } => "MemoryPatternResolved",
            StudioEvent::SessionReset { .. } => "SessionReset",
        }
    }
}

/// Broadcast bus for studio events
///
/// Cloning is cheap; all clones share one channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<StudioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of events to buffer before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<StudioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: StudioEvent,
    ) -> Result<usize, broadcast::error::SendError<StudioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: StudioEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
