//! Streaming payload reconciler
//!
//! Single-writer store for the session history. All mutation goes through
//! [`HistoryAction`]s so the replace-vs-append rule lives in one place:
//!
//! - `Add` always appends.
//! - `Upsert` replaces the last entry in place when it has the same
//!   component type, and appends otherwise.
//! - `Clear` empties history and forgets the active component.
//! - `Settle` marks the run finished once its last payload has landed.
//!
//! Any payload carrying an agent status trace makes it the current trace.
//! Interactive payloads (selection card, permission toggle) become the active
//! component; other kinds never change it.

use serde::Serialize;
use std::sync::Mutex;
use studio_common::models::{AgentStatusEntry, ComponentType, WorkflowPayload};
use uuid::Uuid;

use crate::workflow::{EmitMode, ProgressSink};

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryAction {
    Add(WorkflowPayload),
    Upsert(WorkflowPayload),
    Clear,
    Settle,
}

impl HistoryAction {
    pub fn from_emit(mode: EmitMode, payload: WorkflowPayload) -> Self {
        match mode {
            EmitMode::Upsert => HistoryAction::Upsert(payload),
            EmitMode::Append => HistoryAction::Add(payload),
        }
    }
}

/// Lifecycle of the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Empty,
    Streaming,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// Stable across in-place replacement
    pub id: Uuid,
    pub payload: WorkflowPayload,
}

/// Where a payload landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub index: usize,
    pub replaced: bool,
}

/// Serializable view for API responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySnapshot {
    pub entries: Vec<HistoryEntry>,
    pub current_trace: Option<Vec<AgentStatusEntry>>,
    pub active_component: Option<Uuid>,
    pub state: RunState,
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    entries: Vec<HistoryEntry>,
    current_trace: Option<Vec<AgentStatusEntry>>,
    active_component: Option<Uuid>,
    state: RunState,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            current_trace: None,
            active_component: None,
            state: RunState::Empty,
        }
    }

    /// Default merge mode for payloads arriving from a stream
    ///
    /// Status bars animate in place and a populated selection card replaces
    /// its skeleton; everything else is a discrete message.
    pub fn streaming_mode(component_type: ComponentType) -> EmitMode {
        match component_type {
            ComponentType::AsyncStatusBar | ComponentType::SelectionCard => EmitMode::Upsert,
            ComponentType::PermissionToggle | ComponentType::SystemAlert | ComponentType::Text => {
                EmitMode::Append
            }
        }
    }

    /// Apply one action; returns where the payload landed (`None` for Clear and Settle)
    pub fn dispatch(&mut self, action: HistoryAction) -> Option<Applied> {
        match action {
            HistoryAction::Add(payload) => Some(self.append(payload)),
            HistoryAction::Upsert(payload) => Some(self.upsert(payload)),
            HistoryAction::Clear => {
                self.clear();
                None
            }
            HistoryAction::Settle => {
                self.settle();
                None
            }
        }
    }

    pub fn append(&mut self, payload: WorkflowPayload) -> Applied {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            payload,
        };
        self.observe(&entry);
        self.entries.push(entry);
        Applied {
            index: self.entries.len() - 1,
            replaced: false,
        }
    }

    pub fn upsert(&mut self, payload: WorkflowPayload) -> Applied {
        let index = match self.entries.last() {
            Some(last) if last.payload.component_type() == payload.component_type() => {
                self.entries.len() - 1
            }
            _ => return self.append(payload),
        };

        let entry = HistoryEntry {
            id: self.entries[index].id,
            payload,
        };
        self.observe(&entry);
        self.entries[index] = entry;
        Applied {
            index,
            replaced: true,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.active_component = None;
        self.current_trace = None;
        self.state = RunState::Empty;
    }

    /// End the current run; an empty history stays empty
    pub fn settle(&mut self) {
        if !self.entries.is_empty() {
            self.state = RunState::Settled;
        }
    }

    fn observe(&mut self, entry: &HistoryEntry) {
        if let Some(trace) = &entry.payload.agent_status_trace {
            self.current_trace = Some(trace.clone());
        }
        if entry.payload.is_interactive() {
            self.active_component = Some(entry.id);
        }
        self.state = if entry.payload.is_terminal() {
            RunState::Settled
        } else {
            RunState::Streaming
        };
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn payloads(&self) -> Vec<WorkflowPayload> {
        self.entries.iter().map(|e| e.payload.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current_trace(&self) -> Option<&[AgentStatusEntry]> {
        self.current_trace.as_deref()
    }

    /// The entry currently awaiting a user decision
    pub fn active_component(&self) -> Option<&HistoryEntry> {
        let id = self.active_component?;
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            entries: self.entries.clone(),
            current_trace: self.current_trace.clone(),
            active_component: self.active_component,
            state: self.state,
        }
    }
}

/// A bare store can stand in as a sink (tests, offline replays)
impl ProgressSink for Mutex<HistoryStore> {
    fn emit(&self, mode: EmitMode, payload: WorkflowPayload) {
        let mut store = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        store.dispatch(HistoryAction::from_emit(mode, payload));
    }

    fn settle(&self) {
        let mut store = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        store.dispatch(HistoryAction::Settle);
    }
}
