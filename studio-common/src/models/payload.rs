//! Agent-to-UI workflow payloads
//!
//! Wire shape: `{ "componentType": ..., "componentData": {...}, "agentStatusTrace": [...] }`.
//! The typed [`ComponentData`] enum is converted through a raw form so that
//! `componentData` is decoded according to `componentType`.

use serde::{Deserialize, Serialize};

use super::CreativeConcept;

/// One backend sub-service that touched a workflow step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusEntry {
    pub service_name: String,
    pub status: String,
    #[serde(default)]
    pub identity_verified: bool,
}

impl AgentStatusEntry {
    pub fn new(service_name: impl Into<String>, status: impl Into<String>, identity_verified: bool) -> Self {
        Self {
            service_name: service_name.into(),
            status: status.into(),
            identity_verified,
        }
    }
}

/// Payload kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    SelectionCard,
    AsyncStatusBar,
    PermissionToggle,
    SystemAlert,
    Text,
}

impl ComponentType {
    /// Kinds that wait on a user decision
    pub fn is_interactive(self) -> bool {
        matches!(self, ComponentType::SelectionCard | ComponentType::PermissionToggle)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionCardData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Empty while the card is a loading skeleton
    #[serde(default)]
    pub concepts: Vec<CreativeConcept>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    InProgress,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBarData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    pub status: StatusState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionData {
    /// Style awaiting consent to be remembered
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept: Option<CreativeConcept>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertData {
    pub severity: AlertSeverity,
    pub message: String,
    /// Set when the alert demands re-authentication
    #[serde(default)]
    pub requires_reauth: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub message: String,
}

/// Variant-specific payload body
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentData {
    SelectionCard(SelectionCardData),
    AsyncStatusBar(StatusBarData),
    PermissionToggle(PermissionData),
    SystemAlert(AlertData),
    Text(TextData),
}

/// One unit of agent-to-UI communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPayload", into = "RawPayload")]
pub struct WorkflowPayload {
    pub data: ComponentData,
    pub agent_status_trace: Option<Vec<AgentStatusEntry>>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    component_type: ComponentType,
    #[serde(default)]
    component_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    agent_status_trace: Option<Vec<AgentStatusEntry>>,
}

impl TryFrom<RawPayload> for WorkflowPayload {
    type Error = serde_json::Error;

    fn try_from(raw: RawPayload) -> Result<Self, Self::Error> {
        let value = raw.component_data;
        let data = match raw.component_type {
            ComponentType::SelectionCard => ComponentData::SelectionCard(serde_json::from_value(value)?),
            ComponentType::AsyncStatusBar => ComponentData::AsyncStatusBar(serde_json::from_value(value)?),
            ComponentType::PermissionToggle => ComponentData::PermissionToggle(serde_json::from_value(value)?),
            ComponentType::SystemAlert => ComponentData::SystemAlert(serde_json::from_value(value)?),
            ComponentType::Text => ComponentData::Text(serde_json::from_value(value)?),
        };
        Ok(Self {
            data,
            agent_status_trace: raw.agent_status_trace,
        })
    }
}

impl From<WorkflowPayload> for RawPayload {
    fn from(payload: WorkflowPayload) -> Self {
        let component_type = payload.component_type();
        // Plain data structs with derived Serialize cannot fail to encode
        let component_data = match payload.data {
            ComponentData::SelectionCard(d) => serde_json::to_value(d),
            ComponentData::AsyncStatusBar(d) => serde_json::to_value(d),
            ComponentData::PermissionToggle(d) => serde_json::to_value(d),
            ComponentData::SystemAlert(d) => serde_json::to_value(d),
            ComponentData::Text(d) => serde_json::to_value(d),
        }
        .unwrap_or(serde_json::Value::Null);
        Self {
            component_type,
            component_data,
            agent_status_trace: payload.agent_status_trace,
        }
    }
}

impl WorkflowPayload {
    pub fn new(data: ComponentData) -> Self {
        Self {
            data,
            agent_status_trace: None,
        }
    }

    pub fn text(message: impl Into<String>) -> Self {
        Self::new(ComponentData::Text(TextData {
            message: message.into(),
        }))
    }

    pub fn alert(severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self::new(ComponentData::SystemAlert(AlertData {
            severity,
            message: message.into(),
            requires_reauth: false,
        }))
    }

    pub fn reauth_alert(message: impl Into<String>) -> Self {
        Self::new(ComponentData::SystemAlert(AlertData {
            severity: AlertSeverity::Error,
            message: message.into(),
            requires_reauth: true,
        }))
    }

    pub fn status(stage: impl Into<String>, status: StatusState, message: impl Into<String>) -> Self {
        Self::new(ComponentData::AsyncStatusBar(StatusBarData {
            job_id: None,
            stage: Some(stage.into()),
            status,
            progress: None,
            message: message.into(),
        }))
    }

    pub fn job_status(job_id: impl Into<String>, status: StatusState, progress: f64, message: impl Into<String>) -> Self {
        Self::new(ComponentData::AsyncStatusBar(StatusBarData {
            job_id: Some(job_id.into()),
            stage: None,
            status,
            progress: Some(progress),
            message: message.into(),
        }))
    }

    pub fn selection(title: Option<String>, concepts: Vec<CreativeConcept>) -> Self {
        Self::new(ComponentData::SelectionCard(SelectionCardData { title, concepts }))
    }

    pub fn permission(pattern: impl Into<String>, concept: Option<CreativeConcept>, message: impl Into<String>) -> Self {
        Self::new(ComponentData::PermissionToggle(PermissionData {
            pattern: pattern.into(),
            concept,
            message: message.into(),
        }))
    }

    pub fn with_trace(mut self, trace: Vec<AgentStatusEntry>) -> Self {
        self.agent_status_trace = Some(trace);
        self
    }

    pub fn component_type(&self) -> ComponentType {
        match self.data {
            ComponentData::SelectionCard(_) => ComponentType::SelectionCard,
            ComponentData::AsyncStatusBar(_) => ComponentType::AsyncStatusBar,
            ComponentData::PermissionToggle(_) => ComponentType::PermissionToggle,
            ComponentData::SystemAlert(_) => ComponentType::SystemAlert,
            ComponentData::Text(_) => ComponentType::Text,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.component_type().is_interactive()
    }

    /// Payloads that end a streaming run
    pub fn is_terminal(&self) -> bool {
        match &self.data {
            ComponentData::SelectionCard(card) => !card.concepts.is_empty(),
            ComponentData::PermissionToggle(_) | ComponentData::SystemAlert(_) => true,
            ComponentData::AsyncStatusBar(_) | ComponentData::Text(_) => false,
        }
    }
}
