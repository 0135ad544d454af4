//! Creative concepts and their judge evaluations

use serde::{Deserialize, Serialize};

/// Judge verdict attached to a concept by the evaluation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// 0-10, higher is better
    pub score: f64,
    pub reasoning: String,
    #[serde(default)]
    pub violation_detected: bool,
}

/// One candidate creative direction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreativeConcept {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Free-form tag used for memory-pattern detection
    pub style: String,
    pub image_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl CreativeConcept {
    /// Judge score, if the concept has been evaluated
    pub fn score(&self) -> Option<f64> {
        self.evaluation.as_ref().map(|e| e.score)
    }
}
