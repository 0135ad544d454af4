//! Session memory: style-selection tally and the consent prompt
//!
//! The prompt fires once per style, on the selection that brings that
//! style's count to exactly the threshold. Later selections of the same style
//! never prompt again within the session.

use serde::Serialize;
use std::collections::HashMap;
use studio_common::models::CreativeConcept;

/// A detected style repetition waiting for the user's answer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingPattern {
    pub style: String,
    /// The selection that triggered the prompt
    pub concept: CreativeConcept,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct SessionMemory {
    selections: Vec<CreativeConcept>,
    style_counts: HashMap<String, usize>,
    pending: Option<PendingPattern>,
    threshold: usize,
}

fn style_key(style: &str) -> String {
    style.trim().to_lowercase()
}

impl SessionMemory {
    pub fn new(threshold: usize) -> Self {
        Self {
            selections: Vec::new(),
            style_counts: HashMap::new(),
            pending: None,
            threshold: threshold.max(1),
        }
    }

    /// Record a selection; true when it raises a pattern prompt
    pub fn record_selection(&mut self, concept: CreativeConcept) -> bool {
        let count = {
            let count = self.style_counts.entry(style_key(&concept.style)).or_insert(0);
            *count += 1;
            *count
        };
        self.selections.push(concept.clone());

        if count != self.threshold {
            return false;
        }

        tracing::info!(style = %concept.style, count, "Style pattern detected");
        self.pending = Some(PendingPattern {
            style: concept.style.clone(),
            concept,
            count,
        });
        true
    }

    /// User agreed to remember the pattern
    pub fn confirm_save(&mut self) -> Option<PendingPattern> {
        self.pending.take()
    }

    /// User declined; the workflow resumes all the same
    pub fn decline_save(&mut self) -> Option<PendingPattern> {
        self.pending.take()
    }

    pub fn pending(&self) -> Option<&PendingPattern> {
        self.pending.as_ref()
    }

    pub fn selections(&self) -> &[CreativeConcept] {
        &self.selections
    }

    pub fn style_count(&self, style: &str) -> usize {
        self.style_counts.get(&style_key(style)).copied().unwrap_or(0)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concept(id: &str, style: &str) -> CreativeConcept {
        CreativeConcept {
            id: id.to_string(),
            title: format!("{} concept", style),
            description: String::new(),
            style: style.to_string(),
            image_prompt: String::new(),
            video_prompt: None,
            voiceover_prompt: None,
            duration_seconds: None,
            evaluation: None,
        }
    }

    #[test]
    fn pattern_fires_exactly_on_third_selection() {
        let mut memory = SessionMemory::new(3);
        let results: Vec<bool> = ["A", "A", "B", "A", "A"]
            .iter()
            .enumerate()
            .map(|(i, style)| memory.record_selection(concept(&i.to_string(), style)))
            .collect();

        assert_eq!(results, vec![false, false, false, true, false]);
        assert_eq!(memory.style_count("A"), 4);
        assert_eq!(memory.selections().len(), 5);
    }

    #[test]
    fn pending_pattern_carries_triggering_concept() {
        let mut memory = SessionMemory::new(2);
        memory.record_selection(concept("c1", "Retro"));
        assert!(memory.pending().is_none());
        assert!(memory.record_selection(concept("c2", "Retro")));

        let pending = memory.pending().unwrap();
        assert_eq!(pending.style, "Retro");
        assert_eq!(pending.concept.id, "c2");
        assert_eq!(pending.count, 2);
    }

    #[test]
    fn confirm_and_decline_both_clear_pending() {
        let mut memory = SessionMemory::new(1);
        assert!(memory.record_selection(concept("c1", "Retro")));
        assert!(memory.confirm_save().is_some());
        assert!(memory.pending().is_none());
        assert!(memory.confirm_save().is_none());

        assert!(memory.record_selection(concept("c2", "Cinematic")));
        assert_eq!(memory.decline_save().map(|p| p.style), Some("Cinematic".to_string()));
        assert!(memory.pending().is_none());
    }

    #[test]
    fn style_matching_ignores_case_and_whitespace() {
        let mut memory = SessionMemory::new(3);
        assert!(!memory.record_selection(concept("1", "Retro")));
        assert!(!memory.record_selection(concept("2", " retro")));
        assert!(memory.record_selection(concept("3", "RETRO ")));
    }
}
