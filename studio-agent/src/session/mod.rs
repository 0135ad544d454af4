//! Studio session state
//!
//! One [`StudioSession`] owns everything a user session accumulates: history,
//! style memory, the latest concept set, generated campaigns and the pollers
//! finishing them. Two counters gate asynchronous completions:
//!
//! - `epoch` changes on reset; results from an older epoch are dropped.
//! - `run` changes whenever history is cleared; payloads from an older run
//!   no longer reach history.

pub mod history;
pub mod memory;

pub use history::{Applied, HistoryAction, HistoryEntry, HistorySnapshot, HistoryStore, RunState};
pub use memory::{PendingPattern, SessionMemory};

use std::collections::HashMap;
use studio_common::models::{AssetFormat, CampaignStatus, CreativeConcept, GeneratedCampaign};
use uuid::Uuid;

use crate::workflow::JobHandle;

/// Asset request parked behind the memory consent prompt
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAsset {
    pub concept: CreativeConcept,
    pub format: AssetFormat,
}

/// Liveness token captured when async work starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunToken {
    pub epoch: u64,
    pub run: u64,
}

#[derive(Debug)]
pub struct StudioSession {
    epoch: u64,
    run: u64,
    pub history: HistoryStore,
    pub memory: SessionMemory,
    /// Latest ready concept set; selections must come from here
    pub concepts: Vec<CreativeConcept>,
    /// Insertion ordered
    campaigns: Vec<GeneratedCampaign>,
    pub pending_asset: Option<PendingAsset>,
    pollers: HashMap<Uuid, JobHandle>,
}

impl StudioSession {
    pub fn new(memory_threshold: usize) -> Self {
        Self {
            epoch: 0,
            run: 0,
            history: HistoryStore::new(),
            memory: SessionMemory::new(memory_threshold),
            concepts: Vec::new(),
            campaigns: Vec::new(),
            pending_asset: None,
            pollers: HashMap::new(),
        }
    }

    pub fn token(&self) -> RunToken {
        RunToken {
            epoch: self.epoch,
            run: self.run,
        }
    }

    /// Same session, same history run
    pub fn is_current(&self, token: RunToken) -> bool {
        self.epoch == token.epoch && self.run == token.run
    }

    /// Same session (history may have been cleared since)
    pub fn is_live(&self, token: RunToken) -> bool {
        self.epoch == token.epoch
    }

    /// Clear history for a brand-new request and take ownership of it
    ///
    /// An unanswered memory prompt is abandoned along with its parked asset.
    pub fn begin_run(&mut self) -> RunToken {
        self.run += 1;
        self.history.dispatch(HistoryAction::Clear);
        self.concepts.clear();
        self.memory.decline_save();
        self.pending_asset = None;
        self.token()
    }

    /// Discard everything and stop every poller
    pub fn reset(&mut self) -> usize {
        self.epoch += 1;
        self.run += 1;
        self.history.dispatch(HistoryAction::Clear);
        self.memory = SessionMemory::new(self.memory.threshold());
        self.concepts.clear();
        self.campaigns.clear();
        self.pending_asset = None;

        let stopped = self.pollers.len();
        for (_, handle) in self.pollers.drain() {
            handle.cancel();
        }
        stopped
    }

    pub fn find_concept(&self, concept_id: &str) -> Option<&CreativeConcept> {
        self.concepts.iter().find(|c| c.id == concept_id)
    }

    pub fn campaigns(&self) -> &[GeneratedCampaign] {
        &self.campaigns
    }

    pub fn campaign(&self, campaign_id: Uuid) -> Option<&GeneratedCampaign> {
        self.campaigns.iter().find(|c| c.campaign_id == campaign_id)
    }

    /// Insert or replace by campaign id, keeping the original position
    pub fn upsert_campaign(&mut self, campaign: GeneratedCampaign) {
        match self
            .campaigns
            .iter_mut()
            .find(|c| c.campaign_id == campaign.campaign_id)
        {
            Some(existing) => *existing = campaign,
            None => self.campaigns.push(campaign),
        }
    }

    /// Finish an in-flight campaign in place; `None` if it no longer exists
    pub fn complete_campaign(&mut self, campaign_id: Uuid, media_url: String) -> Option<&GeneratedCampaign> {
        self.pollers.remove(&campaign_id);
        let campaign = self
            .campaigns
            .iter_mut()
            .find(|c| c.campaign_id == campaign_id)?;
        campaign.media_url = Some(media_url);
        campaign.status = CampaignStatus::Complete;
        Some(&*campaign)
    }

    pub fn fail_campaign(&mut self, campaign_id: Uuid) -> Option<&GeneratedCampaign> {
        self.pollers.remove(&campaign_id);
        let campaign = self
            .campaigns
            .iter_mut()
            .find(|c| c.campaign_id == campaign_id)?;
        campaign.status = CampaignStatus::Failed;
        Some(&*campaign)
    }

    /// Delete a campaign and stop its poller
    pub fn remove_campaign(&mut self, campaign_id: Uuid) -> Option<GeneratedCampaign> {
        if let Some(handle) = self.pollers.remove(&campaign_id) {
            handle.cancel();
        }
        let index = self
            .campaigns
            .iter()
            .position(|c| c.campaign_id == campaign_id)?;
        Some(self.campaigns.remove(index))
    }

    pub fn attach_poller(&mut self, campaign_id: Uuid, handle: JobHandle) {
        if let Some(previous) = self.pollers.insert(campaign_id, handle) {
            previous.cancel();
        }
    }

    pub fn active_pollers(&self) -> usize {
        self.pollers.len()
    }
}
