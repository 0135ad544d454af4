//! Rendered assets (campaigns) and generation settings

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CreativeConcept;

/// Requested output medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Image,
    Video,
    Voiceover,
}

impl AssetFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetFormat::Image => "image",
            AssetFormat::Video => "video",
            AssetFormat::Voiceover => "voiceover",
        }
    }
}

/// Image quality tier, highest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImageQuality {
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "2k")]
    Uhd2k,
    #[serde(rename = "4k")]
    Uhd4k,
}

impl ImageQuality {
    /// Next-lower tier used as the failover target; `None` at the 720p floor
    pub fn downgrade(self) -> Option<Self> {
        match self {
            ImageQuality::Uhd4k => Some(ImageQuality::Uhd2k),
            ImageQuality::Uhd2k => Some(ImageQuality::Hd1080),
            ImageQuality::Hd1080 => Some(ImageQuality::Hd720),
            ImageQuality::Hd720 => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ImageQuality::Uhd4k => "4k",
            ImageQuality::Uhd2k => "2k",
            ImageQuality::Hd1080 => "1080p",
            ImageQuality::Hd720 => "720p",
        }
    }
}

impl Default for ImageQuality {
    fn default() -> Self {
        ImageQuality::Uhd4k
    }
}

/// Campaign render state as shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Processing,
    Complete,
    Failed,
}

/// Outcome of the best-effort preference log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    Logged,
    Skipped,
}

/// Per-campaign recovery and compliance metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observability {
    pub compliance_score: f64,
    pub tool_failover_used: bool,
    pub retries: u32,
    pub memory_status: MemoryStatus,
}

/// A concept rendered (or being rendered) to a final asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCampaign {
    /// Stable record id; survives the job resolving
    pub campaign_id: Uuid,
    #[serde(flatten)]
    pub concept: CreativeConcept,
    /// Absent while the render job is in flight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub format: AssetFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub status: CampaignStatus,
    pub observability: Observability,
}

impl GeneratedCampaign {
    pub fn is_in_flight(&self) -> bool {
        self.status == CampaignStatus::Processing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_ladder_stops_at_floor() {
        let mut tier = ImageQuality::Uhd4k;
        let mut ladder = vec![tier];
        while let Some(next) = tier.downgrade() {
            ladder.push(next);
            tier = next;
        }
        assert_eq!(
            ladder,
            vec![
                ImageQuality::Uhd4k,
                ImageQuality::Uhd2k,
                ImageQuality::Hd1080,
                ImageQuality::Hd720
            ]
        );
    }

    #[test]
    fn quality_uses_short_wire_names() {
        let json = serde_json::to_string(&ImageQuality::Hd1080).unwrap();
        assert_eq!(json, "\"1080p\"");
        let parsed: ImageQuality = serde_json::from_str("\"4k\"").unwrap();
        assert_eq!(parsed, ImageQuality::Uhd4k);
    }
}
