//! Configuration loading and config-file resolution
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Per-user config directory
//! 4. Built-in defaults (no file)

use crate::models::ImageQuality;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "STUDIO_CONFIG";

/// Environment variable overriding `remote.api_key`
pub const API_KEY_ENV_VAR: &str = "STUDIO_API_KEY";

const CONFIG_DIR_NAME: &str = "creative-studio";
const CONFIG_FILE_NAME: &str = "studio-agent.toml";

/// Top-level studio configuration (TOML)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    pub workflow: WorkflowConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// Creative generation backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the generation service; `None` runs fully offline
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    /// Client-side rate limit for the paid backend
    pub requests_per_second: u32,
    /// Force the canned offline services even when `base_url` is set
    pub use_canned: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            request_timeout_secs: 30,
            requests_per_second: 5,
            use_canned: false,
        }
    }
}

impl RemoteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// True when the canned services stand in for the backend
    pub fn is_offline(&self) -> bool {
        self.use_canned || self.base_url.is_none()
    }
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Minimum judge score (0-10) for a concept to reach the user
    pub evaluation_threshold: f64,
    pub concept_count: usize,
    /// Primary retries before failover
    pub max_retries: u32,
    /// Selections of one style that trigger the memory prompt
    pub memory_pattern_threshold: usize,
    pub image_quality: ImageQuality,
    pub aspect_ratio: String,
    pub voice_profile: String,
    /// Alternate voice used when the primary voice keeps failing
    pub fallback_voice_profile: Option<String>,
    pub language: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            evaluation_threshold: 5.0,
            concept_count: 3,
            max_retries: 1,
            memory_pattern_threshold: 3,
            image_quality: ImageQuality::Uhd4k,
            aspect_ratio: "16:9".to_string(),
            voice_profile: "narrator-warm".to_string(),
            fallback_voice_profile: Some("narrator-neutral".to_string()),
            language: "en-US".to_string(),
        }
    }
}

/// Job polling cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub fast_interval_ms: u64,
    pub slow_interval_ms: u64,
    /// Elapsed time after which polling switches to the slow interval
    pub fast_window_ms: u64,
    /// Delay after a failed poll request
    pub error_retry_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast_interval_ms: 2000,
            slow_interval_ms: 5000,
            fast_window_ms: 10000,
            error_retry_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl StudioConfig {
    /// Validate value ranges
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=10.0).contains(&self.workflow.evaluation_threshold) {
            return Err(Error::Config(format!(
                "workflow.evaluation_threshold must be within 0-10, got {}",
                self.workflow.evaluation_threshold
            )));
        }
        if self.workflow.concept_count == 0 {
            return Err(Error::Config("workflow.concept_count must be at least 1".to_string()));
        }
        if self.workflow.memory_pattern_threshold == 0 {
            return Err(Error::Config(
                "workflow.memory_pattern_threshold must be at least 1".to_string(),
            ));
        }
        if self.remote.requests_per_second == 0 {
            return Err(Error::Config("remote.requests_per_second must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Resolve, load and validate configuration
    ///
    /// Missing config files are not an error: defaults are used. The API key
    /// environment variable always wins over the file.
    pub fn load(cli_arg: Option<&Path>) -> Result<Self> {
        let mut config = match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            None => {
                info!("No configuration file found, using defaults");
                StudioConfig::default()
            }
        };

        if let Ok(key) = std::env::var(API_KEY_ENV_VAR) {
            if key.trim().is_empty() {
                warn!("{} is set but empty, ignoring", API_KEY_ENV_VAR);
            } else {
                config.remote.api_key = Some(key);
            }
        }

        config.validate()?;
        Ok(config)
    }
}

/// Config file location following the priority order above
///
/// A CLI path is returned even if it does not exist so that loading fails
/// loudly; env and default locations are only used when present.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Per-user config directory
    default_config_path().filter(|p| p.exists())
}

/// `<config_dir>/creative-studio/studio-agent.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<StudioConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: StudioConfig = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = StudioConfig::default();
        assert_eq!(config.workflow.evaluation_threshold, 5.0);
        assert_eq!(config.workflow.max_retries, 1);
        assert_eq!(config.workflow.memory_pattern_threshold, 3);
        assert_eq!(config.polling.fast_interval_ms, 2000);
        assert_eq!(config.polling.slow_interval_ms, 5000);
        assert_eq!(config.polling.fast_window_ms, 10000);
        assert_eq!(config.polling.error_retry_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: StudioConfig = toml::from_str(
            r#"
            [workflow]
            evaluation_threshold = 6.5
            image_quality = "2k"
            "#,
        )
        .unwrap();
        assert_eq!(config.workflow.evaluation_threshold, 6.5);
        assert_eq!(config.workflow.image_quality, ImageQuality::Uhd2k);
        assert_eq!(config.workflow.concept_count, 3);
        assert_eq!(config.server.port, 5780);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut config = StudioConfig::default();
        config.workflow.evaluation_threshold = 11.0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn offline_unless_a_backend_is_configured() {
        let mut remote = RemoteConfig::default();
        assert!(remote.is_offline());

        remote.base_url = Some("https://studio.example.test/api".to_string());
        assert!(!remote.is_offline());

        remote.use_canned = true;
        assert!(remote.is_offline());
    }

    #[test]
    fn cli_path_wins_even_if_missing() {
        let path = Path::new("/nonexistent/studio.toml");
        assert_eq!(
            resolve_config_path(Some(path), "STUDIO_TEST_UNSET_VAR"),
            Some(path.to_path_buf())
        );
    }
}
