use crate::vton::GenerationMode;
use serde::{Deserialize, Serialize};
use std::{env, path::Path, time::Duration};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_FAL_MODEL_PATH: &str = "fal-ai/nano-banana-pro";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read settings file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid settings yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

/// Tunables for the try-on pipeline and the publish step.
///
/// Every field has a default, so an empty (or absent) YAML file is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VtonSettings {
    pub vision: VisionSettings,
    pub generation: GenerationSettings,
    pub polling: PollingSettings,
    pub listing: ListingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionSettings {
    /// Candidate models, tried strictly in order.
    pub models: Vec<String>,
    /// Case-sensitive substrings that mark a completion as a refusal.
    pub refusal_phrases: Vec<String>,
    pub fallback_description: String,
    pub max_tokens: u32,
}

impl Default for VisionSettings {
    fn default() -> Self {
        Self {
            models: vec!["gpt-4o".into(), "gpt-4o-mini".into()],
            refusal_phrases: vec![
                "I'm sorry".into(),
                "I can't".into(),
                "I cannot".into(),
                "I am unable".into(),
                "I'm unable".into(),
            ],
            fallback_description: "a clearly photographed subject with natural proportions, \
                true-to-life colors and realistic fabric texture"
                .into(),
            max_tokens: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model_path: String,
    pub aspect_ratio: String,
    pub resolution: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_FAL_MODEL_PATH.into(),
            aspect_ratio: "9:16".into(),
            resolution: "2K".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
    pub max_attempts: ModeAttempts,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            max_attempts: ModeAttempts::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeAttempts {
    pub regular: u32,
    pub ghost: u32,
    pub fabric: u32,
    pub sizechart: u32,
}

impl Default for ModeAttempts {
    fn default() -> Self {
        Self {
            regular: 180,
            ghost: 120,
            fabric: 120,
            sizechart: 120,
        }
    }
}

impl ModeAttempts {
    pub fn for_mode(&self, mode: GenerationMode) -> u32 {
        match mode {
            GenerationMode::Regular => self.regular,
            GenerationMode::Ghost => self.ghost,
            GenerationMode::Fabric => self.fabric,
            GenerationMode::SizeChart => self.sizechart,
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    pub vendor: String,
    pub product_type: String,
    pub sku_prefix: String,
    pub copy_model: String,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            vendor: "Atelier Paftalı".into(),
            product_type: "Kadın Giyim".into(),
            sku_prefix: "PFT".into(),
            copy_model: "gpt-4o".into(),
        }
    }
}

impl VtonSettings {
    /// Load from `VTON_CONFIG` (if set) and apply env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut settings = match env::var("VTON_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        settings.apply_env_overrides();
        settings.validate()?;
        info!(
            target = "vton.config",
            vision_models = ?settings.vision.models,
            poll_interval_ms = settings.polling.interval_ms,
            "pipeline settings loaded"
        );
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Vision needs a primary model and at least one fallback; every mode
    /// needs at least one status check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vision.models.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "vision.models needs a primary and at least one fallback, got {:?}",
                self.vision.models
            )));
        }
        if self.generation.model_path.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid("generation.model_path is empty".into()));
        }
        for mode in [
            GenerationMode::Regular,
            GenerationMode::Ghost,
            GenerationMode::Fabric,
            GenerationMode::SizeChart,
        ] {
            if self.polling.max_attempts.for_mode(mode) == 0 {
                return Err(ConfigError::Invalid(format!(
                    "polling.max_attempts.{mode} must be at least 1"
                )));
            }
        }
        if self.polling.interval_ms == 0 {
            return Err(ConfigError::Invalid("polling.interval_ms must be positive".into()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(models) = env::var("VTON_VISION_MODELS") {
            let models = split_list(&models);
            if !models.is_empty() {
                self.vision.models = models;
            }
        }
        if let Ok(path) = env::var("FAL_MODEL_PATH")
            && !path.trim().is_empty()
        {
            self.generation.model_path = path.trim().to_string();
        }
        if let Some(interval) = env::var("VTON_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            self.polling.interval_ms = interval;
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let settings = VtonSettings::from_yaml_str("").expect("defaults");
        assert_eq!(settings.vision.models, vec!["gpt-4o", "gpt-4o-mini"]);
        assert_eq!(settings.polling.interval_ms, 5_000);
        assert_eq!(settings.polling.max_attempts.regular, 180);
        assert_eq!(settings.polling.max_attempts.sizechart, 120);
        assert_eq!(settings.generation.aspect_ratio, "9:16");
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let raw = r#"
vision:
  models: [primary-vision, backup-vision]
  refusal_phrases: ["Sorry,"]
polling:
  max_attempts:
    ghost: 10
"#;
        let settings = VtonSettings::from_yaml_str(raw).expect("parse");
        assert_eq!(settings.vision.models, vec!["primary-vision", "backup-vision"]);
        assert_eq!(settings.vision.refusal_phrases, vec!["Sorry,"]);
        assert_eq!(settings.vision.max_tokens, 500);
        assert_eq!(settings.polling.max_attempts.ghost, 10);
        assert_eq!(settings.polling.max_attempts.regular, 180);
        assert_eq!(
            settings.polling.max_attempts.for_mode(GenerationMode::Ghost),
            10
        );
        assert_eq!(settings.listing.sku_prefix, "PFT");
    }

    #[test]
    fn malformed_yaml_is_rejected() {
        let err = VtonSettings::from_yaml_str("vision: [not, a, map]").expect_err("invalid");
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn defaults_pass_validation() {
        assert!(VtonSettings::default().validate().is_ok());
    }

    #[test]
    fn single_vision_model_is_rejected() {
        let settings = VtonSettings::from_yaml_str("vision:\n  models: [gpt-4o]\n").unwrap();
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));

        let settings = VtonSettings::from_yaml_str("vision:\n  models: []\n").unwrap();
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn zero_poll_attempts_are_rejected() {
        let raw = "polling:\n  max_attempts:\n    sizechart: 0\n";
        let settings = VtonSettings::from_yaml_str(raw).unwrap();
        match settings.validate() {
            Err(ConfigError::Invalid(message)) => assert!(message.contains("sizechart")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn list_splitting_drops_blanks() {
        assert_eq!(split_list(" a, ,b ,"), vec!["a", "b"]);
    }
}
