//! Configuration file loading
//!
//! Settings live in `<config_dir>/huddle.toml`. Every field has a default,
//! so a missing file or a partial file is fine. Secrets are never read from
//! here; the network clients take them from the environment.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::mood::MoodSettings;

pub const CONFIG_FILE: &str = "huddle.toml";
pub const DEFAULT_NUDGE_COOLDOWN_SECS: i64 = 60;
pub const DEFAULT_REALTIME_ADDR: &str = "127.0.0.1:7878";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mood: MoodSettings,
    pub nudge: NudgeConfig,
    pub realtime: RealtimeConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgeConfig {
    pub cooldown_secs: i64,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_NUDGE_COOLDOWN_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Address of the change feed server
    pub addr: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_REALTIME_ADDR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory
    pub data_dir: Option<PathBuf>,
}

/// Platform directories for huddle
pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "onyx", "huddle").ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine data directory",
        ))
    })
}

impl Config {
    /// Default config file location
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if self.mood.interval_secs == 0 {
            return Err(Error::Validation(
                "mood.interval_secs must be at least 1".into(),
            ));
        }
        if self.mood.neutral_default > 100 {
            return Err(Error::Validation(
                "mood.neutral_default must be within 0..=100".into(),
            ));
        }
        if self.nudge.cooldown_secs < 0 {
            return Err(Error::Validation(
                "nudge.cooldown_secs must not be negative".into(),
            ));
        }
        Ok(())
    }

    /// Directory for the database and photo buckets
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(project_dirs()?.data_dir().to_path_buf()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::{MoodPersistence, MoodPolicy};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.mood.interval_secs, 15);
        assert_eq!(config.nudge.cooldown_secs, 60);
        assert_eq!(config.realtime.addr, "127.0.0.1:7878");
    }

    #[test]
    fn test_partial_mood_section() {
        let config = Config::from_toml(
            r#"
[mood]
policy = "absolute"
interval_secs = 5
persistence = "write_back"

[storage]
data_dir = "/tmp/huddle"
"#,
        )
        .unwrap();

        assert_eq!(config.mood.policy, MoodPolicy::Absolute);
        assert_eq!(config.mood.interval_secs, 5);
        assert_eq!(config.mood.boost_per_task, 20);
        assert_eq!(config.mood.persistence, MoodPersistence::WriteBack);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/huddle"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            Config::from_toml("[mood]\ninterval_secs = 0\n"),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            Config::from_toml("[mood]\npolicy = \"sideways\"\n"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.nudge.cooldown_secs = 120;
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
