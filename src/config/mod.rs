use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;

const APP_DIR: &str = "ingame-jukebox";

/// Player configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Volume in percent applied at startup
    pub default_volume: f32,
    pub preferred_device: Option<String>,
    /// Explicit yt-dlp binary; otherwise `JUKEBOX_YTDLP`, then PATH
    pub extractor_path: Option<PathBuf>,
    /// Explicit ffmpeg binary or directory; otherwise `JUKEBOX_FFMPEG`, install paths, PATH
    pub transcoder_path: Option<PathBuf>,
    /// Folder under the system temp dir that holds extracted audio
    pub scratch_subdir: String,
    pub extraction_timeout_secs: u64,
    pub scratch_retention_secs: u64,
    pub sweep_interval_secs: u64,
    /// Upper bound for direct HTTP downloads held in memory
    pub max_stream_bytes: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 80.0,
            preferred_device: None,
            extractor_path: None,
            transcoder_path: None,
            scratch_subdir: APP_DIR.to_string(),
            extraction_timeout_secs: 300,
            scratch_retention_secs: 60 * 60,
            sweep_interval_secs: 10 * 60,
            max_stream_bytes: 256 * 1024 * 1024,
        }
    }
}

impl PlayerConfig {
    pub fn scratch_dir(&self) -> PathBuf {
        std::env::temp_dir().join(&self.scratch_subdir)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs.max(1))
    }

    pub fn scratch_retention(&self) -> Duration {
        Duration::from_secs(self.scratch_retention_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        let config = match Self::load_config(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Ignoring unreadable config at {}: {}", config_path.display(), e);
                PlayerConfig::default()
            }
        };

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Use an explicit file instead of the per-user location
    pub fn with_path(config_path: PathBuf) -> Result<Self, ConfigError> {
        let config = Self::load_config(&config_path)?;
        Ok(Self {
            config,
            config_path,
        })
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn set_volume(&mut self, volume: f32) -> Result<(), ConfigError> {
        self.config.default_volume = crate::models::Volume::new(volume).percent();
        self.save_config()
    }

    pub fn set_preferred_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.config.preferred_device = device;
        self.save_config()
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(APP_DIR);

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_config_manager() -> (ConfigManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let config_manager = ConfigManager {
            config: PlayerConfig::default(),
            config_path,
        };

        (config_manager, temp_dir)
    }

    #[test]
    fn test_player_config_default() {
        let config = PlayerConfig::default();

        assert_eq!(config.default_volume, 80.0);
        assert_eq!(config.preferred_device, None);
        assert_eq!(config.extraction_timeout(), Duration::from_secs(300));
        assert_eq!(config.scratch_retention(), Duration::from_secs(3600));
        assert!(config.scratch_dir().ends_with("ingame-jukebox"));
        assert!(config.scratch_dir().starts_with(std::env::temp_dir()));
    }

    #[test]
    fn test_config_serialization() {
        let config = PlayerConfig {
            default_volume: 55.0,
            preferred_device: Some("Headset".to_string()),
            extractor_path: Some(PathBuf::from("/opt/yt-dlp")),
            scratch_subdir: "jukebox-test".to_string(),
            ..PlayerConfig::default()
        };

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: PlayerConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config.default_volume, deserialized.default_volume);
        assert_eq!(config.preferred_device, deserialized.preferred_device);
        assert_eq!(config.extractor_path, deserialized.extractor_path);
        assert_eq!(config.scratch_subdir, deserialized.scratch_subdir);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PlayerConfig = toml::from_str("default_volume = 30.0\n").unwrap();
        assert_eq!(config.default_volume, 30.0);
        assert_eq!(config.sweep_interval_secs, 600);
        assert_eq!(config.scratch_subdir, "ingame-jukebox");
    }

    #[test]
    fn test_save_and_load_config() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.config.default_volume = 60.0;
        config_manager.config.transcoder_path = Some(PathBuf::from("/usr/local/bin/ffmpeg"));
        config_manager.save_config().unwrap();

        let loaded_config = ConfigManager::load_config(&config_manager.config_path).unwrap();
        assert_eq!(loaded_config.default_volume, 60.0);
        assert_eq!(loaded_config.transcoder_path, Some(PathBuf::from("/usr/local/bin/ffmpeg")));
    }

    #[test]
    fn test_load_nonexistent_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = ConfigManager::load_config(&temp_dir.path().join("nonexistent.toml")).unwrap();
        assert_eq!(config.default_volume, PlayerConfig::default().default_volume);
    }

    #[test]
    fn test_load_invalid_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.toml");
        fs::write(&config_path, "invalid toml content [[[").unwrap();

        match ConfigManager::load_config(&config_path) {
            Err(ConfigError::DeserializationError(_)) => {}
            other => panic!("Expected DeserializationError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_set_volume_clamps() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.set_volume(70.0).unwrap();
        assert_eq!(config_manager.config.default_volume, 70.0);

        config_manager.set_volume(150.0).unwrap();
        assert_eq!(config_manager.config.default_volume, 100.0);

        config_manager.set_volume(-5.0).unwrap();
        assert_eq!(config_manager.config.default_volume, 0.0);
    }

    #[test]
    fn test_preferred_device_persists() {
        let (mut config_manager, _temp_dir) = create_test_config_manager();

        config_manager.set_preferred_device(Some("Speakers".to_string())).unwrap();
        config_manager.set_volume(45.0).unwrap();

        let reloaded = ConfigManager::with_path(config_manager.config_path.clone()).unwrap();
        assert_eq!(reloaded.get_config().default_volume, 45.0);
        assert_eq!(reloaded.get_config().preferred_device, Some("Speakers".to_string()));

        config_manager.set_preferred_device(None).unwrap();
        let reloaded = ConfigManager::with_path(config_manager.config_path.clone()).unwrap();
        assert_eq!(reloaded.get_config().preferred_device, None);
    }

    #[test]
    fn test_config_path_creation() {
        let temp_dir = TempDir::new().unwrap();
        let nested_path = temp_dir.path().join("nested").join("config").join("config.toml");

        let config_manager = ConfigManager {
            config: PlayerConfig::default(),
            config_path: nested_path.clone(),
        };
        config_manager.save_config().unwrap();

        assert!(nested_path.exists());
    }
}
