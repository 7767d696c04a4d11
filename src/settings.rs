//! Runner settings with persistence
//!
//! Settings are saved to `~/.config/supermarket/settings.toml`

use std::fs;
use std::path::PathBuf;

use market_core::TimeConfig;
use market_sim::StoreLayout;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// All runner settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimSettings {
    #[serde(default)]
    pub run: RunSettings,
    #[serde(default)]
    pub time: TimeConfig,
    #[serde(default)]
    pub player: PlayerSettings,
    #[serde(default)]
    pub layout: StoreLayout,
}

impl SimSettings {
    /// Get the config directory path
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("supermarket"))
    }

    /// Get the settings file path
    fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.toml"))
    }

    /// Whether a settings file has been written before
    pub fn exists() -> bool {
        Self::settings_path().is_some_and(|p| p.exists())
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            warn!("Could not determine config directory");
            return Self::default();
        };

        if !path.exists() {
            info!("No settings file found, using defaults");
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    Self::validated(settings)
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Replace values the runner cannot work with by their defaults
    fn validated(mut self) -> Self {
        if let Err(e) = self.time.validate() {
            warn!("Invalid time settings: {}, using defaults", e);
            self.time = TimeConfig::default();
        }

        let run = RunSettings::default();
        if !(self.run.frame_delta.is_finite() && self.run.frame_delta > 0.0) {
            warn!("Invalid frame delta {}, using {}", self.run.frame_delta, run.frame_delta);
            self.run.frame_delta = run.frame_delta;
        }
        if !(self.run.day_length.is_finite() && self.run.day_length >= 0.0) {
            warn!("Invalid day length {}, using {}", self.run.day_length, run.day_length);
            self.run.day_length = run.day_length;
        }
        if !(self.run.closing_time.is_finite() && self.run.closing_time >= 0.0) {
            warn!("Invalid closing time {}, using {}", self.run.closing_time, run.closing_time);
            self.run.closing_time = run.closing_time;
        }
        self
    }

    /// Save settings to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(dir) = Self::config_dir() else {
            anyhow::bail!("Could not determine config directory");
        };

        let path = dir.join("settings.toml");

        if !dir.exists() {
            fs::create_dir_all(&dir)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// What to run and how to report it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// Seed for the run's random stream
    pub seed: u64,
    /// Number of days to simulate
    pub days: u32,
    /// Opening hours per day, in simulated seconds
    pub day_length: f32,
    /// Longest wait for customers to leave after closing
    pub closing_time: f32,
    /// Real-time length of one host frame
    pub frame_delta: f32,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Day-indexed probability tables; built-in defaults when unset
    pub probabilities: Option<PathBuf>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            seed: 1,
            days: 2,
            day_length: 180.0,
            closing_time: 60.0,
            frame_delta: 1.0 / 60.0,
            log_level: "info".to_string(),
            probabilities: None,
        }
    }
}

/// Scripted stand-in for the player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSettings {
    /// Walking speed in meters per second
    pub speed: f32,
    /// Distance at which the player can hit an agent
    pub reach: f32,
    /// Seconds between placing two items on a shelf
    pub place_interval: f32,
    /// Whether the player tackles fleeing thieves
    pub stop_thieves: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            speed: 4.0,
            reach: 1.5,
            place_interval: 0.5,
            stop_thieves: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: SimSettings = toml::from_str(
            r#"
            [run]
            seed = 9
            days = 1
            day_length = 30.0
            closing_time = 10.0
            frame_delta = 0.02
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(settings.run.seed, 9);
        assert!(settings.run.probabilities.is_none());
        assert_eq!(settings.layout, StoreLayout::default());
        assert!(settings.player.stop_thieves);
    }

    #[test]
    fn test_unusable_timing_falls_back_to_defaults() {
        let settings: SimSettings = toml::from_str(
            r#"
            [run]
            seed = 4
            days = 1
            day_length = 30.0
            closing_time = -5.0
            frame_delta = 0.0
            log_level = "info"

            [time]
            time_scale = 1.0
            fixed_timestep = 0.0
            max_delta_time = 0.25
            "#,
        )
        .unwrap();
        let settings = SimSettings::validated(settings);

        let defaults = SimSettings::default();
        assert_eq!(settings.run.frame_delta, defaults.run.frame_delta);
        assert_eq!(settings.run.closing_time, defaults.run.closing_time);
        assert_eq!(settings.run.day_length, 30.0);
        assert_eq!(settings.time.fixed_timestep, defaults.time.fixed_timestep);
        assert_eq!(settings.run.seed, 4);
    }

    #[test]
    fn test_settings_toml_survives_save_and_load() {
        let settings = SimSettings::default();
        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: SimSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.run.days, settings.run.days);
        assert_eq!(parsed.layout, settings.layout);
    }
}
