//! Engine configuration, loaded from TOML.

use crate::models::engine::hit_window::HitWindow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_SCROLL_SPEED: u32 = 320;
pub const MIN_SCROLL_SPEED: u32 = 50;
pub const MAX_SCROLL_SPEED: u32 = 1000;
pub const MIN_SONG_RATE: f64 = 0.5;
pub const MAX_SONG_RATE: f64 = 2.0;

/// Lane rearrangement applied to a chart at load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneMod {
    #[default]
    None,
    Mirror,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub scroll_speed: u32,
    pub song_rate: f64,
    /// Added to the audio clock to get the judgement clock, in ms.
    pub audio_offset_ms: f64,
    pub audio_volume: f32,
    pub keysound_volume: f32,
    pub autoplay: bool,
    /// Play every keysound from the schedule instead of on input.
    pub auto_sound: bool,
    pub lane_mod: LaneMod,
    pub random_seed: Option<u64>,
    /// Constant scroll, ignoring scroll-velocity changes.
    pub no_sv: bool,
    /// Judgement line position in virtual pixels from the top.
    pub hit_position: f32,
    pub resolution: [u32; 2],
    pub judgement: HitWindow,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scroll_speed: DEFAULT_SCROLL_SPEED,
            song_rate: 1.0,
            audio_offset_ms: 0.0,
            audio_volume: 1.0,
            keysound_volume: 1.0,
            autoplay: false,
            auto_sound: false,
            lane_mod: LaneMod::None,
            random_seed: None,
            no_sv: false,
            hit_position: 480.0,
            resolution: [1920, 1080],
            judgement: HitWindow::new(),
        }
    }
}

impl EngineSettings {
    /// Loads settings from a TOML file. Values that fail validation are
    /// replaced by their defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path).map_err(|e| e.to_string())?;
        Self::from_toml(&content).inspect_err(|e| {
            log::error!("CONFIG: Failed to parse {:?}: {}", path, e);
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, String> {
        let settings: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        Ok(settings.sanitized())
    }

    /// Loads settings, falling back to defaults when the file is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("CONFIG: {:?} not found, using defaults", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content = toml::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, content).map_err(|e| e.to_string())
    }

    /// Clamps or resets out-of-range values.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if !(MIN_SCROLL_SPEED..=MAX_SCROLL_SPEED).contains(&self.scroll_speed) {
            log::warn!(
                "CONFIG: Invalid scroll speed {}, reverting to {}",
                self.scroll_speed,
                defaults.scroll_speed
            );
            self.scroll_speed = defaults.scroll_speed;
        }

        if !self.song_rate.is_finite() {
            self.song_rate = defaults.song_rate;
        }
        self.song_rate = self.song_rate.clamp(MIN_SONG_RATE, MAX_SONG_RATE);

        if !self.audio_offset_ms.is_finite() {
            self.audio_offset_ms = 0.0;
        }
        self.audio_volume = self.audio_volume.clamp(0.0, 1.0);
        self.keysound_volume = self.keysound_volume.clamp(0.0, 1.0);

        if self.resolution[0] == 0 || self.resolution[1] == 0 {
            log::warn!("CONFIG: Invalid resolution {:?}", self.resolution);
            self.resolution = defaults.resolution;
        }

        if !self.judgement.is_valid() {
            log::warn!(
                "CONFIG: Judgement windows {:?} are not ascending, using defaults",
                self.judgement
            );
            self.judgement = defaults.judgement;
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_gives_defaults() {
        let settings = EngineSettings::from_toml("").unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_partial_toml() {
        let settings = EngineSettings::from_toml(
            r#"
            scroll_speed = 400
            autoplay = true
            lane_mod = "mirror"

            [judgement]
            cool = 40.0
            good = 120.0
            "#,
        )
        .unwrap();
        assert_eq!(settings.scroll_speed, 400);
        assert!(settings.autoplay);
        assert_eq!(settings.lane_mod, LaneMod::Mirror);
        assert_eq!(settings.judgement.cool, 40.0);
        assert_eq!(settings.judgement.bad, 150.0);
    }

    #[test]
    fn test_out_of_range_values_are_fixed() {
        let settings = EngineSettings::from_toml(
            r#"
            scroll_speed = 5
            song_rate = 3.5
            audio_volume = 2.0

            [judgement]
            cool = 200.0
            "#,
        )
        .unwrap();
        assert_eq!(settings.scroll_speed, DEFAULT_SCROLL_SPEED);
        assert_eq!(settings.song_rate, MAX_SONG_RATE);
        assert_eq!(settings.audio_volume, 1.0);
        assert_eq!(settings.judgement, HitWindow::new());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(EngineSettings::from_toml("scroll_speed = \"fast\"").is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = EngineSettings::load_or_default(Path::new("/nonexistent/engine.toml"));
        assert_eq!(settings, EngineSettings::default());
    }
}
