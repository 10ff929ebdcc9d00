//! Startup configuration.
//!
//! Loaded once from `~/.config/sensegrid/config.toml` (or `--config`),
//! validated before any worker starts, immutable afterwards. Every field
//! has a default so an absent file means a fully default setup.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub audio: AudioSettings,
    pub metadata: MetadataSettings,
    pub display: DisplaySettings,
    pub brightness: BrightnessSettings,
    pub colors: ColorSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Preferred capture device name (substring match). Falls back to any
    /// monitor source, then the default input device.
    pub device: Option<String>,
    pub sample_rate: u32,
    /// Samples per analysis cycle. Must be a power of two for the FFT.
    pub block_size: usize,
    pub n_bands: usize,
    /// Exponential smoothing weight of the previous bands (0 = no smoothing).
    pub smoothing: f32,
    /// Per-cycle decay of the AGC rolling peak.
    pub agc_decay: f32,
    /// Mean band level below which a cycle counts as silent.
    pub silence_threshold: f32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: 44100,
            block_size: 2048,
            n_bands: 8,
            smoothing: 0.3,
            agc_decay: 0.98,
            silence_threshold: 0.01,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Shairport Sync metadata FIFO.
    pub pipe_path: PathBuf,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            pipe_path: PathBuf::from("/tmp/shairport-sync-metadata"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Render ticks per second.
    pub tick_hz: f32,
    /// Milliseconds between scroll column shifts.
    pub scroll_step_ms: u64,
    /// Abort a scroll pass that has run this long.
    pub scroll_timeout_secs: f32,
    /// Seconds without audio before switching to the idle animation.
    pub idle_grace_secs: f32,
    /// Track-change icon splash duration.
    pub splash_secs: f32,
    /// Cooldown between icon splashes.
    pub splash_cooldown_secs: f32,
    /// Matrix rotation in degrees: 0, 90, 180 or 270.
    pub rotation: u16,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            tick_hz: 20.0,
            scroll_step_ms: 60,
            scroll_timeout_secs: 20.0,
            idle_grace_secs: 10.0,
            splash_secs: 1.5,
            splash_cooldown_secs: 5.0,
            rotation: 180,
        }
    }
}

/// Step schedule for time-of-day brightness. Hours are fractional
/// (6.5 = 06:30). Day sits inside twilight, twilight inside night.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrightnessSettings {
    pub day: f32,
    pub twilight: f32,
    pub night: f32,
    pub twilight_start: f32,
    pub day_start: f32,
    pub day_end: f32,
    pub twilight_end: f32,
}

impl Default for BrightnessSettings {
    fn default() -> Self {
        Self {
            day: 0.10,
            twilight: 0.05,
            night: 0.01,
            twilight_start: 6.5,
            day_start: 8.0,
            day_end: 22.0,
            twilight_end: 23.5,
        }
    }
}

impl BrightnessSettings {
    /// Brightness factor for a fractional wall-clock hour (0.0..24.0).
    pub fn factor_at(&self, hour: f32) -> f32 {
        if hour >= self.day_start && hour < self.day_end {
            self.day
        } else if (hour >= self.twilight_start && hour < self.day_start)
            || (hour >= self.day_end && hour < self.twilight_end)
        {
            self.twilight
        } else {
            self.night
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColorSettings {
    pub airplay: [u8; 3],
    pub spotify: [u8; 3],
    pub track_fallback: [u8; 3],
    pub bar_low: [u8; 3],
    pub bar_mid: [u8; 3],
    pub bar_high: [u8; 3],
    pub spinner: [u8; 3],
    pub error: [u8; 3],
}

impl Default for ColorSettings {
    fn default() -> Self {
        Self {
            airplay: [0, 100, 255],
            spotify: [30, 215, 96],
            track_fallback: [255, 255, 255],
            bar_low: [0, 255, 0],
            bar_mid: [255, 140, 0],
            bar_high: [255, 0, 0],
            spinner: [255, 0, 0],
            error: [255, 0, 0],
        }
    }
}

impl ColorSettings {
    /// Scroll color for a source application name (case-insensitive match).
    pub fn source_color(&self, app: &str) -> [u8; 3] {
        let app = app.to_lowercase();
        if app.contains("shairport") || app.contains("airplay") {
            self.airplay
        } else if app.contains("spotify") || app.contains("librespot") {
            self.spotify
        } else {
            self.track_fallback
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location when `None`.
    /// A missing default file yields defaults; an unreadable or unparsable
    /// file is `ConfigInvalid`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let p = Self::default_path();
                if !p.exists() {
                    let settings = Self::default();
                    settings.validate()?;
                    return Ok(settings);
                }
                p
            }
        };

        let content = fs::read_to_string(&path)
            .map_err(|e| Error::ConfigInvalid(format!("{}: {}", path.display(), e)))?;
        let settings: Settings = toml::from_str(&content)
            .map_err(|e| Error::ConfigInvalid(format!("{}: {}", path.display(), e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensegrid")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        let a = &self.audio;
        if a.sample_rate == 0 {
            return Err(Error::ConfigInvalid("audio.sample_rate must be > 0".into()));
        }
        if a.block_size < 256 || !a.block_size.is_power_of_two() {
            return Err(Error::ConfigInvalid(
                "audio.block_size must be a power of two >= 256".into(),
            ));
        }
        if a.n_bands == 0 || a.n_bands > crate::display::frame::WIDTH {
            return Err(Error::ConfigInvalid(format!(
                "audio.n_bands must be 1..={}",
                crate::display::frame::WIDTH
            )));
        }
        if !(0.0..1.0).contains(&a.smoothing) {
            return Err(Error::ConfigInvalid(
                "audio.smoothing must be in [0, 1)".into(),
            ));
        }
        if !(0.0..1.0).contains(&a.agc_decay) {
            return Err(Error::ConfigInvalid(
                "audio.agc_decay must be in [0, 1)".into(),
            ));
        }

        let d = &self.display;
        if !(1.0..=60.0).contains(&d.tick_hz) {
            return Err(Error::ConfigInvalid(
                "display.tick_hz must be in [1, 60]".into(),
            ));
        }
        if !matches!(d.rotation, 0 | 90 | 180 | 270) {
            return Err(Error::ConfigInvalid(
                "display.rotation must be 0, 90, 180 or 270".into(),
            ));
        }

        let b = &self.brightness;
        for (name, level) in [
            ("day", b.day),
            ("twilight", b.twilight),
            ("night", b.night),
        ] {
            if !(0.0..=1.0).contains(&level) {
                return Err(Error::ConfigInvalid(format!(
                    "brightness.{} must be in [0, 1]",
                    name
                )));
            }
        }
        if !(b.twilight_start <= b.day_start
            && b.day_start <= b.day_end
            && b.day_end <= b.twilight_end)
        {
            return Err(Error::ConfigInvalid(
                "brightness hours must satisfy twilight_start <= day_start <= day_end <= twilight_end"
                    .into(),
            ));
        }

        Ok(())
    }
}
