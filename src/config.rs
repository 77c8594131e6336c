//! Engine configuration loaded from TOML
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields the stock engine settings.

use crate::error::Result;
use crate::image_cache::IMAGE_CACHE_SIZE;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
    pub music: MusicConfig,
    pub resources: ResourceConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Busy-wait sub-iterations run while draining input at frame start
    pub frame_repeat: u32,
    /// Delay inserted by each busy-wait sub-iteration
    pub frame_delay_ms: u64,
    /// Refresh the screen on every n-th sub-iteration only
    pub refresh_divisor: u32,
    /// Hidden exit phrase typed as unmapped keys
    pub quit_phrase: String,
    /// Skip the setup phase (engine state restored elsewhere)
    pub pre_loaded: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_repeat: 2,
            frame_delay_ms: 10,
            refresh_divisor: 2,
            quit_phrase: "quit".to_string(),
            pre_loaded: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: IMAGE_CACHE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    pub enabled: bool,
    pub looping: bool,
    /// The output device understands MT-32 instrument numbers
    pub native_mt32: bool,
    pub master_volume: i32,
    pub timer_hz: u32,
    /// Track the slideshow loops while it runs
    pub track: Option<String>,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            looping: false,
            native_mt32: false,
            master_volume: 255,
            timer_hz: 120,
            track: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub root: PathBuf,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// "auto", "terminal" or "headless"
    pub mode: String,
    pub width: u16,
    pub height: u16,
    pub bytes_per_pixel: u8,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: "auto".to_string(),
            width: 640,
            height: 480,
            bytes_per_pixel: 2,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }
}
