// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sequencer settings and the director context passed into timeline calls.

use crate::error::CutsceneError;
use crate::playback::StopMode;
use crate::registry::DirectableRegistry;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Tunables shared by every timeline of a host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSettings {
    /// Settings format version
    pub version: u32,
    /// Offset past a loop boundary so the boundary does not fire twice
    pub loop_epsilon: f32,
    /// Stop mode used when a `Once` session reaches its end
    pub default_stop_mode: StopMode,
    /// Global playback speed multiplier
    pub playback_speed: f32,
    /// Keying one parameter keys every other parameter of the node
    pub paired_keying: bool,
    /// Revalidation also applies clip cross-blends
    pub auto_cross_blend: bool,
    /// Frame rate used for time snapping
    pub frame_rate: f32,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            loop_epsilon: 0.0001,
            default_stop_mode: StopMode::Skip,
            playback_speed: 1.0,
            paired_keying: false,
            auto_cross_blend: true,
            frame_rate: 30.0,
        }
    }
}

impl SequencerSettings {
    /// Snap a time to the nearest frame
    pub fn snap_time(&self, time: f32) -> f32 {
        if self.frame_rate <= 0.0 {
            return time;
        }
        (time * self.frame_rate).round() / self.frame_rate
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.version > SETTINGS_FORMAT_VERSION {
            return Err(CutsceneError::InvalidSettings(format!(
                "Settings version {} is newer than supported version {}",
                self.version, SETTINGS_FORMAT_VERSION
            )));
        }
        if !(self.loop_epsilon > 0.0) {
            return Err(CutsceneError::InvalidSettings("loop_epsilon must be positive".into()));
        }
        if !(self.playback_speed > 0.0) {
            return Err(CutsceneError::InvalidSettings("playback_speed must be positive".into()));
        }
        Ok(())
    }

    /// Deserialize from RON and validate
    pub fn from_ron(s: &str) -> Result<Self> {
        let settings: Self = ron::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}

/// Host-owned context handed to every timeline operation
#[derive(Debug, Default)]
pub struct DirectorContext {
    /// Sequencer settings
    pub settings: SequencerSettings,
    /// Registered directable kinds
    pub registry: DirectableRegistry,
}

impl DirectorContext {
    /// Create a context with the built-in kinds
    pub fn new(settings: SequencerSettings) -> Self {
        Self {
            settings,
            registry: DirectableRegistry::with_builtins(),
        }
    }
}
