// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named time markers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionId(pub Uuid);

impl SectionId {
    /// Create a new random section ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// A named time marker used for navigation and range playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Unique section ID
    pub id: SectionId,
    /// Section name
    pub name: String,
    /// Time position
    pub time: f32,
    /// Marker color
    #[serde(default = "Section::default_color")]
    pub color: [u8; 3],
}

impl Section {
    /// Create a new section
    pub fn new(name: impl Into<String>, time: f32) -> Self {
        Self {
            id: SectionId::new(),
            name: name.into(),
            time,
            color: Self::default_color(),
        }
    }

    fn default_color() -> [u8; 3] {
        [255, 200, 100]
    }
}
