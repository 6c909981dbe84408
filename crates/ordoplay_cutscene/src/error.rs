// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for the cutscene core.

use crate::node::{NodeId, NodeKind};

/// Result type for cutscene operations
pub type Result<T> = std::result::Result<T, CutsceneError>;

/// Errors raised by the cutscene core.
///
/// Most runtime failures never reach the caller: the scheduler logs them
/// and skips the offending node. These variants surface from authoring
/// and playback-control calls, and from node callbacks before the
/// scheduler swallows them.
#[derive(Debug, thiserror::Error)]
pub enum CutsceneError {
    /// A parameter's bound member can no longer be resolved
    #[error("Binding invalid: {0}")]
    BindingInvalid(String),

    /// A node's target entity is missing
    #[error("Unresolved target for node {0:?}")]
    UnresolvedTarget(NodeId),

    /// A node callback failed
    #[error("Callback {phase} failed on node {node:?}: {message}")]
    Callback {
        /// Node whose callback failed
        node: NodeId,
        /// Callback phase (enter, update, ...)
        phase: &'static str,
        /// Failure description
        message: String,
    },

    /// Play range with start after end in the forward direction
    #[error("Invalid play range: start {start} is after end {end}")]
    InvalidRange {
        /// Requested start time
        start: f32,
        /// Requested end time
        end: f32,
    },

    /// Node not found in the arena
    #[error("Node not found: {0:?}")]
    NodeNotFound(NodeId),

    /// Node exists but is not of the expected kind
    #[error("Node {node:?} is a {actual:?}, expected {expected:?}")]
    WrongNodeKind {
        /// Offending node
        node: NodeId,
        /// Kind the operation needed
        expected: NodeKind,
        /// Kind the node has
        actual: NodeKind,
    },

    /// No section with this name
    #[error("Section not found: {0}")]
    SectionNotFound(String),

    /// Timeline file is newer than this build understands
    #[error("Timeline version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// No directable kind registered under this type tag
    #[error("Unknown directable kind: {0}")]
    UnknownKind(String),

    /// Kind-specific settings or sequencer settings are malformed
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// RON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] ron::Error),

    /// RON deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] ron::error::SpannedError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CutsceneError {
    /// Build a callback failure for a node
    pub fn callback(node: NodeId, phase: &'static str, message: impl Into<String>) -> Self {
        Self::Callback {
            node,
            phase,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CutsceneError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidSettings(value.to_string())
    }
}
