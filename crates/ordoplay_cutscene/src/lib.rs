// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cutscene sequencer for OrdoPlay.
//!
//! This crate provides non-linear cutscene playback:
//! - Directable nodes (group → track → clip) in an id-addressed arena
//! - A time-pointer scheduler firing enter/update/exit/reverse callbacks
//! - Keyframed animated parameters with snapshot and restore
//! - Blend weights and clip cross-blending
//! - Play/stop/pause with once, loop and ping-pong wrapping
//!
//! ## Architecture
//!
//! The sequencer is built on:
//! - A host-provided [`SceneBinder`] for all entity reads and writes
//! - A [`DirectableRegistry`] mapping node type tags to behaviours
//! - A [`TimelineScheduler`] owned by each [`Timeline`]
//! - A [`DirectorContext`] holding settings and the registry

pub mod binding;
pub mod curve;
pub mod directable;
pub mod directables;
pub mod error;
pub mod node;
pub mod parameter;
pub mod parameter_set;
pub mod playback;
pub mod registry;
pub mod scene;
pub mod scheduler;
pub mod section;
pub mod settings;
pub mod space;
pub mod timeline;
pub mod value;

#[cfg(test)]
mod testing;

pub use binding::{EntityId, MemberKind, MemberPath, ParameterBinding, SceneBinder};
pub use curve::{Curve, CurveKey, Interpolation, InterpolationMode, WrapMode};
pub use directable::{Directable, NodeContext};
pub use error::{CutsceneError, Result};
pub use node::{ActorReferenceMode, DirectableNode, NodeData, NodeId, NodeKind, NodeState};
pub use parameter::AnimatedParameter;
pub use parameter_set::ParameterSet;
pub use playback::{PlayDirection, PlaybackEvent, PlaybackState, StopMode};
pub use registry::{DirectableKind, DirectableRegistry};
pub use scene::{MemoryScene, SceneEntity};
pub use scheduler::TimelineScheduler;
pub use section::{Section, SectionId};
pub use settings::{DirectorContext, SequencerSettings};
pub use space::{Transform, TransformSpace};
pub use timeline::{Timeline, TimelineId};
pub use value::{ParamValue, ValueKind};
