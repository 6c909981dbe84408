// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry of directable kinds.
//!
//! Nodes carry a string type tag; the registry maps it to a factory that
//! builds the node's runtime [`Directable`] behaviour for a session.

use crate::directable::Directable;
use crate::directables;
use crate::error::CutsceneError;
use crate::node::{DirectableNode, NodeKind};
use crate::Result;

/// Factory building a behaviour for a node
pub type DirectableFactory = Box<dyn Fn(&DirectableNode) -> Result<Box<dyn Directable>>>;

/// A registered kind of group, track or clip
pub struct DirectableKind {
    /// Type tag stored on nodes
    pub tag: String,
    /// Display name
    pub name: String,
    /// Hierarchy level this kind belongs to
    pub node_kind: NodeKind,
    /// Overlapping clips of this kind cross-blend instead of being pushed apart
    pub cross_blendable: bool,
    factory: DirectableFactory,
}

impl DirectableKind {
    /// Create a kind
    pub fn new<F>(tag: impl Into<String>, name: impl Into<String>, node_kind: NodeKind, factory: F) -> Self
    where
        F: Fn(&DirectableNode) -> Result<Box<dyn Directable>> + 'static,
    {
        Self {
            tag: tag.into(),
            name: name.into(),
            node_kind,
            cross_blendable: false,
            factory: Box::new(factory),
        }
    }

    /// Mark the kind as cross-blendable
    pub fn cross_blendable(mut self) -> Self {
        self.cross_blendable = true;
        self
    }
}

impl std::fmt::Debug for DirectableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectableKind")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .field("node_kind", &self.node_kind)
            .field("cross_blendable", &self.cross_blendable)
            .finish_non_exhaustive()
    }
}

/// Registry of available directable kinds
#[derive(Debug)]
pub struct DirectableRegistry {
    kinds: indexmap::IndexMap<String, DirectableKind>,
}

impl DirectableRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            kinds: indexmap::IndexMap::new(),
        }
    }

    /// Create a registry with the built-in kinds
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        directables::register_builtins(&mut registry);
        registry
    }

    /// Register a kind, replacing any kind with the same tag
    pub fn register(&mut self, kind: DirectableKind) {
        self.kinds.insert(kind.tag.clone(), kind);
    }

    /// Get a kind by tag
    pub fn get(&self, tag: &str) -> Option<&DirectableKind> {
        self.kinds.get(tag)
    }

    /// Get all registered kinds
    pub fn kinds(&self) -> impl Iterator<Item = &DirectableKind> {
        self.kinds.values()
    }

    /// Get kinds at one hierarchy level
    pub fn kinds_of(&self, node_kind: NodeKind) -> impl Iterator<Item = &DirectableKind> {
        self.kinds.values().filter(move |k| k.node_kind == node_kind)
    }

    /// Whether clips with this tag cross-blend
    pub fn is_cross_blendable(&self, tag: &str) -> bool {
        self.get(tag).is_some_and(|k| k.cross_blendable)
    }

    /// Build the behaviour for a node
    pub fn create(&self, node: &DirectableNode) -> Result<Box<dyn Directable>> {
        let kind = self
            .get(&node.type_tag)
            .ok_or_else(|| CutsceneError::UnknownKind(node.type_tag.clone()))?;
        if kind.node_kind != node.kind() {
            return Err(CutsceneError::WrongNodeKind {
                node: node.id,
                expected: kind.node_kind,
                actual: node.kind(),
            });
        }
        (kind.factory)(node)
    }
}

impl Default for DirectableRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
