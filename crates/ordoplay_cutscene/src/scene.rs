// SPDX-License-Identifier: MIT OR Apache-2.0
//! In-memory scene used by headless hosts and tests.

use crate::binding::{EntityId, MemberPath, SceneBinder};
use crate::value::ParamValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// An entity in a [`MemoryScene`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneEntity {
    /// Entity name, used by child paths
    pub name: String,
    /// Parent entity
    #[serde(default)]
    pub parent: Option<EntityId>,
    /// Member values keyed by `Component.member`
    #[serde(default)]
    pub members: IndexMap<String, ParamValue>,
}

/// A flat entity store implementing [`SceneBinder`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryScene {
    entities: IndexMap<EntityId, SceneEntity>,
}

impl MemoryScene {
    /// Create an empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root entity
    pub fn spawn(&mut self, name: impl Into<String>) -> EntityId {
        self.spawn_with_parent(name, None)
    }

    /// Add a child entity
    pub fn spawn_child(&mut self, parent: EntityId, name: impl Into<String>) -> EntityId {
        self.spawn_with_parent(name, Some(parent))
    }

    fn spawn_with_parent(&mut self, name: impl Into<String>, parent: Option<EntityId>) -> EntityId {
        let id = EntityId::new();
        let mut members = IndexMap::new();
        members.insert(MemberPath::active().key(), ParamValue::Bool(true));
        self.entities.insert(
            id,
            SceneEntity {
                name: name.into(),
                parent,
                members,
            },
        );
        id
    }

    /// Set a member value, creating the member if needed
    pub fn insert_member(&mut self, entity: EntityId, member: &MemberPath, value: ParamValue) -> bool {
        match self.entities.get_mut(&entity) {
            Some(e) => {
                e.members.insert(member.key(), value);
                true
            }
            None => false,
        }
    }

    /// Remove a member
    pub fn remove_member(&mut self, entity: EntityId, member: &MemberPath) -> Option<ParamValue> {
        self.entities
            .get_mut(&entity)?
            .members
            .shift_remove(&member.key())
    }

    /// Get an entity
    pub fn entity(&self, entity: EntityId) -> Option<&SceneEntity> {
        self.entities.get(&entity)
    }

    /// Find the first entity with a name
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.entities
            .iter()
            .find(|(_, e)| e.name == name)
            .map(|(id, _)| *id)
    }

    /// Get entity count
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Iterate over entity IDs
    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    fn children_of(&self, entity: EntityId) -> impl Iterator<Item = (EntityId, &SceneEntity)> + '_ {
        self.entities
            .iter()
            .filter(move |(_, e)| e.parent == Some(entity))
            .map(|(id, e)| (*id, e))
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Deserialize from RON
    pub fn from_ron(s: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(s)
    }

    /// Load a scene file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_ron(&content)?)
    }
}

impl SceneBinder for MemoryScene {
    fn resolve(&self, entity: EntityId, child_path: Option<&str>) -> Option<EntityId> {
        if !self.entities.contains_key(&entity) {
            return None;
        }
        let Some(path) = child_path else {
            return Some(entity);
        };

        let mut current = entity;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self
                .children_of(current)
                .find(|(_, e)| e.name == segment)
                .map(|(id, _)| id)?;
        }
        Some(current)
    }

    fn get(&self, entity: EntityId, member: &MemberPath) -> Option<ParamValue> {
        self.entities.get(&entity)?.members.get(&member.key()).copied()
    }

    fn set(&mut self, entity: EntityId, member: &MemberPath, value: ParamValue) -> bool {
        let Some(slot) = self
            .entities
            .get_mut(&entity)
            .and_then(|e| e.members.get_mut(&member.key()))
        else {
            return false;
        };
        if slot.kind() != value.kind() {
            return false;
        }
        *slot = value;
        true
    }

    fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    fn instantiate(&mut self, entity: EntityId) -> Option<EntityId> {
        let source = self.entities.get(&entity)?.clone();
        let copy = self.spawn_with_parent(format!("{} (Copy)", source.name), source.parent);
        if let Some(e) = self.entities.get_mut(&copy) {
            e.members = source.members;
        }

        let children: Vec<EntityId> = self.children_of(entity).map(|(id, _)| id).collect();
        for child in children {
            if let Some(child_copy) = self.instantiate(child) {
                if let Some(e) = self.entities.get_mut(&child_copy) {
                    e.parent = Some(copy);
                    e.name = e.name.trim_end_matches(" (Copy)").to_string();
                }
            }
        }
        Some(copy)
    }

    fn destroy(&mut self, entity: EntityId) {
        let children: Vec<EntityId> = self.children_of(entity).map(|(id, _)| id).collect();
        for child in children {
            self.destroy(child);
        }
        self.entities.shift_remove(&entity);
    }
}
