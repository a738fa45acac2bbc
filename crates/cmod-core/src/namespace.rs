//! Namespaces.
//!
//! A namespace owns a name-keyed map of nested namespaces that is distinct
//! from its entity list, so a nested namespace is shared across repeated
//! declarations of the same name. Anonymous namespaces get synthesized
//! unique keys but empty external names.

use crate::context::ContextData;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::error::{ModelError, Result};
use crate::model::CodeModel;
use indexmap::IndexMap;

/// Payload of a namespace.
#[derive(Debug)]
pub struct NamespaceData {
    pub(crate) ctx: ContextData,
    /// Nested namespaces keyed by name (or a synthesized key for anonymous
    /// namespaces), in creation order.
    pub(crate) namespaces: IndexMap<String, EntityId>,
    pub(crate) anon_count: u32,
}

impl NamespaceData {
    pub(crate) fn new() -> Self {
        Self {
            ctx: ContextData::new(),
            namespaces: IndexMap::new(),
            anon_count: 0,
        }
    }
}

impl CodeModel {
    /// Nested namespaces of a namespace, in creation order.
    pub fn namespaces(&self, ns: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.ns_data(ns).namespaces.values().copied()
    }

    /// Searches for a nested namespace with the given name.
    pub fn find_namespace(&self, ns: EntityId, name: &str) -> Option<EntityId> {
        self.ns_data(ns).namespaces.get(name).copied()
    }

    /// Creates a nested namespace. The namespace must not already exist.
    pub fn create_namespace(&mut self, ns: EntityId, name: &str) -> Result<EntityId> {
        if self.ns_data(ns).namespaces.contains_key(name) {
            return Err(ModelError::DuplicateInsertion(format!(
                "namespace {name:?} already exists"
            )));
        }
        Ok(self.insert_namespace(ns, name.to_string(), Some(name.to_string())))
    }

    /// Gets an existing nested namespace or creates a new one.
    pub fn get_or_create_namespace(&mut self, ns: EntityId, name: &str) -> EntityId {
        debug_assert!(!name.is_empty(), "namespace name should not be empty");
        if let Some(existing) = self.find_namespace(ns, name) {
            return existing;
        }
        self.insert_namespace(ns, name.to_string(), Some(name.to_string()))
    }

    /// Always creates a new anonymous nested namespace.
    pub fn create_anon_namespace(&mut self, ns: EntityId) -> EntityId {
        self.ns_data_mut(ns).anon_count += 1;
        let key = format!("<##anon_namespace_{}>", self.ns_data(ns).anon_count);
        self.insert_namespace(ns, key, None)
    }

    /// Removes a nested namespace from its parent's namespace map.
    pub fn remove_namespace(&mut self, parent: EntityId, ns: EntityId) -> Result<()> {
        let key = self
            .ns_data(parent)
            .namespaces
            .iter()
            .find(|(_, id)| **id == ns)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| {
                ModelError::UseInvariant(format!("namespace {ns:?} not found in parent map"))
            })?;
        self.ns_data_mut(parent).namespaces.shift_remove(&key);
        Ok(())
    }

    fn insert_namespace(&mut self, parent: EntityId, key: String, name: Option<String>) -> EntityId {
        let id = self.alloc(Entity::new(
            EntityKind::Namespace(NamespaceData::new()),
            Some(parent),
            name,
        ));
        self.ns_data_mut(parent).namespaces.insert(key, id);
        id
    }

    pub(crate) fn ns_data(&self, ns: EntityId) -> &NamespaceData {
        self.entity(ns)
            .namespace_data()
            .expect("entity is not a namespace")
    }

    pub(crate) fn ns_data_mut(&mut self, ns: EntityId) -> &mut NamespaceData {
        self.entity_mut(ns)
            .namespace_data_mut()
            .expect("entity is not a namespace")
    }
}
