//! Contexts and named lookup.
//!
//! A context owns an insertion-ordered list of child entities plus a
//! name-indexed multimap for the named ones (a multimap because overloaded
//! functions share a name). Namespaces, records, functions, templates, and
//! record-bodied substitutions are contexts.

use crate::entity::{Entity, EntityId, EntityKind, UseRole};
use crate::error::{ModelError, Result};
use crate::model::CodeModel;
use crate::types::{EnumData, QualType};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Child list and name index of a context.
#[derive(Debug, Default)]
pub struct ContextData {
    /// Owned child entities, in insertion order.
    pub(crate) entities: Vec<EntityId>,
    /// Name index. One entry per name in the common case; overloaded
    /// functions share a name.
    pub(crate) named: FxHashMap<String, SmallVec<[EntityId; 1]>>,
}

impl ContextData {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub(crate) fn insert(&mut self, id: EntityId, name: Option<&str>) {
        self.entities.push(id);
        if let Some(name) = name {
            self.named.entry(name.to_string()).or_default().push(id);
        }
    }

    /// First named entity registered under `name`, if any.
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.named.get(name).and_then(|ids| ids.first().copied())
    }

    /// All entities registered under `name`, in insertion order.
    pub fn find_all(&self, name: &str) -> &[EntityId] {
        self.named.get(name).map(|ids| ids.as_slice()).unwrap_or(&[])
    }

    pub(crate) fn remove(&mut self, id: EntityId, name: Option<&str>) -> Result<()> {
        let pos = self
            .entities
            .iter()
            .position(|cur| *cur == id)
            .ok_or_else(|| {
                ModelError::UseInvariant(format!("entity {id:?} not found in context"))
            })?;
        self.entities.remove(pos);

        if let Some(name) = name {
            self.remove_name(id, name)?;
        }

        Ok(())
    }

    pub(crate) fn remove_name(&mut self, id: EntityId, name: &str) -> Result<()> {
        let ids = self.named.get_mut(name).ok_or_else(|| {
            ModelError::UseInvariant(format!("name {name:?} not found in context"))
        })?;
        let pos = ids.iter().position(|cur| *cur == id).ok_or_else(|| {
            ModelError::UseInvariant(format!("entity {id:?} not registered under {name:?}"))
        })?;
        ids.remove(pos);
        if ids.is_empty() {
            self.named.remove(name);
        }
        Ok(())
    }
}

impl CodeModel {
    /// Insertion-ordered child entities of a context.
    pub fn entities(&self, ctx: EntityId) -> &[EntityId] {
        &self.ctx_data(ctx).entities
    }

    fn filtered<'a>(
        &'a self,
        ctx: EntityId,
        pred: impl Fn(&Entity) -> bool + 'a,
    ) -> impl Iterator<Item = EntityId> + 'a {
        self.ctx_data(ctx)
            .entities
            .iter()
            .copied()
            .filter(move |id| pred(self.entity(*id)))
    }

    /// Record types in a context, including template record instantiations.
    pub fn records(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| ent.is_record_type())
    }

    /// Named record types in a context.
    pub fn named_records(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| ent.is_record_type() && ent.name().is_some())
    }

    pub fn typedefs(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| matches!(ent.kind, EntityKind::Typedef { .. }))
    }

    pub fn enums(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| matches!(ent.kind, EntityKind::Enum(_)))
    }

    pub fn vars(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| matches!(ent.kind, EntityKind::Variable { .. }))
    }

    pub fn functions(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| matches!(ent.kind, EntityKind::Function(_)))
    }

    pub fn templates(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| matches!(ent.kind, EntityKind::Template(_)))
    }

    pub fn template_records(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| {
            ent.template_data().is_some() && ent.record_data().is_some()
        })
    }

    pub fn template_functions(&self, ctx: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.filtered(ctx, |ent| {
            ent.template_data().is_some() && ent.function_data().is_some()
        })
    }

    /// First named entity with the given name in a context, or `None`.
    pub fn find_named_entity(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.ctx_data(ctx).find(name)
    }

    /// First named entity with the given name satisfying a predicate.
    pub(crate) fn find_named_where(
        &self,
        ctx: EntityId,
        name: &str,
        pred: impl Fn(&Entity) -> bool,
    ) -> Option<EntityId> {
        self.ctx_data(ctx)
            .find_all(name)
            .iter()
            .copied()
            .find(|id| pred(self.entity(*id)))
    }

    pub fn find_named_type(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| ent.is_type())
    }

    pub fn find_named_record(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| ent.is_record_type())
    }

    pub fn find_typedef(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| {
            matches!(ent.kind, EntityKind::Typedef { .. })
        })
    }

    pub fn find_enum(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| matches!(ent.kind, EntityKind::Enum(_)))
    }

    pub fn find_var(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| {
            matches!(ent.kind, EntityKind::Variable { .. })
        })
    }

    pub fn find_function(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| matches!(ent.kind, EntityKind::Function(_)))
    }

    pub fn find_template(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| matches!(ent.kind, EntityKind::Template(_)))
    }

    pub fn find_template_record(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| {
            ent.template_data().is_some() && ent.record_data().is_some()
        })
    }

    pub fn find_template_function(&self, ctx: EntityId, name: &str) -> Option<EntityId> {
        self.find_named_where(ctx, name, |ent| {
            ent.template_data().is_some() && ent.function_data().is_some()
        })
    }

    /// Creates an anonymous record type in a context.
    pub fn create_record(&mut self, ctx: EntityId, kind: crate::RecordKind) -> EntityId {
        let data = crate::record::RecordData::new(kind);
        self.create_in_ctx(ctx, EntityKind::Record(data), None)
    }

    /// Creates a named record type in a context.
    pub fn create_named_record(
        &mut self,
        ctx: EntityId,
        name: &str,
        kind: crate::RecordKind,
    ) -> EntityId {
        let data = crate::record::RecordData::new(kind);
        self.create_in_ctx(ctx, EntityKind::Record(data), Some(name))
    }

    /// Creates a typedef in a context.
    pub fn create_typedef(&mut self, ctx: EntityId, name: &str, aliased: QualType) -> EntityId {
        let id = self.create_in_ctx(ctx, EntityKind::Typedef { aliased }, Some(name));
        self.add_use(aliased.ty, id, UseRole::TypedefAliased);
        id
    }

    /// Creates an enum in a context. The underlying type must be a builtin.
    pub fn create_enum(
        &mut self,
        ctx: EntityId,
        name: &str,
        underlying: EntityId,
    ) -> Result<EntityId> {
        if !matches!(self.entity(underlying).kind, EntityKind::Builtin(_)) {
            return Err(ModelError::TypeConstraint(
                "enum underlying type must be a builtin type".into(),
            ));
        }

        let data = EnumData {
            underlying,
            items: Vec::new(),
        };
        let id = self.create_in_ctx(ctx, EntityKind::Enum(data), Some(name));
        self.add_use(underlying, id, UseRole::EnumUnderlying);
        Ok(id)
    }

    /// Creates a variable with the given name and type in a context.
    pub fn create_var(&mut self, ctx: EntityId, name: &str, ty: QualType) -> EntityId {
        let id = self.create_in_ctx(ctx, EntityKind::Variable { ty }, Some(name));
        self.add_use(ty.ty, id, UseRole::VarType);
        id
    }

    /// Creates a function with the given name in a context.
    pub fn create_function(&mut self, ctx: EntityId, name: &str) -> EntityId {
        let data = crate::function::FunctionData::new();
        self.create_in_ctx(ctx, EntityKind::Function(data), Some(name))
    }

    /// Creates a `decltype(...)` placeholder type in a context.
    pub fn create_decltype(&mut self, ctx: EntityId) -> EntityId {
        self.create_in_ctx(ctx, EntityKind::Decltype, None)
    }

    /// Creates a dependent-name placeholder type in a context.
    pub fn create_dependent_type(&mut self, ctx: EntityId) -> EntityId {
        self.create_in_ctx(ctx, EntityKind::DependentName, None)
    }

    /// Renames a named entity, updating the context name index atomically.
    pub fn rename_entity(&mut self, ent: EntityId, new_name: &str) -> Result<()> {
        let (parent, old_name) = {
            let e = self.entity(ent);
            (e.parent, e.name.clone())
        };
        let old_name = old_name.ok_or_else(|| {
            ModelError::UseInvariant(format!("entity {ent:?} has no name to rename"))
        })?;
        if old_name == new_name {
            return Ok(());
        }

        if let Some(parent) = parent {
            if let Some(ctx) = self.entity_mut(parent).context_data_mut() {
                ctx.remove_name(ent, &old_name)?;
                ctx.named
                    .entry(new_name.to_string())
                    .or_default()
                    .push(ent);
            }
        }

        self.entity_mut(ent).name = Some(new_name.to_string());
        Ok(())
    }

    /// Removes an entity from its context. The entity must have no uses;
    /// owned children are removed first (in reverse insertion order), each of
    /// which must itself have no uses.
    pub fn remove_entity(&mut self, ent: EntityId) -> Result<()> {
        if self.entity(ent).has_uses() {
            return Err(ModelError::UseInvariant(format!(
                "can't remove entity {:?} with uses",
                ent
            )));
        }

        // Children first, so later declarations that reference earlier
        // siblings (this-type, nested types) unwind in dependency order.
        if let Some(ctx) = self.entity(ent).context_data() {
            let children: Vec<EntityId> = ctx.entities.iter().rev().copied().collect();
            for child in children {
                self.remove_entity(child)?;
            }
        }

        // Nested namespaces are owned through the namespace map, not the
        // entity list.
        if let Some(ns) = self.entity(ent).namespace_data() {
            let nested: Vec<EntityId> = ns.namespaces.values().rev().copied().collect();
            for nested_ns in nested {
                self.remove_entity(nested_ns)?;
            }
        }

        self.remove_owned_parts(ent)?;
        self.release_entity_refs(ent)?;
        self.detach_from_owner(ent)?;
        self.release(ent);
        Ok(())
    }
}
