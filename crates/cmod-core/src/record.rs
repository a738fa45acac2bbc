//! Records: classes, structs, and unions.

use crate::context::ContextData;
use crate::entity::{EntityId, EntityKind, UseRole};
use crate::error::{ModelError, Result};
use crate::model::CodeModel;
use crate::types::QualType;
use rustc_hash::FxHashMap;

/// Record kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Class,
    Struct,
    Union,
}

impl RecordKind {
    pub fn name(self) -> &'static str {
        match self {
            RecordKind::Class => "class",
            RecordKind::Struct => "struct",
            RecordKind::Union => "union",
        }
    }
}

/// Member access level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    Public,
    Protected,
    Private,
}

/// Payload of a record: kind, ordered base list, members, and the
/// per-member access side map.
#[derive(Debug)]
pub struct RecordData {
    pub(crate) kind: RecordKind,
    pub(crate) ctx: ContextData,
    pub(crate) bases: Vec<EntityId>,
    pub(crate) access: FxHashMap<EntityId, AccessLevel>,
}

impl RecordData {
    pub(crate) fn new(kind: RecordKind) -> Self {
        Self {
            kind,
            ctx: ContextData::new(),
            bases: Vec::new(),
            access: FxHashMap::default(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Base types in declaration order. Bases are not necessarily records;
    /// they may be typedefs or template instantiations.
    pub fn bases(&self) -> &[EntityId] {
        &self.bases
    }

    /// Default access level: private for classes, public otherwise.
    pub fn default_access(&self) -> AccessLevel {
        if self.kind == RecordKind::Class {
            AccessLevel::Private
        } else {
            AccessLevel::Public
        }
    }

    /// Access level of a member entity, falling back to the default.
    pub fn access(&self, ent: EntityId) -> AccessLevel {
        self.access
            .get(&ent)
            .copied()
            .unwrap_or_else(|| self.default_access())
    }
}

impl CodeModel {
    pub fn record_kind(&self, rec: EntityId) -> RecordKind {
        self.rec_data(rec).kind
    }

    pub fn set_record_kind(&mut self, rec: EntityId, kind: RecordKind) {
        self.rec_data_mut(rec).kind = kind;
    }

    /// Base types of a record, in declaration order.
    pub fn bases(&self, rec: EntityId) -> &[EntityId] {
        &self.rec_data(rec).bases
    }

    /// Base types resolved through typedefs to record types.
    pub fn base_records(&self, rec: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.rec_data(rec)
            .bases
            .iter()
            .map(|base| self.untypedef(*base))
    }

    /// Fields of a record, in declaration order.
    pub fn fields(&self, rec: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.rec_data(rec)
            .ctx
            .entities
            .iter()
            .copied()
            .filter(|id| matches!(self.entity(*id).kind, EntityKind::Field { .. }))
    }

    /// Access level of a record member.
    pub fn access_level(&self, rec: EntityId, ent: EntityId) -> AccessLevel {
        self.rec_data(rec).access(ent)
    }

    /// Creates a field. A nonzero bit width is valid only on integral
    /// builtin types.
    pub fn create_field(
        &mut self,
        rec: EntityId,
        name: &str,
        ty: QualType,
        access: AccessLevel,
        bit_width: u32,
    ) -> Result<EntityId> {
        if bit_width != 0 {
            let integral = match &self.entity(ty.ty).kind {
                EntityKind::Builtin(kind) => kind.is_integral(),
                _ => false,
            };
            if !integral {
                return Err(ModelError::TypeConstraint(format!(
                    "bitfield {name:?} must have an integral builtin type"
                )));
            }
        }

        if self.find_var(rec, name).is_some() {
            return Err(ModelError::DuplicateInsertion(format!(
                "record already has a variable named {name:?}"
            )));
        }

        let id = self.create_in_ctx(rec, EntityKind::Field { ty, bit_width }, Some(name));
        self.add_use(ty.ty, id, UseRole::VarType);
        self.set_access(rec, id, access);
        Ok(id)
    }

    /// Creates a method: a function that is simultaneously a record member
    /// with a per-member access level.
    pub fn create_method(&mut self, rec: EntityId, name: &str, access: AccessLevel) -> EntityId {
        let data = crate::function::FunctionData::new_method();
        let id = self.create_in_ctx(rec, EntityKind::Function(data), Some(name));
        self.set_access(rec, id, access);
        id
    }

    /// Creates a static member variable.
    pub fn create_static_var(
        &mut self,
        rec: EntityId,
        name: &str,
        ty: QualType,
        access: AccessLevel,
    ) -> EntityId {
        let id = self.create_var(rec, name, ty);
        self.set_access(rec, id, access);
        id
    }

    /// Creates a static member function.
    pub fn create_static_function(
        &mut self,
        rec: EntityId,
        name: &str,
        access: AccessLevel,
    ) -> EntityId {
        let id = self.create_function(rec, name);
        self.set_access(rec, id, access);
        id
    }

    /// Creates a nested typedef member.
    pub fn create_member_typedef(
        &mut self,
        rec: EntityId,
        name: &str,
        aliased: QualType,
        access: AccessLevel,
    ) -> EntityId {
        let id = self.create_typedef(rec, name, aliased);
        self.set_access(rec, id, access);
        id
    }

    /// Creates a nested enum member.
    pub fn create_member_enum(
        &mut self,
        rec: EntityId,
        name: &str,
        underlying: EntityId,
        access: AccessLevel,
    ) -> Result<EntityId> {
        let id = self.create_enum(rec, name, underlying)?;
        self.set_access(rec, id, access);
        Ok(id)
    }

    /// Creates an anonymous nested record member.
    pub fn create_member_record(
        &mut self,
        rec: EntityId,
        kind: RecordKind,
        access: AccessLevel,
    ) -> EntityId {
        let id = self.create_record(rec, kind);
        self.set_access(rec, id, access);
        id
    }

    /// Creates a named nested record member.
    pub fn create_named_member_record(
        &mut self,
        rec: EntityId,
        name: &str,
        kind: RecordKind,
        access: AccessLevel,
    ) -> EntityId {
        let id = self.create_named_record(rec, name, kind);
        self.set_access(rec, id, access);
        id
    }

    /// Adds a base type to a record. Duplicate bases are rejected.
    pub fn add_base(&mut self, rec: EntityId, base: EntityId, access: AccessLevel) -> Result<()> {
        if self.rec_data(rec).bases.contains(&base) {
            return Err(ModelError::DuplicateInsertion(format!(
                "type {base:?} is already a base of the record"
            )));
        }

        self.add_use(base, rec, UseRole::RecordBase);
        self.rec_data_mut(rec).bases.push(base);
        self.rec_data_mut(rec).access.insert(base, access);
        Ok(())
    }

    /// Swaps every base pointer equal to `src` for `dst`, updating uses.
    pub fn replace_base(&mut self, rec: EntityId, src: EntityId, dst: EntityId) -> Result<()> {
        let positions: Vec<usize> = self
            .rec_data(rec)
            .bases
            .iter()
            .enumerate()
            .filter(|(_, base)| **base == src)
            .map(|(i, _)| i)
            .collect();

        for pos in positions {
            self.remove_use(src, rec, UseRole::RecordBase)?;
            self.add_use(dst, rec, UseRole::RecordBase);
            let data = self.rec_data_mut(rec);
            data.bases[pos] = dst;
            if let Some(access) = data.access.remove(&src) {
                data.access.insert(dst, access);
            }
        }

        Ok(())
    }

    /// Removes every base of a record, rewinding uses.
    pub fn remove_all_bases(&mut self, rec: EntityId) -> Result<()> {
        let bases = std::mem::take(&mut self.rec_data_mut(rec).bases);
        for base in bases {
            self.remove_use(base, rec, UseRole::RecordBase)?;
            self.rec_data_mut(rec).access.remove(&base);
        }
        Ok(())
    }

    fn set_access(&mut self, rec: EntityId, ent: EntityId, access: AccessLevel) {
        self.rec_data_mut(rec).access.insert(ent, access);
    }

    pub(crate) fn rec_data(&self, rec: EntityId) -> &RecordData {
        self.entity(rec)
            .record_data()
            .expect("entity is not a record")
    }

    pub(crate) fn rec_data_mut(&mut self, rec: EntityId) -> &mut RecordData {
        self.entity_mut(rec)
            .record_data_mut()
            .expect("entity is not a record")
    }
}
