//! Debug info for the cmod code model.
//!
//! This crate provides:
//! - `DebugInfo` - Type sizes, record layouts, and address maps for code
//!   objects and symbols
//! - The default record layout engine (compact, bit-granular)
//! - Field search through anonymous members and base records

mod find_field;
mod layout;


pub use find_field::find_field;
pub use layout::RecordLayout;

use cmod_core::{BuiltinKind, CodeModel, EntityId, EntityKind, ModelError, QualType, Result};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

/// Size (and, for records, layout) information for one type.
#[derive(Debug, Clone, Default)]
pub struct TypeDebugInfo {
    size: u64,
    layout: Option<RecordLayout>,
}

impl TypeDebugInfo {
    pub fn new(size: u64) -> Self {
        Self { size, layout: None }
    }

    /// Size of the type in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn layout(&self) -> Option<&RecordLayout> {
        self.layout.as_ref()
    }

    pub(crate) fn with_layout(size: u64, layout: RecordLayout) -> Self {
        Self {
            size,
            layout: Some(layout),
        }
    }
}

/// Address and size of an object located in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectDebugInfo {
    addr: u64,
    size: u64,
}

impl ObjectDebugInfo {
    pub fn addr(&self) -> u64 {
        self.addr
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// A symbol located in an executable, not necessarily tied to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSymbol {
    name: String,
    addr: u64,
    size: u64,
}

impl DebugSymbol {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addr(&self) -> u64 {
        self.addr
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Debug info for a code model: type sizes, object addresses, and symbols.
pub struct DebugInfo {
    types: FxHashMap<EntityId, TypeDebugInfo>,
    objects: FxHashMap<EntityId, ObjectDebugInfo>,
    obj_addrs: BTreeMap<u64, EntityId>,
    symbols: BTreeMap<u64, Vec<DebugSymbol>>,
    ptr_size: u64,
}

impl DebugInfo {
    /// Creates debug info seeded with the builtin type sizes.
    pub fn new(model: &CodeModel) -> Self {
        let mut dbg = Self {
            types: FxHashMap::default(),
            objects: FxHashMap::default(),
            obj_addrs: BTreeMap::new(),
            symbols: BTreeMap::new(),
            ptr_size: 8,
        };

        let sizes: &[(BuiltinKind, u64)] = &[
            (BuiltinKind::Bool, 1),
            (BuiltinKind::Char, 1),
            (BuiltinKind::Short, 2),
            (BuiltinKind::Int, 4),
            (BuiltinKind::Long, 8),
            (BuiltinKind::LongLong, 8),
            (BuiltinKind::Int128, 16),
            (BuiltinKind::SignedChar, 1),
            (BuiltinKind::UnsignedChar, 1),
            (BuiltinKind::UnsignedShort, 2),
            (BuiltinKind::UnsignedInt, 4),
            (BuiltinKind::UnsignedLong, 8),
            (BuiltinKind::UnsignedLongLong, 8),
            (BuiltinKind::Uint128, 16),
            (BuiltinKind::Float, 4),
            (BuiltinKind::Double, 8),
            (BuiltinKind::LongDouble, 10),
            (BuiltinKind::WCharT, 4),
            (BuiltinKind::Char8T, 1),
            (BuiltinKind::Char16T, 2),
            (BuiltinKind::Char32T, 4),
            (BuiltinKind::NullptrT, 8),
            (BuiltinKind::ComplexChar, 2),
            (BuiltinKind::ComplexShort, 4),
            (BuiltinKind::ComplexInt, 8),
            (BuiltinKind::ComplexLong, 16),
            (BuiltinKind::ComplexLongLong, 16),
            (BuiltinKind::ComplexUnsignedChar, 2),
            (BuiltinKind::ComplexUnsignedShort, 4),
            (BuiltinKind::ComplexUnsignedInt, 8),
            (BuiltinKind::ComplexUnsignedLong, 16),
            (BuiltinKind::ComplexUnsignedLongLong, 16),
            (BuiltinKind::ComplexFloat, 8),
            (BuiltinKind::ComplexDouble, 16),
            (BuiltinKind::ComplexLongDouble, 20),
        ];
        for (kind, size) in sizes {
            dbg.add_type_size(model.builtin(*kind), *size);
        }

        dbg
    }

    /// Size of a pointer in bytes (default 8).
    pub fn ptr_size(&self) -> u64 {
        self.ptr_size
    }

    pub fn set_ptr_size(&mut self, size: u64) {
        self.ptr_size = size;
    }

    /// Records the size of a type.
    pub fn add_type_size(&mut self, ty: EntityId, size: u64) {
        self.types.insert(ty, TypeDebugInfo::new(size));
    }

    pub(crate) fn insert_type_info(&mut self, ty: EntityId, info: TypeDebugInfo) {
        self.types.insert(ty, info);
    }

    /// Debug info recorded for a type, if any.
    pub fn type_info(&self, ty: EntityId) -> Option<&TypeDebugInfo> {
        self.types.get(&ty)
    }

    /// Layout of a record type, if one has been computed.
    pub fn record_layout(&self, ty: EntityId) -> Option<&RecordLayout> {
        self.types.get(&ty).and_then(|info| info.layout())
    }

    /// Size of a type in bytes, or 0 when unknown. Pointers, references,
    /// member pointers, enums, typedefs, arrays, and vectors are derived;
    /// everything else comes from the recorded table.
    pub fn find_type_size(&self, model: &CodeModel, qt: QualType) -> u64 {
        match model.entity(qt.ty).kind() {
            EntityKind::Pointer { .. } | EntityKind::LvalueRef { .. } | EntityKind::RvalueRef { .. } => {
                self.ptr_size()
            }
            EntityKind::MemPtr { member, .. } => {
                if matches!(model.entity(member.ty).kind(), EntityKind::FuncType { .. }) {
                    // Pointer to member function.
                    self.ptr_size() * 2
                } else {
                    self.ptr_size()
                }
            }
            EntityKind::Enum(data) => {
                self.find_type_size(model, QualType::unqual(data.underlying()))
            }
            EntityKind::Typedef { aliased } => self.find_type_size(model, *aliased),
            EntityKind::Array { elem, len } => {
                self.find_type_size(model, QualType::unqual(*elem)) * len
            }
            EntityKind::Vector { elem, lanes } => {
                self.find_type_size(model, QualType::unqual(*elem)) * lanes
            }
            _ => self.types.get(&qt.ty).map(TypeDebugInfo::size).unwrap_or(0),
        }
    }

    /// Size of a type in bytes. Missing size info is an error, except for
    /// zero-length arrays which propagate 0.
    pub fn type_size(&self, model: &CodeModel, qt: QualType) -> Result<u64> {
        let size = self.find_type_size(model, qt);
        if size == 0 {
            let zero_len_array = matches!(
                model.entity(qt.ty).kind(),
                EntityKind::Array { len: 0, .. }
            );
            if !zero_len_array {
                return Err(ModelError::LayoutPrecondition(format!(
                    "size info not found for type {:?}",
                    qt.ty
                )));
            }
        }
        Ok(size)
    }

    /// Debug info for a code object, if registered.
    pub fn object(&self, ent: EntityId) -> Option<&ObjectDebugInfo> {
        self.objects.get(&ent)
    }

    /// Registers the address and size of a code object. Both the entity and
    /// the address must be unique.
    pub fn add_object(&mut self, ent: EntityId, addr: u64, size: u64) -> Result<()> {
        if self.objects.contains_key(&ent) {
            return Err(ModelError::DuplicateInsertion(format!(
                "debug info for entity {ent:?} already exists"
            )));
        }
        if self.obj_addrs.contains_key(&addr) {
            return Err(ModelError::DuplicateInsertion(format!(
                "an object at address {addr:#x} already exists"
            )));
        }

        self.objects.insert(ent, ObjectDebugInfo { addr, size });
        self.obj_addrs.insert(addr, ent);
        Ok(())
    }

    /// Finds the entity whose object spans the given address.
    pub fn entity_at_addr(&self, addr: u64) -> Option<EntityId> {
        let (start, ent) = self.obj_addrs.range(..=addr).next_back()?;
        let info = self.objects.get(ent)?;
        if addr >= start + info.size() {
            return None;
        }
        Some(*ent)
    }

    /// Registers a symbol with the given address, name, and size.
    pub fn add_sym(&mut self, addr: u64, name: &str, size: u64) {
        self.symbols.entry(addr).or_default().push(DebugSymbol {
            name: name.to_string(),
            addr,
            size,
        });
    }

    /// Finds a symbol whose range spans the given address.
    pub fn sym_at_addr(&self, addr: u64) -> Option<&DebugSymbol> {
        let (start, syms) = self.symbols.range(..=addr).next_back()?;
        syms.iter().find(|sym| addr < start + sym.size())
    }
}
