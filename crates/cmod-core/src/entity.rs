//! Entities and the use graph.
//!
//! Every object in the code model graph is an entity: builtin and composite
//! types, declared types, namespaces, records, functions, parameters,
//! variables, templates, template arguments, and substitutions. Entities
//! live in one arena owned by [`crate::CodeModel`] and reference each other
//! through stable `EntityId` indices.
//!
//! Each entity tracks a multiset of incoming uses. Adding and removing a use
//! is symmetric: the holder of a reference registers itself when the
//! reference is stored and deregisters when it is dropped or reassigned. An
//! entity may only be destroyed once its use set is empty.

use crate::context::ContextData;
use crate::error::{ModelError, Result};
use crate::function::FunctionData;
use crate::namespace::NamespaceData;
use crate::record::RecordData;
use crate::source::SourceLocation;
use crate::template::{SubstData, TemplateArgData, TemplateBody, TemplateData, TemplateParamKind};
use crate::types::{BuiltinKind, EnumData, QualType};

/// Stable index of an entity in the code model arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The relation a use edge represents, so consumers can iterate all uses of
/// an entity that are of one kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UseRole {
    /// Pointer or reference composite using its pointee type.
    Pointee,
    /// Array or vector composite using its element type.
    ArrayElem,
    /// Function type using its return type.
    FuncReturn,
    /// Function type using one of its parameter types.
    FuncParamType,
    /// Member-pointer composite using its owner record type.
    MemberOwner,
    /// Member-pointer composite using the member type.
    MemberType,
    /// Variable, field, parameter, or value template parameter using its
    /// declared type.
    VarType,
    /// Function declaration using its return type.
    ReturnType,
    /// Record using one of its base types.
    RecordBase,
    /// Typedef using its aliased type.
    TypedefAliased,
    /// Enum using its underlying builtin type.
    EnumUnderlying,
    /// Type template argument using its type.
    TemplateArg,
    /// Substitution or partial specialization using its template.
    SubstTemplate,
}

/// A tracked, non-owning reference from one entity to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Use {
    /// The entity holding the reference.
    pub user: EntityId,
    /// The relation the reference represents.
    pub role: UseRole,
}

/// Per-kind payload of an entity.
#[derive(Debug)]
pub enum EntityKind {
    /// Builtin type singleton.
    Builtin(BuiltinKind),
    /// Pointer type, interned by qualified pointee.
    Pointer { pointee: QualType },
    /// Lvalue reference type, interned by qualified pointee.
    LvalueRef { pointee: QualType },
    /// Rvalue reference type, interned by qualified pointee.
    RvalueRef { pointee: QualType },
    /// Array type, interned by element type and size.
    Array { elem: EntityId, len: u64 },
    /// Vector type, interned by builtin element type and lane count.
    Vector { elem: EntityId, lanes: u64 },
    /// Function type, interned by return and parameter types.
    FuncType { ret: QualType, params: Vec<QualType> },
    /// Pointer-to-member type, interned by owner record and member type.
    MemPtr { owner: EntityId, member: QualType },
    /// Record type (class/struct/union), possibly anonymous.
    Record(RecordData),
    /// Named type alias.
    Typedef { aliased: QualType },
    /// Enumeration type.
    Enum(EnumData),
    /// `decltype(...)` placeholder type.
    Decltype,
    /// Dependent-name placeholder type (`typename T::nested`).
    DependentName,
    /// Forward-reference placeholder created by the builder for a string
    /// type id; replaced by the real type at build finalization.
    Unresolved { ref_id: String },
    /// Template parameter: a placeholder type or a named value.
    TemplateParam(TemplateParamKind),
    /// Injected this-type standing for the template itself inside its body.
    TemplateThis { template: EntityId },
    /// Namespace.
    Namespace(NamespaceData),
    /// Variable (context variable or static record member).
    Variable { ty: QualType },
    /// Record field, with optional bit width (0 = ordinary field).
    Field { ty: QualType, bit_width: u32 },
    /// Function parameter.
    Param { ty: QualType },
    /// Function declaration (free function, method, or static member).
    Function(FunctionData),
    /// Template declaration (record or function template).
    Template(TemplateData),
    /// Template substitution: instantiation, specialization, or dependent
    /// instantiation.
    Substitution(SubstData),
    /// Partial specialization attached to a record template.
    PartialSpec(crate::template::PartialSpecData),
    /// Template argument owned by a substitution.
    TemplateArg(TemplateArgData),
}

/// A node in the code model graph.
#[derive(Debug)]
pub struct Entity {
    pub(crate) kind: EntityKind,
    pub(crate) parent: Option<EntityId>,
    pub(crate) name: Option<String>,
    pub(crate) loc: SourceLocation,
    pub(crate) uses: Vec<Use>,
}

impl Entity {
    pub(crate) fn new(kind: EntityKind, parent: Option<EntityId>, name: Option<String>) -> Self {
        Self {
            kind,
            parent,
            name,
            loc: SourceLocation::default(),
            uses: Vec::new(),
        }
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    /// Owning context, or `None` for the root and for model-owned types.
    pub fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn loc(&self) -> SourceLocation {
        self.loc
    }

    pub fn set_loc(&mut self, loc: SourceLocation) {
        self.loc = loc;
    }

    /// All incoming uses, as a multiset.
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    pub fn has_uses(&self) -> bool {
        !self.uses.is_empty()
    }

    /// Incoming uses filtered to one relation kind.
    pub fn uses_with_role(&self, role: UseRole) -> impl Iterator<Item = Use> + '_ {
        self.uses.iter().copied().filter(move |u| u.role == role)
    }

    pub(crate) fn add_use(&mut self, u: Use) {
        self.uses.push(u);
    }

    pub(crate) fn remove_use(&mut self, u: Use) -> Result<()> {
        match self.uses.iter().position(|cur| *cur == u) {
            Some(pos) => {
                self.uses.swap_remove(pos);
                Ok(())
            }
            None => Err(ModelError::UseInvariant(format!(
                "use {u:?} does not exist on entity"
            ))),
        }
    }

    /// True for entities defined by the language or compiler rather than
    /// user code.
    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, EntityKind::Builtin(_))
    }

    /// True if the entity is a type.
    pub fn is_type(&self) -> bool {
        match &self.kind {
            EntityKind::Builtin(_)
            | EntityKind::Pointer { .. }
            | EntityKind::LvalueRef { .. }
            | EntityKind::RvalueRef { .. }
            | EntityKind::Array { .. }
            | EntityKind::Vector { .. }
            | EntityKind::FuncType { .. }
            | EntityKind::MemPtr { .. }
            | EntityKind::Record(_)
            | EntityKind::Typedef { .. }
            | EntityKind::Enum(_)
            | EntityKind::Decltype
            | EntityKind::DependentName
            | EntityKind::Unresolved { .. }
            | EntityKind::TemplateThis { .. } => true,
            EntityKind::TemplateParam(kind) => matches!(kind, TemplateParamKind::Type),
            // Dependent instantiations and record substitutions are types;
            // function substitutions are not.
            EntityKind::Substitution(subst) => match &subst.body {
                None => true,
                Some(TemplateBody::Record(_)) => true,
                Some(TemplateBody::Function(_)) => false,
            },
            _ => false,
        }
    }

    /// True for composite types fully determined by structural content and
    /// interned by the model.
    pub fn is_composite_type(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Pointer { .. }
                | EntityKind::LvalueRef { .. }
                | EntityKind::RvalueRef { .. }
                | EntityKind::Array { .. }
                | EntityKind::Vector { .. }
                | EntityKind::FuncType { .. }
                | EntityKind::MemPtr { .. }
        )
    }

    /// True for record types: records proper and record-bodied
    /// substitutions (template record instantiations and specializations).
    pub fn is_record_type(&self) -> bool {
        match &self.kind {
            EntityKind::Record(_) => true,
            EntityKind::Substitution(subst) => {
                matches!(subst.body, Some(TemplateBody::Record(_)))
            }
            _ => false,
        }
    }

    /// Record payload for every record-like entity: record types, record
    /// templates, record-bodied substitutions, and partial specializations.
    pub fn record_data(&self) -> Option<&RecordData> {
        match &self.kind {
            EntityKind::Record(data) => Some(data),
            EntityKind::Template(templ) => match &templ.body {
                TemplateBody::Record(data) => Some(data),
                TemplateBody::Function(_) => None,
            },
            EntityKind::Substitution(subst) => match &subst.body {
                Some(TemplateBody::Record(data)) => Some(data),
                _ => None,
            },
            EntityKind::PartialSpec(spec) => Some(&spec.record),
            _ => None,
        }
    }

    pub(crate) fn record_data_mut(&mut self) -> Option<&mut RecordData> {
        match &mut self.kind {
            EntityKind::Record(data) => Some(data),
            EntityKind::Template(templ) => match &mut templ.body {
                TemplateBody::Record(data) => Some(data),
                TemplateBody::Function(_) => None,
            },
            EntityKind::Substitution(subst) => match &mut subst.body {
                Some(TemplateBody::Record(data)) => Some(data),
                _ => None,
            },
            EntityKind::PartialSpec(spec) => Some(&mut spec.record),
            _ => None,
        }
    }

    /// Function payload for function declarations, function templates, and
    /// function-bodied substitutions.
    pub fn function_data(&self) -> Option<&FunctionData> {
        match &self.kind {
            EntityKind::Function(data) => Some(data),
            EntityKind::Template(templ) => match &templ.body {
                TemplateBody::Function(data) => Some(data),
                TemplateBody::Record(_) => None,
            },
            EntityKind::Substitution(subst) => match &subst.body {
                Some(TemplateBody::Function(data)) => Some(data),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn function_data_mut(&mut self) -> Option<&mut FunctionData> {
        match &mut self.kind {
            EntityKind::Function(data) => Some(data),
            EntityKind::Template(templ) => match &mut templ.body {
                TemplateBody::Function(data) => Some(data),
                TemplateBody::Record(_) => None,
            },
            EntityKind::Substitution(subst) => match &mut subst.body {
                Some(TemplateBody::Function(data)) => Some(data),
                _ => None,
            },
            _ => None,
        }
    }

    /// Context payload for every context-bearing entity kind.
    pub fn context_data(&self) -> Option<&ContextData> {
        match &self.kind {
            EntityKind::Namespace(ns) => Some(&ns.ctx),
            EntityKind::Function(data) => Some(&data.ctx),
            _ => self
                .record_data()
                .map(|rec| &rec.ctx)
                .or_else(|| self.function_data().map(|f| &f.ctx)),
        }
    }

    pub(crate) fn context_data_mut(&mut self) -> Option<&mut ContextData> {
        match &mut self.kind {
            EntityKind::Namespace(ns) => Some(&mut ns.ctx),
            EntityKind::Function(data) => Some(&mut data.ctx),
            EntityKind::Record(data) => Some(&mut data.ctx),
            EntityKind::Template(templ) => match &mut templ.body {
                TemplateBody::Record(data) => Some(&mut data.ctx),
                TemplateBody::Function(data) => Some(&mut data.ctx),
            },
            EntityKind::Substitution(subst) => match &mut subst.body {
                Some(TemplateBody::Record(data)) => Some(&mut data.ctx),
                Some(TemplateBody::Function(data)) => Some(&mut data.ctx),
                None => None,
            },
            EntityKind::PartialSpec(spec) => Some(&mut spec.record.ctx),
            _ => None,
        }
    }

    pub fn namespace_data(&self) -> Option<&NamespaceData> {
        match &self.kind {
            EntityKind::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    pub(crate) fn namespace_data_mut(&mut self) -> Option<&mut NamespaceData> {
        match &mut self.kind {
            EntityKind::Namespace(ns) => Some(ns),
            _ => None,
        }
    }

    pub fn template_data(&self) -> Option<&TemplateData> {
        match &self.kind {
            EntityKind::Template(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn template_data_mut(&mut self) -> Option<&mut TemplateData> {
        match &mut self.kind {
            EntityKind::Template(data) => Some(data),
            _ => None,
        }
    }

    pub fn subst_data(&self) -> Option<&SubstData> {
        match &self.kind {
            EntityKind::Substitution(data) => Some(data),
            _ => None,
        }
    }
}
