//! The template model: templates, parameters, arguments, and substitutions.
//!
//! A template is a named entity in some context, parameterized by an ordered
//! list of template parameters. Instantiations, specializations, and
//! dependent instantiations are all substitutions sharing one key space per
//! template: the canonical sequence of argument descriptors. Record
//! substitutions carry a record body of their own and behave as record
//! types; dependent instantiations are bodiless placeholder types that the
//! front end re-resolves when the enclosing template is itself instantiated.

use crate::context::ContextData;
use crate::entity::{Entity, EntityId, EntityKind, UseRole};
use crate::error::{ModelError, Result};
use crate::function::FunctionData;
use crate::model::CodeModel;
use crate::record::{RecordData, RecordKind};
use crate::types::{QualType, Quals};
use rustc_hash::FxHashMap;

/// A template parameter: a named placeholder type, or a named value of some
/// type.
#[derive(Debug)]
pub enum TemplateParamKind {
    Type,
    Value { ty: QualType },
}

/// Body of a template or substitution.
#[derive(Debug)]
pub enum TemplateBody {
    Record(RecordData),
    Function(FunctionData),
}

/// Payload of a template declaration.
#[derive(Debug)]
pub struct TemplateData {
    pub(crate) params: Vec<EntityId>,
    pub(crate) variadic: bool,
    pub(crate) substs: FxHashMap<SubstKey, EntityId>,
    pub(crate) partial_specs: Vec<EntityId>,
    pub(crate) body: TemplateBody,
}

impl TemplateData {
    fn new(body: TemplateBody) -> Self {
        Self {
            params: Vec::new(),
            variadic: false,
            substs: FxHashMap::default(),
            partial_specs: Vec::new(),
            body,
        }
    }

    /// Template parameters, in declaration order.
    pub fn params(&self) -> &[EntityId] {
        &self.params
    }

    /// True when the last parameter is a pack.
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Partial specializations attached to this template.
    pub fn partial_specs(&self) -> &[EntityId] {
        &self.partial_specs
    }
}

/// Substitution kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubstKind {
    /// Concrete, fully-typed substitution.
    Instantiation,
    /// User-written replacement for a specific argument list.
    Specialization,
    /// Substitution whose arguments contain unresolved template parameters.
    DependentInstantiation,
}

/// Payload of a substitution entity.
#[derive(Debug)]
pub struct SubstData {
    pub(crate) template: EntityId,
    pub(crate) kind: SubstKind,
    pub(crate) args: Vec<EntityId>,
    pub(crate) body: Option<TemplateBody>,
}

impl SubstData {
    pub fn template(&self) -> EntityId {
        self.template
    }

    pub fn kind(&self) -> SubstKind {
        self.kind
    }

    /// Argument entities, in declaration order.
    pub fn args(&self) -> &[EntityId] {
        &self.args
    }
}

/// Payload of a partial specialization: a secondary templated entity with
/// its own parameters and its own argument list matching the parent
/// template's parameter arity.
#[derive(Debug)]
pub struct PartialSpecData {
    pub(crate) template: EntityId,
    pub(crate) params: Vec<EntityId>,
    pub(crate) args: Vec<EntityId>,
    pub(crate) record: RecordData,
}

impl PartialSpecData {
    pub fn template(&self) -> EntityId {
        self.template
    }

    pub fn params(&self) -> &[EntityId] {
        &self.params
    }

    pub fn args(&self) -> &[EntityId] {
        &self.args
    }
}

/// Payload of a template argument entity.
#[derive(Debug)]
pub enum TemplateArgData {
    /// Type argument; registers a use of its type.
    Type(QualType),
    /// Opaque value argument; the textual form suffices for equality.
    Value(String),
}

/// Descriptor used to create or look up substitutions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateArgDesc {
    Type(QualType),
    Value(String),
}

impl TemplateArgDesc {
    pub fn value(text: impl Into<String>) -> Self {
        TemplateArgDesc::Value(text.into())
    }
}

impl From<QualType> for TemplateArgDesc {
    fn from(qt: QualType) -> Self {
        TemplateArgDesc::Type(qt)
    }
}

impl From<EntityId> for TemplateArgDesc {
    fn from(ty: EntityId) -> Self {
        TemplateArgDesc::Type(QualType::unqual(ty))
    }
}

/// Canonical form of one template argument inside a substitution key. Type
/// arguments canonicalize to the `(type, quals)` pair; value arguments to
/// their textual literal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgKey {
    Type(EntityId, Quals),
    Value(String),
}

/// Substitution map key: the canonical sequence of argument descriptors.
/// Argument lists match by equality of length and pairwise equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubstKey(pub Vec<ArgKey>);

impl SubstKey {
    pub fn of_descs(descs: &[TemplateArgDesc]) -> Self {
        SubstKey(
            descs
                .iter()
                .map(|desc| match desc {
                    TemplateArgDesc::Type(qt) => ArgKey::Type(qt.ty, qt.quals),
                    TemplateArgDesc::Value(text) => ArgKey::Value(text.clone()),
                })
                .collect(),
        )
    }
}

impl CodeModel {
    /// Creates a record template in a context. An injected this-type is
    /// created as the first child entity of the template body.
    pub fn create_template_record(
        &mut self,
        ctx: EntityId,
        name: &str,
        kind: RecordKind,
    ) -> EntityId {
        let data = TemplateData::new(TemplateBody::Record(RecordData::new(kind)));
        let templ = self.create_in_ctx(ctx, EntityKind::Template(data), Some(name));
        self.create_in_ctx(templ, EntityKind::TemplateThis { template: templ }, None);
        templ
    }

    /// Creates a function template in a context.
    pub fn create_template_function(&mut self, ctx: EntityId, name: &str) -> EntityId {
        let data = TemplateData::new(TemplateBody::Function(FunctionData::new()));
        self.create_in_ctx(ctx, EntityKind::Template(data), Some(name))
    }

    /// Gets an existing record template with the given name or creates a new
    /// one. An existing entity must be a record template whose variadic flag
    /// matches.
    pub fn get_or_create_template_record(
        &mut self,
        ctx: EntityId,
        name: &str,
        kind: RecordKind,
        variadic: bool,
    ) -> Result<EntityId> {
        if let Some(existing) = self.find_named_entity(ctx, name) {
            let ent = self.entity(existing);
            if ent.template_data().is_none() || ent.record_data().is_none() {
                return Err(ModelError::TypeConstraint(format!(
                    "named entity {name:?} is not a template record"
                )));
            }
            if self.is_variadic(existing) != variadic {
                return Err(ModelError::TypeConstraint(format!(
                    "parameter pack flag of template {name:?} does not match"
                )));
            }
            return Ok(existing);
        }

        let templ = self.create_template_record(ctx, name, kind);
        self.set_variadic(templ, variadic);
        Ok(templ)
    }

    pub fn is_variadic(&self, templ: EntityId) -> bool {
        self.templ_data(templ).variadic
    }

    pub fn set_variadic(&mut self, templ: EntityId, variadic: bool) {
        self.templ_data_mut(templ).variadic = variadic;
    }

    /// Template parameters, in declaration order.
    pub fn template_params(&self, templ: EntityId) -> &[EntityId] {
        &self.templ_data(templ).params
    }

    /// Index of a parameter within its template.
    pub fn template_param_index(&self, templ: EntityId, param: EntityId) -> Option<usize> {
        self.templ_data(templ)
            .params
            .iter()
            .position(|cur| *cur == param)
    }

    /// Adds a named type parameter to a template.
    pub fn add_type_template_param(&mut self, templ: EntityId, name: &str) -> EntityId {
        let id = self.create_in_ctx(
            templ,
            EntityKind::TemplateParam(TemplateParamKind::Type),
            Some(name),
        );
        self.templ_data_mut(templ).params.push(id);
        id
    }

    /// Adds a named value parameter of the given type to a template.
    pub fn add_value_template_param(
        &mut self,
        templ: EntityId,
        name: &str,
        ty: QualType,
    ) -> EntityId {
        let id = self.create_in_ctx(
            templ,
            EntityKind::TemplateParam(TemplateParamKind::Value { ty }),
            Some(name),
        );
        self.add_use(ty.ty, id, UseRole::VarType);
        self.templ_data_mut(templ).params.push(id);
        id
    }

    /// Injected this-type of a record template: the first child entity of
    /// the template body.
    pub fn this_type(&self, templ: EntityId) -> Option<EntityId> {
        self.templ_data(templ)
            .body_ctx()
            .entities
            .iter()
            .copied()
            .find(|id| matches!(self.entity(*id).kind, EntityKind::TemplateThis { .. }))
    }

    /// Searches the substitution map for the given argument list, whatever
    /// the substitution kind.
    pub fn find_substitution(
        &self,
        templ: EntityId,
        args: &[TemplateArgDesc],
    ) -> Option<EntityId> {
        let key = SubstKey::of_descs(args);
        self.templ_data(templ).substs.get(&key).copied()
    }

    /// Searches for an instantiation with the given argument list. A
    /// specialization is an instantiation for lookup purposes.
    pub fn find_instantiation(&self, templ: EntityId, args: &[TemplateArgDesc]) -> Option<EntityId> {
        self.find_substitution(templ, args).filter(|id| {
            matches!(
                self.subst_kind(*id),
                SubstKind::Instantiation | SubstKind::Specialization
            )
        })
    }

    /// Searches for a user-written specialization with the given argument
    /// list.
    pub fn find_specialization(
        &self,
        templ: EntityId,
        args: &[TemplateArgDesc],
    ) -> Option<EntityId> {
        self.find_substitution(templ, args)
            .filter(|id| self.subst_kind(*id) == SubstKind::Specialization)
    }

    /// Searches for a dependent instantiation with the given argument list.
    pub fn find_dependent_instantiation(
        &self,
        templ: EntityId,
        args: &[TemplateArgDesc],
    ) -> Option<EntityId> {
        self.find_substitution(templ, args)
            .filter(|id| self.subst_kind(*id) == SubstKind::DependentInstantiation)
    }

    /// Creates a concrete instantiation for an argument list. The key must
    /// not already be present; callers use find-or-create.
    pub fn create_instantiation(
        &mut self,
        templ: EntityId,
        args: &[TemplateArgDesc],
    ) -> Result<EntityId> {
        self.create_substitution(templ, args, SubstKind::Instantiation)
    }

    /// Creates a user-written specialization for an argument list.
    pub fn create_specialization(
        &mut self,
        templ: EntityId,
        args: &[TemplateArgDesc],
    ) -> Result<EntityId> {
        self.create_substitution(templ, args, SubstKind::Specialization)
    }

    /// Creates a dependent instantiation for an argument list containing
    /// unresolved template parameters.
    pub fn create_dependent_instantiation(
        &mut self,
        templ: EntityId,
        args: &[TemplateArgDesc],
    ) -> Result<EntityId> {
        self.create_substitution(templ, args, SubstKind::DependentInstantiation)
    }

    /// Returns the existing instantiation for an argument list or creates a
    /// new one.
    pub fn find_or_create_instantiation(
        &mut self,
        templ: EntityId,
        args: &[TemplateArgDesc],
    ) -> Result<(EntityId, bool)> {
        if let Some(existing) = self.find_instantiation(templ, args) {
            return Ok((existing, false));
        }
        Ok((self.create_instantiation(templ, args)?, true))
    }

    /// Substitutions of a template, in unspecified order.
    pub fn substitutions(&self, templ: EntityId) -> impl Iterator<Item = EntityId> + '_ {
        self.templ_data(templ).substs.values().copied()
    }

    pub fn substitution_count(&self, templ: EntityId) -> usize {
        self.templ_data(templ).substs.len()
    }

    /// Argument entities of a substitution, in declaration order.
    pub fn subst_args(&self, subst: EntityId) -> &[EntityId] {
        match &self.entity(subst).kind {
            EntityKind::Substitution(data) => &data.args,
            EntityKind::PartialSpec(data) => &data.args,
            _ => panic!("entity is not a substitution"),
        }
    }

    pub fn subst_kind(&self, subst: EntityId) -> SubstKind {
        match &self.entity(subst).kind {
            EntityKind::Substitution(data) => data.kind,
            _ => panic!("entity is not a substitution"),
        }
    }

    /// Template a substitution or partial specialization belongs to.
    pub fn subst_template(&self, subst: EntityId) -> EntityId {
        match &self.entity(subst).kind {
            EntityKind::Substitution(data) => data.template,
            EntityKind::PartialSpec(data) => data.template,
            _ => panic!("entity is not a substitution"),
        }
    }

    /// Type of a type template argument, or `None` for value arguments.
    pub fn template_arg_type(&self, arg: EntityId) -> Option<QualType> {
        match &self.entity(arg).kind {
            EntityKind::TemplateArg(TemplateArgData::Type(qt)) => Some(*qt),
            EntityKind::TemplateArg(TemplateArgData::Value(_)) => None,
            _ => panic!("entity is not a template argument"),
        }
    }

    /// Textual value of a value template argument, or `None` for type
    /// arguments.
    pub fn template_arg_value(&self, arg: EntityId) -> Option<&str> {
        match &self.entity(arg).kind {
            EntityKind::TemplateArg(TemplateArgData::Value(text)) => Some(text),
            EntityKind::TemplateArg(TemplateArgData::Type(_)) => None,
            _ => panic!("entity is not a template argument"),
        }
    }

    /// Swaps the type of a type template argument, updating uses and
    /// re-keying the owning substitution in its template's map.
    pub fn set_template_arg_type(&mut self, arg: EntityId, new_ty: QualType) -> Result<()> {
        let old = match &self.entity(arg).kind {
            EntityKind::TemplateArg(TemplateArgData::Type(qt)) => *qt,
            _ => {
                return Err(ModelError::TypeConstraint(
                    "entity is not a type template argument".into(),
                ));
            }
        };
        if old == new_ty {
            return Ok(());
        }

        self.remove_use(old.ty, arg, UseRole::TemplateArg)?;
        self.add_use(new_ty.ty, arg, UseRole::TemplateArg);
        self.entity_mut(arg).kind = EntityKind::TemplateArg(TemplateArgData::Type(new_ty));

        // A substitution's identity is its argument list; keep the map key
        // in sync with the mutated argument.
        let subst = self
            .entity(arg)
            .parent
            .expect("template argument has no owner");
        if matches!(self.entity(subst).kind, EntityKind::Substitution(_)) {
            self.rekey_substitution(subst)?;
        }
        Ok(())
    }

    /// Creates a partial specialization attached to a record template. The
    /// entity lives in the template's parent context.
    pub fn create_partial_specialization(&mut self, templ: EntityId) -> Result<EntityId> {
        let kind = match &self.templ_data(templ).body {
            TemplateBody::Record(rec) => rec.kind(),
            TemplateBody::Function(_) => {
                return Err(ModelError::TypeConstraint(
                    "partial specializations require a record template".into(),
                ));
            }
        };

        let parent_ctx = self
            .entity(templ)
            .parent
            .expect("template has no parent context");
        let data = PartialSpecData {
            template: templ,
            params: Vec::new(),
            args: Vec::new(),
            record: RecordData::new(kind),
        };
        let spec = self.create_in_ctx(parent_ctx, EntityKind::PartialSpec(data), None);
        self.add_use(templ, spec, UseRole::SubstTemplate);
        self.templ_data_mut(templ).partial_specs.push(spec);
        Ok(spec)
    }

    /// Adds a named type parameter to a partial specialization.
    pub fn add_partial_spec_type_param(&mut self, spec: EntityId, name: &str) -> EntityId {
        let id = self.create_in_ctx(
            spec,
            EntityKind::TemplateParam(TemplateParamKind::Type),
            Some(name),
        );
        match &mut self.entity_mut(spec).kind {
            EntityKind::PartialSpec(data) => data.params.push(id),
            _ => panic!("entity is not a partial specialization"),
        }
        id
    }

    /// Appends an argument to a partial specialization's argument list.
    /// Arity against the parent template is the front end's responsibility.
    pub fn add_partial_spec_arg(&mut self, spec: EntityId, desc: TemplateArgDesc) -> EntityId {
        let arg = self.create_arg_entity(spec, &desc);
        match &mut self.entity_mut(spec).kind {
            EntityKind::PartialSpec(data) => data.args.push(arg),
            _ => panic!("entity is not a partial specialization"),
        }
        arg
    }

    /// True when a type reaches an in-scope template parameter, an injected
    /// this-type, or a dependent-name placeholder.
    pub fn is_dependent_type(&self, ty: EntityId) -> bool {
        match &self.entity(ty).kind {
            EntityKind::TemplateParam(TemplateParamKind::Type)
            | EntityKind::TemplateThis { .. }
            | EntityKind::DependentName => true,
            EntityKind::Pointer { pointee }
            | EntityKind::LvalueRef { pointee }
            | EntityKind::RvalueRef { pointee } => self.is_dependent_type(pointee.ty),
            EntityKind::Array { elem, .. } | EntityKind::Vector { elem, .. } => {
                self.is_dependent_type(*elem)
            }
            EntityKind::FuncType { ret, params } => {
                self.is_dependent_type(ret.ty)
                    || params.iter().any(|par| self.is_dependent_type(par.ty))
            }
            EntityKind::MemPtr { owner, member } => {
                self.is_dependent_type(*owner) || self.is_dependent_type(member.ty)
            }
            _ => false,
        }
    }

    /// True when an argument descriptor mentions a dependent type.
    pub fn is_dependent_arg(&self, desc: &TemplateArgDesc) -> bool {
        match desc {
            TemplateArgDesc::Type(qt) => self.is_dependent_type(qt.ty),
            TemplateArgDesc::Value(_) => false,
        }
    }

    fn create_substitution(
        &mut self,
        templ: EntityId,
        args: &[TemplateArgDesc],
        kind: SubstKind,
    ) -> Result<EntityId> {
        let key = SubstKey::of_descs(args);
        if self.templ_data(templ).substs.contains_key(&key) {
            return Err(ModelError::DuplicateInsertion(format!(
                "substitution with key {key:?} already exists"
            )));
        }

        // Dependent instantiations are placeholder types without a body of
        // their own; the front end re-resolves them later.
        let body = if kind == SubstKind::DependentInstantiation {
            None
        } else {
            match &self.templ_data(templ).body {
                TemplateBody::Record(rec) => {
                    Some(TemplateBody::Record(RecordData::new(rec.kind())))
                }
                TemplateBody::Function(_) => Some(TemplateBody::Function(FunctionData::new())),
            }
        };

        let parent_ctx = self
            .entity(templ)
            .parent
            .expect("template has no parent context");
        let data = SubstData {
            template: templ,
            kind,
            args: Vec::new(),
            body,
        };
        let subst = self.create_in_ctx(parent_ctx, EntityKind::Substitution(data), None);
        self.add_use(templ, subst, UseRole::SubstTemplate);

        for desc in args {
            let arg = self.create_arg_entity(subst, desc);
            match &mut self.entity_mut(subst).kind {
                EntityKind::Substitution(data) => data.args.push(arg),
                _ => unreachable!(),
            }
        }

        self.templ_data_mut(templ).substs.insert(key, subst);
        Ok(subst)
    }

    fn create_arg_entity(&mut self, owner: EntityId, desc: &TemplateArgDesc) -> EntityId {
        let data = match desc {
            TemplateArgDesc::Type(qt) => TemplateArgData::Type(*qt),
            TemplateArgDesc::Value(text) => TemplateArgData::Value(text.clone()),
        };
        let arg = self.alloc(Entity::new(EntityKind::TemplateArg(data), Some(owner), None));
        if let TemplateArgDesc::Type(qt) = desc {
            self.add_use(qt.ty, arg, UseRole::TemplateArg);
        }
        arg
    }

    pub(crate) fn subst_key_of(&self, subst: EntityId) -> SubstKey {
        let keys = self
            .subst_args(subst)
            .iter()
            .map(|arg| match &self.entity(*arg).kind {
                EntityKind::TemplateArg(TemplateArgData::Type(qt)) => ArgKey::Type(qt.ty, qt.quals),
                EntityKind::TemplateArg(TemplateArgData::Value(text)) => {
                    ArgKey::Value(text.clone())
                }
                _ => panic!("substitution argument is not a template argument"),
            })
            .collect();
        SubstKey(keys)
    }

    fn rekey_substitution(&mut self, subst: EntityId) -> Result<()> {
        let templ = self.subst_template(subst);
        let new_key = self.subst_key_of(subst);

        let substs = &mut self.templ_data_mut(templ).substs;
        let old_key = substs
            .iter()
            .find(|(_, id)| **id == subst)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| {
                ModelError::UseInvariant(format!(
                    "substitution {subst:?} not found in its template map"
                ))
            })?;

        if old_key == new_key {
            return Ok(());
        }
        if substs.contains_key(&new_key) {
            return Err(ModelError::DuplicateInsertion(format!(
                "substitution with key {new_key:?} already exists"
            )));
        }
        substs.remove(&old_key);
        substs.insert(new_key, subst);
        Ok(())
    }

    pub(crate) fn templ_data(&self, templ: EntityId) -> &TemplateData {
        self.entity(templ)
            .template_data()
            .expect("entity is not a template")
    }

    pub(crate) fn templ_data_mut(&mut self, templ: EntityId) -> &mut TemplateData {
        self.entity_mut(templ)
            .template_data_mut()
            .expect("entity is not a template")
    }
}

impl TemplateData {
    pub(crate) fn body_ctx(&self) -> &ContextData {
        match &self.body {
            TemplateBody::Record(rec) => &rec.ctx,
            TemplateBody::Function(func) => &func.ctx,
        }
    }
}
