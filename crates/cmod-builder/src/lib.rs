//! Fluent incremental construction of a code model.
//!
//! The builder composes hierarchically: beginning a namespace, record, or
//! template yields a sub-builder that owns its parent and hands it back from
//! `end()`. Construction is idempotent: starting a record that already
//! exists returns a builder that populates the id map but adds nothing.
//!
//! Types that are not known yet may be referenced by string id
//! ([`Scope::typeref`]); [`Builder::build`] replaces every placeholder with
//! the type recorded for its id ([`Scope::set_type`]), sweeps composite
//! types that were built over placeholders and became unused, and computes
//! default layouts for the records created during the build.

use cmod_core::{
    AccessLevel, CodeModel, EntityId, EntityKind, ModelError, QualType, RecordKind, Result,
    SourceLocation, TemplateArgDesc,
};
use cmod_debug::DebugInfo;
use rustc_hash::FxHashMap;
use std::marker::PhantomData;
use tracing::{debug, trace};


/// A template parameter request: a named type parameter or a named value
/// parameter of some type.
#[derive(Clone, Debug)]
pub enum TemplateParamDesc {
    Type(String),
    Value(String, QualType),
}

impl From<&str> for TemplateParamDesc {
    fn from(name: &str) -> Self {
        TemplateParamDesc::Type(name.to_string())
    }
}

impl From<(&str, QualType)> for TemplateParamDesc {
    fn from((name, ty): (&str, QualType)) -> Self {
        TemplateParamDesc::Value(name.to_string(), ty)
    }
}

impl From<(&str, EntityId)> for TemplateParamDesc {
    fn from((name, ty): (&str, EntityId)) -> Self {
        TemplateParamDesc::Value(name.to_string(), QualType::unqual(ty))
    }
}

/// Shared state of one build: the borrowed model and debug info, the
/// forward-reference maps, and the queue of records awaiting layout.
pub struct BuilderCore<'a> {
    model: &'a mut CodeModel,
    debug: Option<&'a mut DebugInfo>,
    /// Placeholder type per referenced id.
    ref_types: FxHashMap<String, EntityId>,
    /// Real (or, transiently, placeholder) type per id.
    resolved: FxHashMap<String, EntityId>,
    /// Records created by this builder, laid out at build time.
    new_records: Vec<EntityId>,
    finished: bool,
}

mod sealed {
    pub trait Sealed {}
}

/// Operations available in every builder scope: forward references by id
/// and composite type shorthands.
pub trait Scope<'a>: sealed::Sealed {
    #[doc(hidden)]
    fn core_mut(&mut self) -> &mut BuilderCore<'a>;

    /// The code model being built.
    fn model<'s>(&'s mut self) -> &'s mut CodeModel
    where
        'a: 's,
    {
        &mut *self.core_mut().model
    }

    /// Returns the placeholder type associated with an id, creating it on
    /// first use. The placeholder is usable anywhere a type is needed and
    /// is replaced by the real type at build time.
    fn typeref(&mut self, id: &str) -> EntityId {
        let core = self.core_mut();
        if let Some(existing) = core.ref_types.get(id) {
            return *existing;
        }
        let placeholder = core.model.create_unresolved_type(id);
        core.ref_types.insert(id.to_string(), placeholder);
        placeholder
    }

    /// Records the real type for an id.
    fn set_type(&mut self, id: &str, ty: EntityId) {
        self.core_mut().resolved.insert(id.to_string(), ty);
    }

    /// Builtin type shorthand.
    fn builtin(&mut self, kind: cmod_core::BuiltinKind) -> EntityId {
        self.core_mut().model.builtin(kind)
    }

    /// Gets or creates a pointer type.
    fn ptype(&mut self, base: impl Into<QualType>) -> Result<EntityId> {
        self.core_mut().model.get_or_create_ptr_type(base)
    }

    /// Gets or creates an lvalue reference type.
    fn rtype(&mut self, base: impl Into<QualType>) -> Result<EntityId> {
        self.core_mut().model.get_or_create_lvalue_ref_type(base)
    }

    /// Gets or creates an array type.
    fn atype(&mut self, elem: EntityId, len: u64) -> EntityId {
        self.core_mut().model.get_or_create_arr_type(elem, len)
    }

    /// Gets or creates a vector type.
    fn vtype(&mut self, elem: EntityId, lanes: u64) -> Result<EntityId> {
        self.core_mut().model.get_or_create_vec_type(elem, lanes)
    }

    /// Gets or creates a function type.
    fn ftype(&mut self, ret: impl Into<QualType>, params: &[QualType]) -> Result<EntityId> {
        self.core_mut().model.get_or_create_func_type(ret, params)
    }

    /// Gets or creates a pointer-to-member type.
    fn mtype(&mut self, owner: EntityId, member: impl Into<QualType>) -> Result<EntityId> {
        self.core_mut().model.get_or_create_mem_ptr_type(owner, member)
    }
}

/// Lookup of the types registered by id during a build.
#[derive(Debug, Default)]
pub struct BuildResult {
    types: FxHashMap<String, EntityId>,
}

impl BuildResult {
    /// Type registered for an id, if any.
    pub fn ty(&self, id: &str) -> Option<EntityId> {
        self.types.get(id).copied()
    }

    /// All (id, type) pairs registered during the build.
    pub fn types(&self) -> impl Iterator<Item = (&str, EntityId)> + '_ {
        self.types.iter().map(|(id, ty)| (id.as_str(), *ty))
    }
}

/// The root builder, scoped to the model's global namespace.
pub struct Builder<'a> {
    core: BuilderCore<'a>,
}

impl<'a> sealed::Sealed for Builder<'a> {}

impl<'a> Scope<'a> for Builder<'a> {
    fn core_mut(&mut self) -> &mut BuilderCore<'a> {
        &mut self.core
    }
}

impl<'a> Builder<'a> {
    /// Creates a builder for a code model, optionally with debug info that
    /// receives default layouts for the records built.
    pub fn new(model: &'a mut CodeModel, debug: Option<&'a mut DebugInfo>) -> Self {
        Self {
            core: BuilderCore {
                model,
                debug,
                ref_types: FxHashMap::default(),
                resolved: FxHashMap::default(),
                new_records: Vec::new(),
                finished: false,
            },
        }
    }

    /// Starts building a namespace (get-or-create).
    pub fn ns(mut self, name: &str) -> NamespaceBuilder<'a, Self> {
        let root = self.core.model.root();
        let ns = self.core.model.get_or_create_namespace(root, name);
        NamespaceBuilder { parent: self, ns, _marker: PhantomData }
    }

    /// Starts building a named record in the global namespace.
    pub fn record(self, name: &str, kind: RecordKind) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(Some(name), kind, None)
    }

    /// Starts building a named record, registering it under an id.
    pub fn record_with_id(
        self,
        name: &str,
        kind: RecordKind,
        id: &str,
    ) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(Some(name), kind, Some(id))
    }

    /// Starts building an anonymous record.
    pub fn record_anon(self, kind: RecordKind, id: Option<&str>) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(None, kind, id)
    }

    fn record_impl(
        mut self,
        name: Option<&str>,
        kind: RecordKind,
        id: Option<&str>,
    ) -> Result<RecordBuilder<'a, Self>> {
        let root = self.core.model.root();
        let (rec, is_new) = rec_in_ns(&mut self.core, root, name, kind, id)?;
        Ok(RecordBuilder {
            parent: self,
            rec,
            is_new,
            _marker: PhantomData,
        })
    }

    /// Starts building a template in the global namespace.
    pub fn templ<I, A>(self, name: &str, params: I) -> TemplateBuilder<'a, Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateParamDesc>,
    {
        let ctx = self.core.model.root();
        TemplateBuilder::start(self, ctx, name, false, params)
    }

    /// Starts building a variadic template in the global namespace.
    pub fn vtempl<I, A>(self, name: &str, params: I) -> TemplateBuilder<'a, Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateParamDesc>,
    {
        let ctx = self.core.model.root();
        TemplateBuilder::start(self, ctx, name, true, params)
    }

    /// Completes the build: resolves every forward reference, removes
    /// placeholder-derived composite types that became unused, and computes
    /// default layouts for the records created by this builder. The builder
    /// is single-use.
    pub fn build(mut self) -> Result<BuildResult> {
        self.core.finished = true;
        debug!(
            refs = self.core.ref_types.len(),
            records = self.core.new_records.len(),
            "finalizing build"
        );

        // Replace every placeholder with its recorded real type.
        let mut refs: Vec<(String, EntityId)> = self
            .core
            .ref_types
            .iter()
            .map(|(id, placeholder)| (id.clone(), *placeholder))
            .collect();
        refs.sort_by(|a, b| a.0.cmp(&b.0));

        for (id, placeholder) in &refs {
            let real = self.core.resolved.get(id).copied().ok_or_else(|| {
                ModelError::LookupMiss(format!("can't find type for ref id {id:?}"))
            })?;
            if real == *placeholder {
                return Err(ModelError::LookupMiss(format!(
                    "type for ref id {id:?} was never defined"
                )));
            }
            trace!(id = %id, "resolving type reference");
            self.core.model.replace_type(*placeholder, real)?;
        }

        // Composite types built over placeholders are stale duplicates of
        // the rebuilt ones; sweep the unused ones until a fixed point.
        let ref_ids: Vec<EntityId> = refs.iter().map(|(_, placeholder)| *placeholder).collect();
        loop {
            let dead: Vec<EntityId> = self
                .core
                .model
                .composite_types()
                .filter(|ty| {
                    !self.core.model.entity(*ty).has_uses()
                        && is_ref_derived(self.core.model, &ref_ids, *ty)
                })
                .collect();
            if dead.is_empty() {
                break;
            }
            for ty in dead {
                self.core.model.remove_type(ty)?;
            }
        }

        for (id, placeholder) in &refs {
            if self.core.model.entity(*placeholder).has_uses() {
                return Err(ModelError::UseInvariant(format!(
                    "placeholder for ref id {id:?} still has uses"
                )));
            }
            self.core.model.remove_type(*placeholder)?;
        }
        self.core.ref_types.clear();

        // Lay out the records created during this build.
        if let Some(debug) = self.core.debug.as_deref_mut() {
            for rec in &self.core.new_records {
                debug.make_default_record_layout(self.core.model, *rec, true)?;
            }
        }
        self.core.new_records.clear();

        Ok(BuildResult {
            types: self.core.resolved.clone(),
        })
    }
}

impl Drop for Builder<'_> {
    fn drop(&mut self) {
        // A builder must be finalized with build(); dropping one with
        // pending placeholders leaves unresolved types in the model, and
        // dropping one with queued records leaves them without layouts.
        let pending = !self.core.ref_types.is_empty() || !self.core.new_records.is_empty();
        if !self.core.finished && pending && !std::thread::panicking() {
            tracing::error!("builder dropped with unresolved type references");
            debug_assert!(false, "builder dropped without build()");
        }
    }
}

/// Builder scoped to one namespace.
pub struct NamespaceBuilder<'a, P: Scope<'a>> {
    parent: P,
    ns: EntityId,
    _marker: PhantomData<&'a ()>,
}

impl<'a, P: Scope<'a>> sealed::Sealed for NamespaceBuilder<'a, P> {}

impl<'a, P: Scope<'a>> Scope<'a> for NamespaceBuilder<'a, P> {
    fn core_mut(&mut self) -> &mut BuilderCore<'a> {
        self.parent.core_mut()
    }
}

impl<'a, P: Scope<'a>> NamespaceBuilder<'a, P> {
    /// Finishes this namespace and returns the parent builder.
    pub fn end(self) -> P {
        self.parent
    }

    /// The namespace being built.
    pub fn id(&self) -> EntityId {
        self.ns
    }

    /// Starts building a nested namespace (get-or-create).
    pub fn ns(mut self, name: &str) -> NamespaceBuilder<'a, Self> {
        let ns = self.ns;
        let nested = self.core_mut().model.get_or_create_namespace(ns, name);
        NamespaceBuilder {
            parent: self,
            ns: nested,
            _marker: PhantomData,
        }
    }

    /// Starts building a named record in this namespace.
    pub fn record(self, name: &str, kind: RecordKind) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(Some(name), kind, None)
    }

    /// Starts building a named record, registering it under an id.
    pub fn record_with_id(
        self,
        name: &str,
        kind: RecordKind,
        id: &str,
    ) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(Some(name), kind, Some(id))
    }

    /// Starts building an anonymous record.
    pub fn record_anon(self, kind: RecordKind, id: Option<&str>) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(None, kind, id)
    }

    fn record_impl(
        mut self,
        name: Option<&str>,
        kind: RecordKind,
        id: Option<&str>,
    ) -> Result<RecordBuilder<'a, Self>> {
        let ns = self.ns;
        let (rec, is_new) = rec_in_ns(self.core_mut(), ns, name, kind, id)?;
        Ok(RecordBuilder {
            parent: self,
            rec,
            is_new,
            _marker: PhantomData,
        })
    }

    /// Starts building a template in this namespace.
    pub fn templ<I, A>(self, name: &str, params: I) -> TemplateBuilder<'a, Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateParamDesc>,
    {
        let ctx = self.ns;
        TemplateBuilder::start(self, ctx, name, false, params)
    }

    /// Starts building a variadic template in this namespace.
    pub fn vtempl<I, A>(self, name: &str, params: I) -> TemplateBuilder<'a, Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateParamDesc>,
    {
        let ctx = self.ns;
        TemplateBuilder::start(self, ctx, name, true, params)
    }
}

/// Builder scoped to one record (or template record instantiation).
///
/// When the record already existed before this build, operations are no-ops
/// that still populate the id map, so incremental builds can cross-reference
/// existing types.
pub struct RecordBuilder<'a, P: Scope<'a>> {
    parent: P,
    rec: Option<EntityId>,
    is_new: bool,
    _marker: PhantomData<&'a ()>,
}

impl<'a, P: Scope<'a>> sealed::Sealed for RecordBuilder<'a, P> {}

impl<'a, P: Scope<'a>> Scope<'a> for RecordBuilder<'a, P> {
    fn core_mut(&mut self) -> &mut BuilderCore<'a> {
        self.parent.core_mut()
    }
}

impl<'a, P: Scope<'a>> RecordBuilder<'a, P> {
    /// Finishes this record and returns the parent builder.
    pub fn end(self) -> P {
        self.parent
    }

    /// The record being built, when known. Anonymous records nested in a
    /// pre-existing record can't be looked up and yield `None`.
    pub fn id(&self) -> Option<EntityId> {
        self.rec
    }

    /// False when the record existed before this build.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Adds a base type.
    pub fn base(mut self, ty: EntityId) -> Result<Self> {
        if let (Some(rec), true) = (self.rec, self.is_new) {
            self.core_mut()
                .model
                .add_base(rec, ty, AccessLevel::Private)?;
        }
        Ok(self)
    }

    /// Creates a public field.
    pub fn field(self, name: &str, ty: impl Into<QualType>) -> Result<Self> {
        self.field_full(name, ty.into(), AccessLevel::Public, 0, SourceLocation::default())
    }

    /// Creates a field with an access level and bit width.
    pub fn field_with(
        self,
        name: &str,
        ty: impl Into<QualType>,
        access: AccessLevel,
        bit_width: u32,
    ) -> Result<Self> {
        self.field_full(name, ty.into(), access, bit_width, SourceLocation::default())
    }

    /// Creates a public field with a source location.
    pub fn field_at(
        self,
        name: &str,
        ty: impl Into<QualType>,
        loc: SourceLocation,
    ) -> Result<Self> {
        self.field_full(name, ty.into(), AccessLevel::Public, 0, loc)
    }

    fn field_full(
        mut self,
        name: &str,
        ty: QualType,
        access: AccessLevel,
        bit_width: u32,
        loc: SourceLocation,
    ) -> Result<Self> {
        if let (Some(rec), true) = (self.rec, self.is_new) {
            let model = &mut *self.core_mut().model;
            let field = model.create_field(rec, name, ty, access, bit_width)?;
            if loc.is_valid() {
                model.set_loc(field, loc);
            }
        }
        Ok(self)
    }

    /// Creates a public method with the signature of a function type.
    pub fn method(self, name: &str, sig: EntityId) -> Result<Self> {
        self.method_with(name, sig, AccessLevel::Public)
    }

    /// Creates a method with the signature of a function type.
    pub fn method_with(mut self, name: &str, sig: EntityId, access: AccessLevel) -> Result<Self> {
        if let (Some(rec), true) = (self.rec, self.is_new) {
            let model = &mut *self.core_mut().model;
            let func = model.create_method(rec, name, access);
            apply_signature(model, func, sig)?;
        }
        Ok(self)
    }

    /// Creates a public static member function with the signature of a
    /// function type.
    pub fn func(mut self, name: &str, sig: EntityId) -> Result<Self> {
        if let (Some(rec), true) = (self.rec, self.is_new) {
            let model = &mut *self.core_mut().model;
            let func = model.create_static_function(rec, name, AccessLevel::Public);
            apply_signature(model, func, sig)?;
        }
        Ok(self)
    }

    /// Creates a public member typedef.
    pub fn tdef(self, name: &str, ty: impl Into<QualType>) -> Result<Self> {
        self.tdef_impl(name, ty.into(), None)
    }

    /// Creates a public member typedef, registering it under an id.
    pub fn tdef_with_id(self, name: &str, ty: impl Into<QualType>, id: &str) -> Result<Self> {
        self.tdef_impl(name, ty.into(), Some(id))
    }

    fn tdef_impl(mut self, name: &str, ty: QualType, id: Option<&str>) -> Result<Self> {
        let Some(rec) = self.rec else {
            return Ok(self);
        };

        let td = if self.is_new {
            self.core_mut()
                .model
                .create_member_typedef(rec, name, ty, AccessLevel::Public)
        } else {
            self.core_mut()
                .model
                .find_typedef(rec, name)
                .ok_or_else(|| {
                    ModelError::LookupMiss(format!(
                        "can't find typedef {name:?} in existing record"
                    ))
                })?
        };

        if let Some(id) = id {
            self.set_type(id, td);
        }
        Ok(self)
    }

    /// Starts building a named nested record.
    pub fn record(self, name: &str, kind: RecordKind) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(Some(name), kind, None)
    }

    /// Starts building a named nested record, registering it under an id.
    pub fn record_with_id(
        self,
        name: &str,
        kind: RecordKind,
        id: &str,
    ) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(Some(name), kind, Some(id))
    }

    /// Starts building an anonymous nested record.
    pub fn record_anon(self, kind: RecordKind, id: Option<&str>) -> Result<RecordBuilder<'a, Self>> {
        self.record_impl(None, kind, id)
    }

    fn record_impl(
        mut self,
        name: Option<&str>,
        kind: RecordKind,
        id: Option<&str>,
    ) -> Result<RecordBuilder<'a, Self>> {
        let (parent_rec, parent_is_new) = (self.rec, self.is_new);
        let (rec, is_new) = rec_in_rec(self.core_mut(), parent_rec, parent_is_new, name, kind, id)?;
        Ok(RecordBuilder {
            parent: self,
            rec,
            is_new,
            _marker: PhantomData,
        })
    }

    /// Starts building a nested template in this record.
    pub fn templ<I, A>(self, name: &str, params: I) -> Result<TemplateBuilder<'a, Self>>
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateParamDesc>,
    {
        let ctx = self.rec.ok_or_else(|| {
            ModelError::LookupMiss("can't build a template in an unresolved record".into())
        })?;
        Ok(TemplateBuilder::start(self, ctx, name, false, params))
    }
}

/// Builder for a template and its record instantiations.
pub struct TemplateBuilder<'a, P: Scope<'a>> {
    parent: P,
    ctx: EntityId,
    name: String,
    variadic: bool,
    params: Vec<TemplateParamDesc>,
    _marker: PhantomData<&'a ()>,
}

impl<'a, P: Scope<'a>> sealed::Sealed for TemplateBuilder<'a, P> {}

impl<'a, P: Scope<'a>> Scope<'a> for TemplateBuilder<'a, P> {
    fn core_mut(&mut self) -> &mut BuilderCore<'a> {
        self.parent.core_mut()
    }
}

impl<'a, P: Scope<'a>> TemplateBuilder<'a, P> {
    fn start<I, A>(parent: P, ctx: EntityId, name: &str, variadic: bool, params: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateParamDesc>,
    {
        Self {
            parent,
            ctx,
            name: name.to_string(),
            variadic,
            params: params.into_iter().map(Into::into).collect(),
            _marker: PhantomData,
        }
    }

    /// Finishes this template and returns the parent builder.
    pub fn end(self) -> P {
        self.parent
    }

    /// Starts building the class instantiation of this template for an
    /// argument list.
    pub fn record<I, A>(self, args: I) -> Result<RecordBuilder<'a, Self>>
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateArgDesc>,
    {
        self.record_full(RecordKind::Class, None, args)
    }

    /// Starts building the class instantiation for an argument list,
    /// registering it under an id.
    pub fn record_with_id<I, A>(self, id: &str, args: I) -> Result<RecordBuilder<'a, Self>>
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateArgDesc>,
    {
        self.record_full(RecordKind::Class, Some(id), args)
    }

    /// Starts building an instantiation with an explicit record kind.
    pub fn record_full<I, A>(
        mut self,
        kind: RecordKind,
        id: Option<&str>,
        args: I,
    ) -> Result<RecordBuilder<'a, Self>>
    where
        I: IntoIterator<Item = A>,
        A: Into<TemplateArgDesc>,
    {
        let descs: Vec<TemplateArgDesc> = args.into_iter().map(Into::into).collect();
        let (ctx, name, variadic) = (self.ctx, self.name.clone(), self.variadic);
        let params = self.params.clone();

        let core = self.core_mut();
        let templ = match core.model.find_template_record(ctx, &name) {
            Some(existing) => {
                if core.model.is_variadic(existing) != variadic {
                    return Err(ModelError::TypeConstraint(format!(
                        "parameter pack flag of template {name:?} does not match"
                    )));
                }
                existing
            }
            None => {
                let templ = core.model.create_template_record(ctx, &name, kind);
                core.model.set_variadic(templ, variadic);
                for param in &params {
                    match param {
                        TemplateParamDesc::Type(pname) => {
                            core.model.add_type_template_param(templ, pname);
                        }
                        TemplateParamDesc::Value(pname, ty) => {
                            core.model.add_value_template_param(templ, pname, *ty);
                        }
                    }
                }
                templ
            }
        };

        let (inst, is_new) = core.model.find_or_create_instantiation(templ, &descs)?;
        if is_new {
            core.new_records.push(inst);
        }
        if let Some(id) = id {
            core.resolved.insert(id.to_string(), inst);
        }

        Ok(RecordBuilder {
            parent: self,
            rec: Some(inst),
            is_new,
            _marker: PhantomData,
        })
    }
}

fn apply_signature(model: &mut CodeModel, func: EntityId, sig: EntityId) -> Result<()> {
    let ret = model.func_type_ret(sig);
    let params: Vec<QualType> = model.func_type_params(sig).to_vec();
    model.set_ret_type(func, Some(ret))?;
    for par in params {
        model.add_param(func, par);
    }
    Ok(())
}

fn rec_in_ns(
    core: &mut BuilderCore<'_>,
    ns: EntityId,
    name: Option<&str>,
    kind: RecordKind,
    id: Option<&str>,
) -> Result<(Option<EntityId>, bool)> {
    let (rec, is_new) = match name {
        Some(name) => match core.model.find_named_record(ns, name) {
            Some(existing) => (existing, false),
            None => {
                let rec = core.model.create_named_record(ns, name, kind);
                core.new_records.push(rec);
                (rec, true)
            }
        },
        None => {
            let rec = core.model.create_record(ns, kind);
            core.new_records.push(rec);
            (rec, true)
        }
    };

    if let Some(id) = id {
        core.resolved.insert(id.to_string(), rec);
    }
    Ok((Some(rec), is_new))
}

fn rec_in_rec(
    core: &mut BuilderCore<'_>,
    parent: Option<EntityId>,
    parent_is_new: bool,
    name: Option<&str>,
    kind: RecordKind,
    id: Option<&str>,
) -> Result<(Option<EntityId>, bool)> {
    // Nested anonymous record of an existing record: nothing to build, and
    // nothing to look up either.
    let Some(parent) = parent else {
        return Ok((None, false));
    };

    if parent_is_new {
        let rec = match name {
            Some(name) => {
                core.model
                    .create_named_member_record(parent, name, kind, AccessLevel::Public)
            }
            None => core.model.create_member_record(parent, kind, AccessLevel::Public),
        };
        core.new_records.push(rec);
        if let Some(id) = id {
            core.resolved.insert(id.to_string(), rec);
        }
        return Ok((Some(rec), true));
    }

    let Some(name) = name else {
        return Ok((None, false));
    };

    let rec = core.model.find_named_record(parent, name).ok_or_else(|| {
        ModelError::LookupMiss(format!(
            "can't find nested record {name:?} in existing record"
        ))
    })?;
    if let Some(id) = id {
        core.resolved.insert(id.to_string(), rec);
    }
    Ok((Some(rec), false))
}

fn is_ref_derived(model: &CodeModel, refs: &[EntityId], ty: EntityId) -> bool {
    match model.entity(ty).kind() {
        EntityKind::Unresolved { .. } => refs.contains(&ty),
        EntityKind::Pointer { pointee }
        | EntityKind::LvalueRef { pointee }
        | EntityKind::RvalueRef { pointee } => is_ref_derived(model, refs, pointee.ty),
        EntityKind::Array { elem, .. } | EntityKind::Vector { elem, .. } => {
            is_ref_derived(model, refs, *elem)
        }
        EntityKind::FuncType { ret, params } => {
            is_ref_derived(model, refs, ret.ty)
                || params.iter().any(|par| is_ref_derived(model, refs, par.ty))
        }
        EntityKind::MemPtr { owner, member } => {
            is_ref_derived(model, refs, *owner) || is_ref_derived(model, refs, member.ty)
        }
        _ => false,
    }
}
