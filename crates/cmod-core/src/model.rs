//! The code model: entity arena, builtin singletons, and composite type
//! interning.

use crate::context::ContextData;
use crate::entity::{Entity, EntityId, EntityKind, Use, UseRole};
use crate::error::{ModelError, Result};
use crate::namespace::NamespaceData;
use crate::record::{RecordData, RecordKind};
use crate::source::{SourceFile, SourceFileId};
use crate::template::{TemplateArgData, TemplateParamKind};
use crate::types::{BuiltinKind, EnumItem, FuncTypeKey, QualType};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::trace;

/// The code model. Owns every entity of the graph and acts as the global
/// namespace; composite types are owned by the model directly rather than by
/// any context.
pub struct CodeModel {
    entities: Vec<Option<Entity>>,
    root: EntityId,
    builtins: Vec<EntityId>,
    opaque: EntityId,

    ptr_types: FxHashMap<QualType, EntityId>,
    lvalue_ref_types: FxHashMap<QualType, EntityId>,
    rvalue_ref_types: FxHashMap<QualType, EntityId>,
    arr_types: FxHashMap<(EntityId, u64), EntityId>,
    vec_types: FxHashMap<(EntityId, u64), EntityId>,
    func_types: FxHashMap<FuncTypeKey, EntityId>,
    mem_ptr_types: FxHashMap<(EntityId, QualType), EntityId>,

    sources: Vec<SourceFile>,
    source_ids: FxHashMap<PathBuf, SourceFileId>,
}

impl CodeModel {
    /// Creates a code model with the global namespace, all builtin type
    /// singletons, and the opaque record type.
    pub fn new() -> Self {
        let mut model = Self {
            entities: Vec::new(),
            root: EntityId(0),
            builtins: Vec::new(),
            opaque: EntityId(0),
            ptr_types: FxHashMap::default(),
            lvalue_ref_types: FxHashMap::default(),
            rvalue_ref_types: FxHashMap::default(),
            arr_types: FxHashMap::default(),
            vec_types: FxHashMap::default(),
            func_types: FxHashMap::default(),
            mem_ptr_types: FxHashMap::default(),
            sources: Vec::new(),
            source_ids: FxHashMap::default(),
        };

        model.root = model.alloc(Entity::new(
            EntityKind::Namespace(NamespaceData::new()),
            None,
            None,
        ));

        for kind in BuiltinKind::ALL {
            let id = model.alloc(Entity::new(
                EntityKind::Builtin(*kind),
                None,
                Some(kind.name().to_string()),
            ));
            model.builtins.push(id);
        }

        model.opaque = model.alloc(Entity::new(
            EntityKind::Record(RecordData::new(RecordKind::Struct)),
            None,
            None,
        ));

        model
    }

    /// The root context: the global namespace.
    pub fn root(&self) -> EntityId {
        self.root
    }

    /// Builtin type singleton of the given kind.
    pub fn builtin(&self, kind: BuiltinKind) -> EntityId {
        self.builtins[kind as usize]
    }

    /// The opaque record type.
    pub fn opaque_type(&self) -> EntityId {
        self.opaque
    }

    /// Entity by id. Accessing a removed entity is a programming error.
    pub fn entity(&self, id: EntityId) -> &Entity {
        self.entities[id.index()]
            .as_ref()
            .expect("entity was removed")
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> &mut Entity {
        self.entities[id.index()]
            .as_mut()
            .expect("entity was removed")
    }

    /// Entity by id, or `None` if out of range or removed.
    pub fn try_entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.index()).and_then(|slot| slot.as_ref())
    }

    /// True while the entity has not been removed from the model.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.try_entity(id).is_some()
    }

    /// Sets the source location of an entity.
    pub fn set_loc(&mut self, id: EntityId, loc: crate::SourceLocation) {
        self.entity_mut(id).set_loc(loc);
    }

    pub(crate) fn alloc(&mut self, ent: Entity) -> EntityId {
        let id = EntityId(u32::try_from(self.entities.len()).expect("entity arena overflow"));
        self.entities.push(Some(ent));
        id
    }

    pub(crate) fn release(&mut self, id: EntityId) {
        let slot = &mut self.entities[id.index()];
        assert!(slot.is_some(), "entity released twice");
        *slot = None;
    }

    pub(crate) fn ctx_data(&self, ctx: EntityId) -> &ContextData {
        self.entity(ctx)
            .context_data()
            .expect("entity is not a context")
    }

    pub(crate) fn create_in_ctx(
        &mut self,
        ctx: EntityId,
        kind: EntityKind,
        name: Option<&str>,
    ) -> EntityId {
        let id = self.alloc(Entity::new(kind, Some(ctx), name.map(str::to_string)));
        self.entity_mut(ctx)
            .context_data_mut()
            .expect("entity is not a context")
            .insert(id, name);
        id
    }

    pub(crate) fn add_use(&mut self, target: EntityId, user: EntityId, role: UseRole) {
        self.entity_mut(target).add_use(Use { user, role });
    }

    pub(crate) fn remove_use(&mut self, target: EntityId, user: EntityId, role: UseRole) -> Result<()> {
        self.entity_mut(target).remove_use(Use { user, role })
    }

    //////////////////////////////////////////////////////////////////////
    // Composite type interning

    /// Gets an existing pointer type or creates a new one. Pointers to
    /// references are rejected.
    pub fn get_or_create_ptr_type(&mut self, pointee: impl Into<QualType>) -> Result<EntityId> {
        let pointee = pointee.into();
        if self.is_reference_type(pointee.ty) {
            return Err(ModelError::TypeConstraint(
                "pointer to reference is not valid".into(),
            ));
        }
        if let Some(existing) = self.ptr_types.get(&pointee) {
            return Ok(*existing);
        }

        let id = self.alloc(Entity::new(EntityKind::Pointer { pointee }, None, None));
        self.add_use(pointee.ty, id, UseRole::Pointee);
        self.ptr_types.insert(pointee, id);
        Ok(id)
    }

    /// Gets an existing lvalue reference type or creates a new one.
    /// References to references are rejected.
    pub fn get_or_create_lvalue_ref_type(
        &mut self,
        pointee: impl Into<QualType>,
    ) -> Result<EntityId> {
        let pointee = pointee.into();
        if self.is_reference_type(pointee.ty) {
            return Err(ModelError::TypeConstraint(
                "reference to reference is not valid".into(),
            ));
        }
        if let Some(existing) = self.lvalue_ref_types.get(&pointee) {
            return Ok(*existing);
        }

        let id = self.alloc(Entity::new(EntityKind::LvalueRef { pointee }, None, None));
        self.add_use(pointee.ty, id, UseRole::Pointee);
        self.lvalue_ref_types.insert(pointee, id);
        Ok(id)
    }

    /// Gets an existing rvalue reference type or creates a new one.
    pub fn get_or_create_rvalue_ref_type(
        &mut self,
        pointee: impl Into<QualType>,
    ) -> Result<EntityId> {
        let pointee = pointee.into();
        if self.is_reference_type(pointee.ty) {
            return Err(ModelError::TypeConstraint(
                "reference to reference is not valid".into(),
            ));
        }
        if let Some(existing) = self.rvalue_ref_types.get(&pointee) {
            return Ok(*existing);
        }

        let id = self.alloc(Entity::new(EntityKind::RvalueRef { pointee }, None, None));
        self.add_use(pointee.ty, id, UseRole::Pointee);
        self.rvalue_ref_types.insert(pointee, id);
        Ok(id)
    }

    /// Gets an existing array type or creates a new one.
    pub fn get_or_create_arr_type(&mut self, elem: EntityId, len: u64) -> EntityId {
        if let Some(existing) = self.arr_types.get(&(elem, len)) {
            return *existing;
        }

        let id = self.alloc(Entity::new(EntityKind::Array { elem, len }, None, None));
        self.add_use(elem, id, UseRole::ArrayElem);
        self.arr_types.insert((elem, len), id);
        id
    }

    /// Gets an existing vector type or creates a new one. The element must
    /// be a builtin type and the lane count must be finite.
    pub fn get_or_create_vec_type(&mut self, elem: EntityId, lanes: u64) -> Result<EntityId> {
        if !matches!(self.entity(elem).kind(), EntityKind::Builtin(_)) {
            return Err(ModelError::TypeConstraint(
                "element of a vector type must be a builtin type".into(),
            ));
        }
        if lanes == u64::MAX {
            return Err(ModelError::TypeConstraint(
                "vector type must have a finite size".into(),
            ));
        }
        if let Some(existing) = self.vec_types.get(&(elem, lanes)) {
            return Ok(*existing);
        }

        let id = self.alloc(Entity::new(EntityKind::Vector { elem, lanes }, None, None));
        self.add_use(elem, id, UseRole::ArrayElem);
        self.vec_types.insert((elem, lanes), id);
        Ok(id)
    }

    /// Gets an existing function type or creates a new one. The return type
    /// may not itself be a function type.
    pub fn get_or_create_func_type(
        &mut self,
        ret: impl Into<QualType>,
        params: &[QualType],
    ) -> Result<EntityId> {
        let ret = ret.into();
        if matches!(self.entity(ret.ty).kind(), EntityKind::FuncType { .. }) {
            return Err(ModelError::TypeConstraint(
                "function return type can't be a function type".into(),
            ));
        }

        let key = FuncTypeKey {
            ret,
            params: params.to_vec(),
        };
        if let Some(existing) = self.func_types.get(&key) {
            return Ok(*existing);
        }

        let id = self.alloc(Entity::new(
            EntityKind::FuncType {
                ret,
                params: params.to_vec(),
            },
            None,
            None,
        ));
        self.add_use(ret.ty, id, UseRole::FuncReturn);
        for par in params {
            self.add_use(par.ty, id, UseRole::FuncParamType);
        }
        self.func_types.insert(key, id);
        Ok(id)
    }

    /// Gets an existing function type matching a function declaration's
    /// signature or creates a new one.
    pub fn get_or_create_func_type_of(&mut self, func: EntityId) -> Result<EntityId> {
        let ret = self.ret_type(func).ok_or_else(|| {
            ModelError::TypeConstraint("function has no return type".into())
        })?;
        let params: Vec<QualType> = self
            .params(func)
            .iter()
            .map(|par| self.param_type(*par))
            .collect();
        self.get_or_create_func_type(ret, &params)
    }

    /// Gets an existing pointer-to-member type or creates a new one. The
    /// owner must be a record type.
    pub fn get_or_create_mem_ptr_type(
        &mut self,
        owner: EntityId,
        member: impl Into<QualType>,
    ) -> Result<EntityId> {
        let member = member.into();
        if !self.entity(owner).is_record_type() {
            return Err(ModelError::TypeConstraint(
                "member pointer owner must be a record type".into(),
            ));
        }
        if let Some(existing) = self.mem_ptr_types.get(&(owner, member)) {
            return Ok(*existing);
        }

        let id = self.alloc(Entity::new(EntityKind::MemPtr { owner, member }, None, None));
        self.add_use(owner, id, UseRole::MemberOwner);
        self.add_use(member.ty, id, UseRole::MemberType);
        self.mem_ptr_types.insert((owner, member), id);
        Ok(id)
    }

    /// Creates a forward-reference placeholder type for a string id. The
    /// placeholder is owned by nobody; it is expected to be replaced via
    /// [`CodeModel::replace_type`] and then removed.
    pub fn create_unresolved_type(&mut self, ref_id: &str) -> EntityId {
        self.alloc(Entity::new(
            EntityKind::Unresolved {
                ref_id: ref_id.to_string(),
            },
            None,
            None,
        ))
    }

    pub fn ptr_types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ptr_types.values().copied()
    }

    pub fn lvalue_ref_types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.lvalue_ref_types.values().copied()
    }

    pub fn rvalue_ref_types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.rvalue_ref_types.values().copied()
    }

    pub fn arr_types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.arr_types.values().copied()
    }

    pub fn vec_types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.vec_types.values().copied()
    }

    pub fn func_types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.func_types.values().copied()
    }

    pub fn mem_ptr_types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.mem_ptr_types.values().copied()
    }

    /// All composite types in the model.
    pub fn composite_types(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.ptr_types()
            .chain(self.lvalue_ref_types())
            .chain(self.rvalue_ref_types())
            .chain(self.arr_types())
            .chain(self.vec_types())
            .chain(self.func_types())
            .chain(self.mem_ptr_types())
    }

    fn is_reference_type(&self, ty: EntityId) -> bool {
        matches!(
            self.entity(ty).kind(),
            EntityKind::LvalueRef { .. } | EntityKind::RvalueRef { .. }
        )
    }

    //////////////////////////////////////////////////////////////////////
    // Component accessors

    /// Qualified pointee of a pointer or reference type.
    pub fn pointee(&self, ty: EntityId) -> QualType {
        match self.entity(ty).kind() {
            EntityKind::Pointer { pointee }
            | EntityKind::LvalueRef { pointee }
            | EntityKind::RvalueRef { pointee } => *pointee,
            _ => panic!("entity is not a pointer or reference type"),
        }
    }

    /// Element type and size of an array or vector type.
    pub fn array_info(&self, ty: EntityId) -> (EntityId, u64) {
        match self.entity(ty).kind() {
            EntityKind::Array { elem, len } => (*elem, *len),
            EntityKind::Vector { elem, lanes } => (*elem, *lanes),
            _ => panic!("entity is not an array or vector type"),
        }
    }

    /// Return type of a function type.
    pub fn func_type_ret(&self, ty: EntityId) -> QualType {
        match self.entity(ty).kind() {
            EntityKind::FuncType { ret, .. } => *ret,
            _ => panic!("entity is not a function type"),
        }
    }

    /// Parameter types of a function type, in order.
    pub fn func_type_params(&self, ty: EntityId) -> &[QualType] {
        match self.entity(ty).kind() {
            EntityKind::FuncType { params, .. } => params,
            _ => panic!("entity is not a function type"),
        }
    }

    /// Owner record and member type of a pointer-to-member type.
    pub fn mem_ptr_info(&self, ty: EntityId) -> (EntityId, QualType) {
        match self.entity(ty).kind() {
            EntityKind::MemPtr { owner, member } => (*owner, *member),
            _ => panic!("entity is not a member pointer type"),
        }
    }

    /// Declared type of a variable, field, parameter, or value template
    /// parameter.
    pub fn var_type(&self, ent: EntityId) -> QualType {
        match self.entity(ent).kind() {
            EntityKind::Variable { ty }
            | EntityKind::Field { ty, .. }
            | EntityKind::Param { ty }
            | EntityKind::TemplateParam(TemplateParamKind::Value { ty }) => *ty,
            _ => panic!("entity has no declared type"),
        }
    }

    /// Swaps the declared type of a variable, field, or parameter.
    pub fn set_var_type(&mut self, ent: EntityId, new_ty: QualType) -> Result<()> {
        let old = self.var_type(ent);
        if old == new_ty {
            return Ok(());
        }
        self.remove_use(old.ty, ent, UseRole::VarType)?;
        self.add_use(new_ty.ty, ent, UseRole::VarType);
        match &mut self.entity_mut(ent).kind {
            EntityKind::Variable { ty }
            | EntityKind::Field { ty, .. }
            | EntityKind::Param { ty }
            | EntityKind::TemplateParam(TemplateParamKind::Value { ty }) => *ty = new_ty,
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Bit width of a field; 0 for ordinary fields.
    pub fn field_bit_width(&self, ent: EntityId) -> u32 {
        match self.entity(ent).kind() {
            EntityKind::Field { bit_width, .. } => *bit_width,
            _ => panic!("entity is not a field"),
        }
    }

    /// Aliased type of a typedef.
    pub fn typedef_aliased(&self, ent: EntityId) -> QualType {
        match self.entity(ent).kind() {
            EntityKind::Typedef { aliased } => *aliased,
            _ => panic!("entity is not a typedef"),
        }
    }

    /// Swaps the aliased type of a typedef.
    pub fn set_typedef_aliased(&mut self, ent: EntityId, new_ty: QualType) -> Result<()> {
        let old = self.typedef_aliased(ent);
        if old == new_ty {
            return Ok(());
        }
        self.remove_use(old.ty, ent, UseRole::TypedefAliased)?;
        self.add_use(new_ty.ty, ent, UseRole::TypedefAliased);
        match &mut self.entity_mut(ent).kind {
            EntityKind::Typedef { aliased } => *aliased = new_ty,
            _ => unreachable!(),
        }
        Ok(())
    }

    /// Underlying builtin type of an enum.
    pub fn enum_underlying(&self, ent: EntityId) -> EntityId {
        match self.entity(ent).kind() {
            EntityKind::Enum(data) => data.underlying,
            _ => panic!("entity is not an enum"),
        }
    }

    /// Enumerators of an enum, in declaration order.
    pub fn enum_items(&self, ent: EntityId) -> &[EnumItem] {
        match self.entity(ent).kind() {
            EntityKind::Enum(data) => &data.items,
            _ => panic!("entity is not an enum"),
        }
    }

    /// Appends an enumerator to an enum.
    pub fn add_enum_item(&mut self, ent: EntityId, name: &str, value: i64) {
        match &mut self.entity_mut(ent).kind {
            EntityKind::Enum(data) => data.items.push(EnumItem {
                name: name.to_string(),
                value,
            }),
            _ => panic!("entity is not an enum"),
        }
    }

    /// Resolves typedef chains down to the underlying type.
    pub fn untypedef(&self, ty: EntityId) -> EntityId {
        let mut cur = ty;
        loop {
            match self.entity(cur).kind() {
                EntityKind::Typedef { aliased } => cur = aliased.ty,
                _ => return cur,
            }
        }
    }

    //////////////////////////////////////////////////////////////////////
    // Type replacement and removal

    /// Replaces all uses of one type with another.
    ///
    /// Composite types over `src` are rebuilt with `dst` substituted and
    /// replaced recursively; every other use swaps its stored qualified
    /// type. The old composites keep their (now dangling) interest in `src`
    /// until [`CodeModel::remove_unused_composite_types`] sweeps them, after
    /// which `src` has no uses left.
    pub fn replace_type(&mut self, src: EntityId, dst: EntityId) -> Result<()> {
        trace!(?src, ?dst, "replace_type");

        // Composite types first: rebuilding a composite may add new uses of
        // src (a function type over an already-rebuilt pointer, say), so
        // keep scanning until no unvisited composite user remains.
        let mut visited: Vec<EntityId> = Vec::new();
        loop {
            let next = self
                .entity(src)
                .uses()
                .iter()
                .map(|u| u.user)
                .find(|user| {
                    self.is_alive(*user)
                        && self.entity(*user).is_composite_type()
                        && !visited.contains(user)
                });
            let Some(comp) = next else { break };
            visited.push(comp);

            let rebuilt = self.rebuild_composite(comp, src, dst)?;
            if rebuilt != comp {
                self.replace_type(comp, rebuilt)?;
            }
        }

        // Everything else swaps its stored type in place. Swapping removes
        // the use being visited, so snapshot first and skip the composite
        // users that phase one intentionally left behind.
        let users: Vec<Use> = self
            .entity(src)
            .uses()
            .iter()
            .copied()
            .filter(|u| !self.entity(u.user).is_composite_type())
            .collect();

        for u in users {
            match u.role {
                UseRole::VarType => {
                    let cur = self.var_type(u.user);
                    self.set_var_type(u.user, cur.replaced(src, dst))?;
                }
                UseRole::ReturnType => {
                    let cur = self.ret_type(u.user).expect("return-type use without type");
                    self.set_ret_type(u.user, Some(cur.replaced(src, dst)))?;
                }
                UseRole::TypedefAliased => {
                    let cur = self.typedef_aliased(u.user);
                    self.set_typedef_aliased(u.user, cur.replaced(src, dst))?;
                }
                UseRole::RecordBase => {
                    self.replace_base(u.user, src, dst)?;
                }
                UseRole::TemplateArg => {
                    let cur = self
                        .template_arg_type(u.user)
                        .expect("type-argument use without type");
                    self.set_template_arg_type(u.user, cur.replaced(src, dst))?;
                }
                UseRole::EnumUnderlying => {
                    if !matches!(self.entity(dst).kind(), EntityKind::Builtin(_)) {
                        return Err(ModelError::TypeConstraint(
                            "enum underlying type must be a builtin type".into(),
                        ));
                    }
                    self.remove_use(src, u.user, UseRole::EnumUnderlying)?;
                    self.add_use(dst, u.user, UseRole::EnumUnderlying);
                    match &mut self.entity_mut(u.user).kind {
                        EntityKind::Enum(data) => data.underlying = dst,
                        _ => unreachable!(),
                    }
                }
                _ => {
                    return Err(ModelError::UseInvariant(format!(
                        "don't know how to replace type use {u:?}"
                    )));
                }
            }
        }

        Ok(())
    }

    fn rebuild_composite(&mut self, comp: EntityId, src: EntityId, dst: EntityId) -> Result<EntityId> {
        match self.entity(comp).kind() {
            EntityKind::Pointer { pointee } => {
                let new_base = pointee.replaced(src, dst);
                self.get_or_create_ptr_type(new_base)
            }
            EntityKind::LvalueRef { pointee } => {
                let new_base = pointee.replaced(src, dst);
                self.get_or_create_lvalue_ref_type(new_base)
            }
            EntityKind::RvalueRef { pointee } => {
                let new_base = pointee.replaced(src, dst);
                self.get_or_create_rvalue_ref_type(new_base)
            }
            EntityKind::Array { elem, len } => {
                let (elem, len) = (*elem, *len);
                let new_elem = if elem == src { dst } else { elem };
                Ok(self.get_or_create_arr_type(new_elem, len))
            }
            EntityKind::Vector { elem, lanes } => {
                let (elem, lanes) = (*elem, *lanes);
                let new_elem = if elem == src { dst } else { elem };
                self.get_or_create_vec_type(new_elem, lanes)
            }
            EntityKind::FuncType { ret, params } => {
                let new_ret = ret.replaced(src, dst);
                let new_params: Vec<QualType> =
                    params.iter().map(|par| par.replaced(src, dst)).collect();
                self.get_or_create_func_type(new_ret, &new_params)
            }
            EntityKind::MemPtr { owner, member } => {
                let (owner, member) = (*owner, *member);
                let new_owner = if owner == src {
                    if !self.entity(dst).is_record_type() {
                        return Err(ModelError::TypeConstraint(
                            "replacement of a member pointer owner is not a record type".into(),
                        ));
                    }
                    dst
                } else {
                    owner
                };
                self.get_or_create_mem_ptr_type(new_owner, member.replaced(src, dst))
            }
            _ => unreachable!("not a composite type"),
        }
    }

    /// Removes every composite type with an empty use set, repeating until a
    /// fixed point.
    pub fn remove_unused_composite_types(&mut self) {
        loop {
            let dead: Vec<EntityId> = self
                .composite_types()
                .filter(|id| !self.entity(*id).has_uses())
                .collect();
            if dead.is_empty() {
                break;
            }

            trace!(count = dead.len(), "removing unused composite types");
            for id in dead {
                self.detach_composite(id);
                self.release_entity_refs(id)
                    .expect("composite use bookkeeping out of sync");
                self.release(id);
            }
        }
    }

    /// Removes a type. Composite types are removed from their interning
    /// map; declared types are removed from their parent context. The type
    /// must have no uses.
    pub fn remove_type(&mut self, ty: EntityId) -> Result<()> {
        if self.entity(ty).has_uses() {
            return Err(ModelError::UseInvariant(format!(
                "can't remove type {ty:?} with uses"
            )));
        }

        if self.entity(ty).is_composite_type() {
            self.detach_composite(ty);
            self.release_entity_refs(ty)?;
            self.release(ty);
            return Ok(());
        }

        if matches!(self.entity(ty).kind(), EntityKind::Unresolved { .. }) {
            self.release(ty);
            return Ok(());
        }
        if self.entity(ty).parent().is_some() {
            return self.remove_entity(ty);
        }
        Err(ModelError::UseInvariant(format!(
            "don't know how to remove type {ty:?}"
        )))
    }

    fn detach_composite(&mut self, id: EntityId) {
        enum MapKey {
            Ptr(QualType),
            LvalueRef(QualType),
            RvalueRef(QualType),
            Arr(EntityId, u64),
            Vec(EntityId, u64),
            Func(FuncTypeKey),
            MemPtr(EntityId, QualType),
        }

        let key = match self.entity(id).kind() {
            EntityKind::Pointer { pointee } => MapKey::Ptr(*pointee),
            EntityKind::LvalueRef { pointee } => MapKey::LvalueRef(*pointee),
            EntityKind::RvalueRef { pointee } => MapKey::RvalueRef(*pointee),
            EntityKind::Array { elem, len } => MapKey::Arr(*elem, *len),
            EntityKind::Vector { elem, lanes } => MapKey::Vec(*elem, *lanes),
            EntityKind::FuncType { ret, params } => MapKey::Func(FuncTypeKey {
                ret: *ret,
                params: params.clone(),
            }),
            EntityKind::MemPtr { owner, member } => MapKey::MemPtr(*owner, *member),
            _ => unreachable!("not a composite type"),
        };

        match key {
            MapKey::Ptr(key) => {
                self.ptr_types.remove(&key);
            }
            MapKey::LvalueRef(key) => {
                self.lvalue_ref_types.remove(&key);
            }
            MapKey::RvalueRef(key) => {
                self.rvalue_ref_types.remove(&key);
            }
            MapKey::Arr(elem, len) => {
                self.arr_types.remove(&(elem, len));
            }
            MapKey::Vec(elem, lanes) => {
                self.vec_types.remove(&(elem, lanes));
            }
            MapKey::Func(key) => {
                self.func_types.remove(&key);
            }
            MapKey::MemPtr(owner, member) => {
                self.mem_ptr_types.remove(&(owner, member));
            }
        }
    }

    //////////////////////////////////////////////////////////////////////
    // Entity removal plumbing

    /// Outgoing use edges an entity holds, mirroring every use registered at
    /// construction or assignment time.
    pub(crate) fn outgoing_uses(&self, id: EntityId) -> Vec<(EntityId, UseRole)> {
        let ent = self.entity(id);
        let mut out = Vec::new();

        match ent.kind() {
            EntityKind::Pointer { pointee }
            | EntityKind::LvalueRef { pointee }
            | EntityKind::RvalueRef { pointee } => out.push((pointee.ty, UseRole::Pointee)),
            EntityKind::Array { elem, .. } | EntityKind::Vector { elem, .. } => {
                out.push((*elem, UseRole::ArrayElem));
            }
            EntityKind::FuncType { ret, params } => {
                out.push((ret.ty, UseRole::FuncReturn));
                for par in params {
                    out.push((par.ty, UseRole::FuncParamType));
                }
            }
            EntityKind::MemPtr { owner, member } => {
                out.push((*owner, UseRole::MemberOwner));
                out.push((member.ty, UseRole::MemberType));
            }
            EntityKind::Typedef { aliased } => out.push((aliased.ty, UseRole::TypedefAliased)),
            EntityKind::Enum(data) => out.push((data.underlying, UseRole::EnumUnderlying)),
            EntityKind::Variable { ty }
            | EntityKind::Field { ty, .. }
            | EntityKind::Param { ty }
            | EntityKind::TemplateParam(TemplateParamKind::Value { ty }) => {
                out.push((ty.ty, UseRole::VarType));
            }
            EntityKind::TemplateArg(TemplateArgData::Type(qt)) => {
                out.push((qt.ty, UseRole::TemplateArg));
            }
            EntityKind::Substitution(data) => out.push((data.template, UseRole::SubstTemplate)),
            EntityKind::PartialSpec(data) => out.push((data.template, UseRole::SubstTemplate)),
            _ => {}
        }

        if let Some(rec) = ent.record_data() {
            for base in rec.bases() {
                out.push((*base, UseRole::RecordBase));
            }
        }
        if let Some(func) = ent.function_data() {
            if let Some(ret) = func.ret_type() {
                out.push((ret.ty, UseRole::ReturnType));
            }
        }

        out
    }

    pub(crate) fn release_entity_refs(&mut self, id: EntityId) -> Result<()> {
        for (target, role) in self.outgoing_uses(id) {
            if self.is_alive(target) {
                self.remove_use(target, id, role)?;
            }
        }
        Ok(())
    }

    /// Removes the separately-owned parts of an entity: function parameters
    /// and substitution arguments. Context children are the caller's
    /// responsibility.
    pub(crate) fn remove_owned_parts(&mut self, id: EntityId) -> Result<()> {
        if self.entity(id).function_data().is_some() {
            let params = std::mem::take(&mut self.func_data_mut(id).params);
            for par in params {
                self.release_entity_refs(par)?;
                self.release(par);
            }
        }

        let args = match &mut self.entity_mut(id).kind {
            EntityKind::Substitution(data) => std::mem::take(&mut data.args),
            EntityKind::PartialSpec(data) => std::mem::take(&mut data.args),
            _ => Vec::new(),
        };
        for arg in args {
            self.release_entity_refs(arg)?;
            self.release(arg);
        }

        Ok(())
    }

    /// Unlinks an entity from whatever owns it: its parent context's lists,
    /// a parent namespace map, a template's substitution map, or a
    /// function's parameter list.
    pub(crate) fn detach_from_owner(&mut self, id: EntityId) -> Result<()> {
        // Substitutions and partial specializations also appear in their
        // template's own bookkeeping.
        match &self.entity(id).kind {
            EntityKind::Substitution(data) => {
                let templ = data.template;
                if self.is_alive(templ) {
                    self.templ_data_mut(templ).substs.retain(|_, cur| *cur != id);
                }
            }
            EntityKind::PartialSpec(data) => {
                let templ = data.template;
                if self.is_alive(templ) {
                    let specs = &mut self.templ_data_mut(templ).partial_specs;
                    specs.retain(|cur| *cur != id);
                }
            }
            _ => {}
        }

        let Some(parent) = self.entity(id).parent() else {
            return Ok(());
        };
        if !self.is_alive(parent) {
            return Ok(());
        }

        if matches!(self.entity(id).kind, EntityKind::Namespace(_)) {
            return self.remove_namespace(parent, id);
        }

        if matches!(self.entity(id).kind, EntityKind::Param { .. }) {
            self.func_data_mut(parent).params.retain(|cur| *cur != id);
            return Ok(());
        }

        if matches!(self.entity(id).kind, EntityKind::TemplateArg(_)) {
            match &mut self.entity_mut(parent).kind {
                EntityKind::Substitution(data) => data.args.retain(|cur| *cur != id),
                EntityKind::PartialSpec(data) => data.args.retain(|cur| *cur != id),
                _ => {}
            }
            return Ok(());
        }

        // Template parameters also sit in their owner's parameter list.
        if matches!(self.entity(id).kind, EntityKind::TemplateParam(_)) {
            match &mut self.entity_mut(parent).kind {
                EntityKind::Template(data) => data.params.retain(|cur| *cur != id),
                EntityKind::PartialSpec(data) => data.params.retain(|cur| *cur != id),
                _ => {}
            }
        }

        let name = self.entity(id).name.clone();
        if let Some(ctx) = self.entity_mut(parent).context_data_mut() {
            if ctx.entities.contains(&id) {
                ctx.remove(id, name.as_deref())?;
            }
        }
        if let Some(rec) = self.entity_mut(parent).record_data_mut() {
            rec.access.remove(&id);
        }
        Ok(())
    }

    /// Recursively removes an entity together with everything that uses it:
    /// owned children are removed, users are unwound (a function using the
    /// entity as its return type merely clears the return type), and the
    /// entity itself is released.
    pub fn remove_entity_and_uses(&mut self, ent: EntityId) -> Result<()> {
        // Owned children first.
        while let Some(child) = self
            .entity(ent)
            .context_data()
            .and_then(|ctx| ctx.entities.first().copied())
        {
            self.remove_entity_and_uses(child)?;
        }
        while let Some(nested) = self
            .entity(ent)
            .namespace_data()
            .and_then(|ns| ns.namespaces.values().next().copied())
        {
            self.remove_entity_and_uses(nested)?;
        }

        // Unwind users.
        while let Some(u) = self.entity(ent).uses().first().copied() {
            if u.role == UseRole::ReturnType {
                self.set_ret_type(u.user, None)?;
            } else {
                self.remove_entity_and_uses(u.user)?;
            }
        }

        self.remove_owned_parts(ent)?;
        self.release_entity_refs(ent)?;
        if self.entity(ent).is_composite_type() {
            self.detach_composite(ent);
        } else {
            self.detach_from_owner(ent)?;
        }
        self.release(ent);
        Ok(())
    }

    //////////////////////////////////////////////////////////////////////
    // Source files

    /// Gets an existing source file with the given path or interns a new
    /// one.
    pub fn source(&mut self, path: impl Into<PathBuf>) -> SourceFileId {
        let path = path.into();
        if let Some(existing) = self.source_ids.get(&path) {
            return *existing;
        }
        let id = SourceFileId(u32::try_from(self.sources.len()).expect("source arena overflow"));
        self.sources.push(SourceFile::new(path.clone()));
        self.source_ids.insert(path, id);
        id
    }

    /// Searches for an existing source file. With `by_name`, a bare file
    /// name also matches interned paths by their file name.
    pub fn find_source(&self, path: &Path, by_name: bool) -> Option<SourceFileId> {
        if let Some(id) = self.source_ids.get(path) {
            return Some(*id);
        }
        if !by_name || path.file_name().map(Path::new) != Some(path) {
            return None;
        }

        self.sources
            .iter()
            .position(|src| src.path().file_name() == path.file_name())
            .map(|pos| SourceFileId(pos as u32))
    }

    pub fn source_file(&self, id: SourceFileId) -> &SourceFile {
        &self.sources[id.index()]
    }

    //////////////////////////////////////////////////////////////////////
    // Consistency checking

    /// Verifies the graph invariants: use symmetry, composite-key
    /// uniqueness, ownership closure from the root, and substitution-key
    /// consistency.
    pub fn check_consistency(&self) -> Result<()> {
        let alive: Vec<EntityId> = (0..self.entities.len())
            .map(|i| EntityId(i as u32))
            .filter(|id| self.is_alive(*id))
            .collect();

        // Use symmetry: the stored incoming multisets must match the edges
        // implied by every entity's payload.
        let mut expected: FxHashMap<EntityId, Vec<Use>> = FxHashMap::default();
        for id in &alive {
            for (target, role) in self.outgoing_uses(*id) {
                expected
                    .entry(target)
                    .or_default()
                    .push(Use { user: *id, role });
            }
        }
        for id in &alive {
            let mut actual: Vec<Use> = self.entity(*id).uses().to_vec();
            let mut wanted: Vec<Use> = expected.remove(id).unwrap_or_default();
            let sort_key = |u: &Use| (u.user, u.role as u32);
            actual.sort_by_key(sort_key);
            wanted.sort_by_key(sort_key);
            if actual != wanted {
                return Err(ModelError::UseInvariant(format!(
                    "use set of {id:?} out of sync: stored {actual:?}, expected {wanted:?}"
                )));
            }
        }
        if let Some((target, _)) = expected.iter().next() {
            return Err(ModelError::UseInvariant(format!(
                "use edges point at dead entity {target:?}"
            )));
        }

        // Composite uniqueness: each interning key maps to a live entity
        // whose payload still matches the key.
        for id in self.composite_types() {
            if !self.is_alive(id) {
                return Err(ModelError::UseInvariant(format!(
                    "composite map entry {id:?} is dead"
                )));
            }
        }

        // Substitution keys match their argument lists.
        for id in &alive {
            if self.entity(*id).template_data().is_some() {
                for (key, subst) in &self.templ_data(*id).substs {
                    if self.subst_key_of(*subst) != *key {
                        return Err(ModelError::UseInvariant(format!(
                            "substitution {subst:?} key out of sync"
                        )));
                    }
                }
            }
        }

        // Ownership closure: everything live must be reachable from the
        // root or owned by the model itself.
        let mut owned = vec![false; self.entities.len()];
        self.mark_owned(self.root, &mut owned);
        for id in self.composite_types() {
            owned[id.index()] = true;
        }
        for id in &self.builtins {
            owned[id.index()] = true;
        }
        self.mark_owned(self.opaque, &mut owned);
        for id in &alive {
            // Builder placeholders are transient and owned by nothing until
            // build finalization removes them.
            if matches!(self.entity(*id).kind, EntityKind::Unresolved { .. }) {
                owned[id.index()] = true;
            }
            if !owned[id.index()] {
                return Err(ModelError::UseInvariant(format!(
                    "entity {id:?} is not owned by any context"
                )));
            }
        }

        Ok(())
    }

    fn mark_owned(&self, id: EntityId, owned: &mut [bool]) {
        if owned[id.index()] {
            return;
        }
        owned[id.index()] = true;

        let ent = self.entity(id);
        if let Some(ctx) = ent.context_data() {
            for child in &ctx.entities {
                self.mark_owned(*child, owned);
            }
        }
        if let Some(ns) = ent.namespace_data() {
            for nested in ns.namespaces.values() {
                self.mark_owned(*nested, owned);
            }
        }
        if let Some(func) = ent.function_data() {
            for par in func.params() {
                self.mark_owned(*par, owned);
            }
        }
        match &ent.kind {
            EntityKind::Substitution(data) => {
                for arg in &data.args {
                    self.mark_owned(*arg, owned);
                }
            }
            EntityKind::PartialSpec(data) => {
                for arg in &data.args {
                    self.mark_owned(*arg, owned);
                }
            }
            _ => {}
        }
    }
}

impl Default for CodeModel {
    fn default() -> Self {
        Self::new()
    }
}
