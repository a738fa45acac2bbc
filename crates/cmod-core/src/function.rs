//! Functions and their parameters.

use crate::context::ContextData;
use crate::entity::{EntityId, EntityKind, UseRole};
use crate::error::{ModelError, Result};
use crate::model::CodeModel;
use crate::types::QualType;

/// Payload of a function declaration: optional return type, ordered
/// parameter entities, and a nested entity context.
#[derive(Debug)]
pub struct FunctionData {
    pub(crate) ctx: ContextData,
    pub(crate) ret: Option<QualType>,
    pub(crate) params: Vec<EntityId>,
    pub(crate) method: bool,
}

impl FunctionData {
    pub(crate) fn new() -> Self {
        Self {
            ctx: ContextData::new(),
            ret: None,
            params: Vec::new(),
            method: false,
        }
    }

    pub(crate) fn new_method() -> Self {
        Self {
            method: true,
            ..Self::new()
        }
    }

    pub fn ret_type(&self) -> Option<QualType> {
        self.ret
    }

    /// Parameter entities, in declaration order.
    pub fn params(&self) -> &[EntityId] {
        &self.params
    }

    /// True for instance methods of a record.
    pub fn is_method(&self) -> bool {
        self.method
    }
}

impl CodeModel {
    /// Return type of a function, or `None` if not set.
    pub fn ret_type(&self, func: EntityId) -> Option<QualType> {
        self.func_data(func).ret
    }

    /// Sets the function return type, removing the use of the previous
    /// return type and adding a use of the new one. The return type may not
    /// itself be a function type.
    pub fn set_ret_type(&mut self, func: EntityId, ret: Option<QualType>) -> Result<()> {
        if let Some(ret) = ret {
            if matches!(self.entity(ret.ty).kind, EntityKind::FuncType { .. }) {
                return Err(ModelError::TypeConstraint(
                    "function return type can't be a function type".into(),
                ));
            }
        }

        if let Some(old) = self.func_data(func).ret {
            self.remove_use(old.ty, func, UseRole::ReturnType)?;
        }
        self.func_data_mut(func).ret = ret;
        if let Some(new) = ret {
            self.add_use(new.ty, func, UseRole::ReturnType);
        }
        Ok(())
    }

    /// Parameter entities of a function, in declaration order.
    pub fn params(&self, func: EntityId) -> &[EntityId] {
        &self.func_data(func).params
    }

    /// Adds an anonymous parameter with the given type.
    pub fn add_param(&mut self, func: EntityId, ty: QualType) -> EntityId {
        self.add_param_impl(func, None, ty)
    }

    /// Adds a named parameter with the given type.
    pub fn add_named_param(&mut self, func: EntityId, name: &str, ty: QualType) -> EntityId {
        self.add_param_impl(func, Some(name), ty)
    }

    fn add_param_impl(&mut self, func: EntityId, name: Option<&str>, ty: QualType) -> EntityId {
        let id = self.alloc(crate::entity::Entity::new(
            EntityKind::Param { ty },
            Some(func),
            name.map(str::to_string),
        ));
        self.add_use(ty.ty, id, UseRole::VarType);
        self.func_data_mut(func).params.push(id);
        id
    }

    /// Removes a parameter from its function. The parameter must have no
    /// uses.
    pub fn remove_param(&mut self, func: EntityId, param: EntityId) -> Result<()> {
        if self.entity(param).has_uses() {
            return Err(ModelError::UseInvariant(format!(
                "can't remove parameter {param:?} with uses"
            )));
        }

        let pos = self
            .func_data(func)
            .params
            .iter()
            .position(|cur| *cur == param)
            .ok_or_else(|| {
                ModelError::UseInvariant(format!("parameter {param:?} not found in function"))
            })?;
        self.func_data_mut(func).params.remove(pos);
        self.release_entity_refs(param)?;
        self.release(param);
        Ok(())
    }

    /// Parameter type of a parameter entity.
    pub fn param_type(&self, param: EntityId) -> QualType {
        match &self.entity(param).kind {
            EntityKind::Param { ty } => *ty,
            _ => panic!("entity is not a function parameter"),
        }
    }

    pub(crate) fn func_data(&self, func: EntityId) -> &FunctionData {
        self.entity(func)
            .function_data()
            .expect("entity is not a function")
    }

    pub(crate) fn func_data_mut(&mut self, func: EntityId) -> &mut FunctionData {
        self.entity_mut(func)
            .function_data_mut()
            .expect("entity is not a function")
    }
}
