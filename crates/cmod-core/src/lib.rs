//! Code model core for the cmod library.
//!
//! This crate provides:
//! - `CodeModel` - The entity arena, builtin types, and composite type interning
//! - `Entity` / `EntityId` - The common node representation and its use graph
//! - Contexts with named lookup (namespaces, records, functions, templates)
//! - The template model (parameters, arguments, substitutions)
//! - Text dumping of the model contents

mod context;
mod dump;
mod entity;
mod error;
mod function;
mod model;
mod namespace;
mod record;
mod source;
mod template;
mod types;

#[cfg(test)]
mod tests;

pub use context::ContextData;
pub use dump::DumpOptions;
pub use entity::{Entity, EntityId, EntityKind, Use, UseRole};
pub use error::{ModelError, Result};
pub use function::FunctionData;
pub use model::CodeModel;
pub use namespace::NamespaceData;
pub use record::{AccessLevel, RecordData, RecordKind};
pub use source::{SourceFile, SourceFileId, SourceLocation};
pub use template::{
    ArgKey, PartialSpecData, SubstData, SubstKey, SubstKind, TemplateArgData, TemplateArgDesc,
    TemplateBody, TemplateData, TemplateParamKind,
};
pub use types::{BuiltinKind, EnumData, EnumItem, FuncTypeKey, QualType, Quals};
