//! Text dumping of code model contents.
//!
//! The exact textual form is not contractual; the iteration order (insertion
//! order everywhere) and the naming are.

use crate::entity::{EntityId, EntityKind};
use crate::model::CodeModel;
use crate::template::{SubstKind, TemplateArgData, TemplateBody};
use crate::types::QualType;
use std::fmt::Write;

/// Options for dumping entities.
#[derive(Clone, Copy, Debug, Default)]
pub struct DumpOptions {
    /// Include builtin entities.
    pub builtins: bool,
    /// Append source locations to declarations.
    pub locations: bool,
}

impl CodeModel {
    /// Dumps the whole model to a string.
    pub fn dump_to_string(&self, opts: DumpOptions) -> String {
        let mut out = String::new();
        self.dump_namespace_entities(self.root(), opts, 0, &mut out);
        out
    }

    /// One-line description of an entity.
    pub fn desc(&self, id: EntityId) -> String {
        let mut out = String::new();
        self.print_desc(id, &mut out);
        out
    }

    /// One-line description of a qualified type.
    pub fn qual_type_desc(&self, qt: QualType) -> String {
        let mut out = String::new();
        self.print_qual_type(qt, &mut out);
        out
    }

    fn print_qual_type(&self, qt: QualType, out: &mut String) {
        self.print_desc(qt.ty, out);
        if qt.is_const() {
            out.push_str(" const");
        }
        if qt.is_volatile() {
            out.push_str(" volatile");
        }
    }

    fn print_desc(&self, id: EntityId, out: &mut String) {
        let ent = self.entity(id);
        match ent.kind() {
            EntityKind::Builtin(kind) => out.push_str(kind.name()),
            EntityKind::Pointer { pointee } => {
                self.print_qual_type(*pointee, out);
                out.push_str(" *");
            }
            EntityKind::LvalueRef { pointee } => {
                self.print_qual_type(*pointee, out);
                out.push_str(" &");
            }
            EntityKind::RvalueRef { pointee } => {
                self.print_qual_type(*pointee, out);
                out.push_str(" &&");
            }
            EntityKind::Array { elem, len } => {
                self.print_desc(*elem, out);
                let _ = write!(out, "[{len}]");
            }
            EntityKind::Vector { elem, lanes } => {
                self.print_desc(*elem, out);
                let _ = write!(out, "<{lanes}>");
            }
            EntityKind::FuncType { ret, params } => {
                self.print_qual_type(*ret, out);
                out.push_str(" (");
                for (i, par) in params.iter().enumerate() {
                    if i != 0 {
                        out.push_str(", ");
                    }
                    self.print_qual_type(*par, out);
                }
                out.push(')');
            }
            EntityKind::MemPtr { owner, member } => {
                self.print_desc(*owner, out);
                out.push_str("::");
                self.print_qual_type(*member, out);
            }
            EntityKind::Record(_) => match ent.name() {
                Some(name) => out.push_str(name),
                None => out.push_str("(unnamed record)"),
            },
            EntityKind::Typedef { .. } => out.push_str(ent.name().unwrap_or("(typedef)")),
            EntityKind::Enum(_) => {
                out.push_str("enum ");
                out.push_str(ent.name().unwrap_or(""));
            }
            EntityKind::Decltype => out.push_str("decltype()"),
            EntityKind::DependentName => out.push_str("dependent_type"),
            EntityKind::Unresolved { ref_id } => {
                let _ = write!(out, "typeref({ref_id})");
            }
            EntityKind::TemplateParam(_) => out.push_str(ent.name().unwrap_or("(param)")),
            EntityKind::TemplateThis { template } => {
                out.push_str(self.entity(*template).name().unwrap_or("(template)"));
            }
            EntityKind::Namespace(_) => {
                out.push_str("namespace ");
                out.push_str(ent.name().unwrap_or(""));
            }
            EntityKind::Variable { .. } | EntityKind::Field { .. } => {
                out.push_str(ent.name().unwrap_or(""));
            }
            EntityKind::Param { .. } => {
                out.push_str(ent.name().unwrap_or("(unnamed parameter)"));
            }
            EntityKind::Function(_) => {
                out.push_str(ent.name().unwrap_or("(unnamed function)"));
            }
            EntityKind::Template(data) => {
                out.push_str(ent.name().unwrap_or(""));
                out.push('<');
                for (i, par) in data.params().iter().enumerate() {
                    if i != 0 {
                        out.push_str(", ");
                    }
                    self.print_desc(*par, out);
                }
                out.push('>');
            }
            EntityKind::Substitution(data) => {
                out.push_str(self.entity(data.template()).name().unwrap_or(""));
                self.print_args(&data.args, out);
            }
            EntityKind::PartialSpec(data) => {
                out.push_str(self.entity(data.template()).name().unwrap_or(""));
                self.print_args(&data.args, out);
            }
            EntityKind::TemplateArg(arg) => match arg {
                TemplateArgData::Type(qt) => self.print_qual_type(*qt, out),
                TemplateArgData::Value(text) => out.push_str(text),
            },
        }
    }

    fn print_args(&self, args: &[EntityId], out: &mut String) {
        out.push('<');
        for (i, arg) in args.iter().enumerate() {
            if i != 0 {
                out.push_str(", ");
            }
            self.print_desc(*arg, out);
        }
        out.push('>');
    }

    fn print_indent(out: &mut String, indent: usize) {
        for _ in 0..indent * 4 {
            out.push(' ');
        }
    }

    fn print_loc(&self, id: EntityId, opts: DumpOptions, out: &mut String) {
        if !opts.locations {
            return;
        }
        let loc = self.entity(id).loc();
        if let Some(file) = loc.file {
            let _ = write!(
                out,
                " @ {}:{}:{}",
                self.source_file(file).path().display(),
                loc.line,
                loc.column
            );
        }
    }

    fn dump_namespace_entities(
        &self,
        ns: EntityId,
        opts: DumpOptions,
        indent: usize,
        out: &mut String,
    ) {
        for nested in self.namespaces(ns) {
            self.dump_entity(nested, opts, indent, out);
        }
        self.dump_ctx_entities(ns, opts, indent, out);
    }

    fn dump_ctx_entities(&self, ctx: EntityId, opts: DumpOptions, indent: usize, out: &mut String) {
        for id in self.entities(ctx) {
            let ent = self.entity(*id);
            if ent.is_builtin() && !opts.builtins {
                continue;
            }
            // Placeholder types and template parameters carry no
            // declarations of their own.
            if matches!(
                ent.kind(),
                EntityKind::Decltype | EntityKind::DependentName | EntityKind::TemplateParam(_)
            ) {
                continue;
            }
            self.dump_entity(*id, opts, indent, out);
        }
    }

    /// Dumps one entity, recursing into context contents.
    pub fn dump_entity(&self, id: EntityId, opts: DumpOptions, indent: usize, out: &mut String) {
        let ent = self.entity(id);
        match ent.kind() {
            EntityKind::Namespace(_) => {
                Self::print_indent(out, indent);
                self.print_desc(id, out);
                if ent.name().is_some_and(|name| !name.is_empty()) {
                    out.push(' ');
                }
                out.push_str("{\n");
                self.dump_namespace_entities(id, opts, indent + 1, out);
                Self::print_indent(out, indent);
                out.push_str("}\n");
            }
            EntityKind::Record(data) => {
                Self::print_indent(out, indent);
                out.push_str(data.kind().name());
                out.push(' ');
                self.print_desc(id, out);
                self.print_loc(id, opts, out);
                out.push_str(" {\n");
                self.dump_ctx_entities(id, opts, indent + 1, out);
                Self::print_indent(out, indent);
                out.push_str("}\n");
            }
            EntityKind::Template(data) => {
                Self::print_indent(out, indent);
                match &data.body {
                    TemplateBody::Record(rec) => {
                        out.push_str("template ");
                        out.push_str(rec.kind().name());
                        out.push(' ');
                        self.print_desc(id, out);
                        out.push_str(" {\n");
                        self.dump_ctx_entities(id, opts, indent + 1, out);
                        Self::print_indent(out, indent);
                        out.push_str("}\n");
                    }
                    TemplateBody::Function(_) => {
                        out.push_str("template func ");
                        self.print_desc(id, out);
                        self.dump_signature(id, out);
                        out.push_str(";\n");
                    }
                }
            }
            EntityKind::Substitution(data) => {
                Self::print_indent(out, indent);
                let label = match data.kind() {
                    SubstKind::Instantiation => "template_instantiation",
                    SubstKind::Specialization => "template_specialization",
                    SubstKind::DependentInstantiation => "template_dependent_instantiation",
                };
                out.push_str(label);
                out.push(' ');
                match &data.body {
                    Some(TemplateBody::Record(rec)) => {
                        out.push_str(rec.kind().name());
                        out.push(' ');
                        self.print_desc(id, out);
                        out.push_str(" {\n");
                        self.dump_ctx_entities(id, opts, indent + 1, out);
                        Self::print_indent(out, indent);
                        out.push_str("}\n");
                    }
                    Some(TemplateBody::Function(_)) => {
                        out.push_str("func ");
                        self.print_desc(id, out);
                        self.dump_signature(id, out);
                        out.push_str(";\n");
                    }
                    None => {
                        self.print_desc(id, out);
                        out.push_str(";\n");
                    }
                }
            }
            EntityKind::PartialSpec(_) => {
                Self::print_indent(out, indent);
                out.push_str("template_partial_specialization ");
                self.print_desc(id, out);
                out.push_str(" {\n");
                self.dump_ctx_entities(id, opts, indent + 1, out);
                Self::print_indent(out, indent);
                out.push_str("}\n");
            }
            EntityKind::Field { ty, .. } => {
                Self::print_indent(out, indent);
                out.push_str("field ");
                self.print_desc(id, out);
                out.push_str(": ");
                self.print_qual_type(*ty, out);
                let width = self.field_bit_width(id);
                if width != 0 {
                    let _ = write!(out, ": {width}");
                }
                self.print_loc(id, opts, out);
                out.push_str(";\n");
            }
            EntityKind::Variable { ty } => {
                Self::print_indent(out, indent);
                out.push_str("var ");
                self.print_desc(id, out);
                out.push_str(": ");
                self.print_qual_type(*ty, out);
                self.print_loc(id, opts, out);
                out.push_str(";\n");
            }
            EntityKind::Function(data) => {
                Self::print_indent(out, indent);
                out.push_str(if data.is_method() { "method " } else { "func " });
                self.print_desc(id, out);
                self.dump_signature(id, out);
                self.print_loc(id, opts, out);
                out.push_str(";\n");
            }
            EntityKind::Typedef { aliased } => {
                Self::print_indent(out, indent);
                out.push_str("typedef ");
                self.print_desc(id, out);
                out.push_str(" = ");
                self.print_qual_type(*aliased, out);
                out.push_str(";\n");
            }
            EntityKind::Enum(data) => {
                Self::print_indent(out, indent);
                self.print_desc(id, out);
                out.push_str(" {\n");
                for item in data.items() {
                    Self::print_indent(out, indent + 1);
                    let _ = write!(out, "{} = {},\n", item.name, item.value);
                }
                Self::print_indent(out, indent);
                out.push_str("}\n");
            }
            _ => {
                Self::print_indent(out, indent);
                self.print_desc(id, out);
                out.push('\n');
            }
        }
    }

    fn dump_signature(&self, func: EntityId, out: &mut String) {
        out.push('(');
        for (i, par) in self.params(func).iter().enumerate() {
            if i != 0 {
                out.push_str(", ");
            }
            if let Some(name) = self.entity(*par).name() {
                out.push_str(name);
                out.push_str(": ");
            }
            self.print_qual_type(self.param_type(*par), out);
        }
        out.push(')');
        if let Some(ret) = self.ret_type(func) {
            out.push_str(" -> ");
            self.print_qual_type(ret, out);
        }
    }
}
