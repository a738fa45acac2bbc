//! Searching fields in record types.

use crate::DebugInfo;
use cmod_core::{CodeModel, EntityId};

/// Searches for a field with the given name in a record type, descending
/// into anonymous record members and, when `check_bases` is set, into base
/// records. Returns the field and its bit offset accumulated from the
/// record layouts.
///
/// When debug info is supplied, the record must have a computed layout;
/// otherwise all offsets are 0.
pub fn find_field(
    model: &CodeModel,
    dbg: Option<&DebugInfo>,
    rec: EntityId,
    name: &str,
    check_bases: bool,
) -> Option<(EntityId, u64)> {
    let layout = match dbg {
        Some(dbg) => Some(dbg.record_layout(rec)?),
        None => None,
    };

    for (idx, field) in model.fields(rec).enumerate() {
        let field_name = model.entity(field).name().unwrap_or("");
        if field_name == name {
            let offs = layout.map(|l| l.field_offsets()[idx]).unwrap_or(0);
            return Some((field, offs));
        }

        if field_name.is_empty() {
            // An anonymous member: look for the field inside it.
            let member_rec = model.untypedef(model.var_type(field).ty);
            if !model.entity(member_rec).is_record_type() {
                continue;
            }
            if let Some((found, offs)) = find_field(model, dbg, member_rec, name, true) {
                let member_offs = layout.map(|l| l.field_offsets()[idx]).unwrap_or(0);
                return Some((found, member_offs + offs));
            }
        }
    }

    if check_bases {
        for (idx, base) in model.base_records(rec).enumerate() {
            let Some((found, offs)) = find_field(model, dbg, base, name, true) else {
                continue;
            };
            let base_offs = layout.map(|l| l.base_offsets()[idx]).unwrap_or(0);
            return Some((found, base_offs + offs));
        }
    }

    None
}
