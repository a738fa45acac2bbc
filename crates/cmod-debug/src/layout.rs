//! Default record layout: compact, bit-granular.

use crate::{DebugInfo, TypeDebugInfo};
use cmod_core::{CodeModel, EntityId, ModelError, QualType, RecordKind, Result};
use tracing::trace;

/// Bit offsets of a record's bases and fields, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RecordLayout {
    base_offsets: Vec<u64>,
    field_offsets: Vec<u64>,
}

impl RecordLayout {
    /// Bit offsets of base records, in declaration order.
    pub fn base_offsets(&self) -> &[u64] {
        &self.base_offsets
    }

    /// Bit offsets of fields, in declaration order.
    pub fn field_offsets(&self) -> &[u64] {
        &self.field_offsets
    }
}

impl DebugInfo {
    /// Computes the default compact layout of a record and records it.
    ///
    /// Bases are placed back to back in declaration order. Non-bitfield
    /// fields are byte aligned; bitfields pack at the current bit offset.
    /// The record size is the total rounded up to whole bytes, at least 1.
    /// Layouts of base and field record types missing from the table are
    /// computed recursively when `recursive` is set; otherwise they are a
    /// precondition failure.
    pub fn make_default_record_layout(
        &mut self,
        model: &CodeModel,
        rec: EntityId,
        recursive: bool,
    ) -> Result<()> {
        trace!(?rec, "computing default record layout");

        let mut layout = RecordLayout::default();
        let mut bits: u64 = 0;

        if model.record_kind(rec) != RecordKind::Union {
            for base in model.base_records(rec).collect::<Vec<_>>() {
                self.ensure_record_layout(model, base, recursive)?;
                layout.base_offsets.push(bits);
                bits += self.type_size(model, QualType::unqual(base))? * 8;
            }

            for field in model.fields(rec).collect::<Vec<_>>() {
                let field_ty = model.var_type(field);
                self.ensure_field_type_layout(model, field_ty, recursive)?;

                let width = model.field_bit_width(field);
                if width == 0 {
                    if bits % 8 != 0 {
                        bits += 8 - bits % 8;
                    }
                    layout.field_offsets.push(bits);
                    bits += self.type_size(model, field_ty)? * 8;
                } else {
                    layout.field_offsets.push(bits);
                    bits += u64::from(width);
                }
            }
        } else {
            if !model.bases(rec).is_empty() {
                return Err(ModelError::LayoutPrecondition(
                    "union should not have base classes".into(),
                ));
            }

            for field in model.fields(rec).collect::<Vec<_>>() {
                let field_ty = model.var_type(field);
                self.ensure_field_type_layout(model, field_ty, recursive)?;
                layout.field_offsets.push(0);
                bits = bits.max(self.type_size(model, field_ty)? * 8);
            }
        }

        let size = (bits / 8 + u64::from(bits % 8 != 0)).max(1);
        self.insert_type_info(rec, TypeDebugInfo::with_layout(size, layout));
        Ok(())
    }

    fn ensure_record_layout(
        &mut self,
        model: &CodeModel,
        rec: EntityId,
        recursive: bool,
    ) -> Result<()> {
        if self.type_info(rec).is_some() {
            return Ok(());
        }
        if !recursive {
            return Err(ModelError::LayoutPrecondition(format!(
                "layout for record {rec:?} does not exist"
            )));
        }
        self.make_default_record_layout(model, rec, true)
    }

    fn ensure_field_type_layout(
        &mut self,
        model: &CodeModel,
        field_ty: QualType,
        recursive: bool,
    ) -> Result<()> {
        let underlying = model.untypedef(field_ty.ty);
        if model.entity(underlying).is_record_type() {
            self.ensure_record_layout(model, underlying, recursive)?;
        }
        Ok(())
    }
}
