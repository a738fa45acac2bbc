use crate::DebugInfo;
use cmod_core::{AccessLevel, BuiltinKind, CodeModel, ModelError, QualType, RecordKind};

#[test]
fn test_default_layout() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let rec = cm.create_record(root, RecordKind::Struct);
    cm.create_field(rec, "var1", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    cm.create_field(rec, "var2", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    assert_eq!(dbg.type_size(&cm, QualType::unqual(rec)).unwrap(), 8);
    let layout = dbg.record_layout(rec).unwrap();
    assert_eq!(layout.field_offsets(), &[0, 32]);
}

#[test]
fn test_default_recursive_layout() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let fld_type = cm.create_named_record(root, "TTTT", RecordKind::Struct);
    cm.create_field(fld_type, "x", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    let td = cm.create_typedef(root, "my_td", fld_type.into());

    let rec = cm.create_record(root, RecordKind::Struct);
    cm.create_field(rec, "var1", td.into(), AccessLevel::Public, 0)
        .unwrap();
    cm.create_field(rec, "var2", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    assert_eq!(dbg.type_size(&cm, QualType::unqual(rec)).unwrap(), 8);
    let layout = dbg.record_layout(rec).unwrap();
    assert_eq!(layout.field_offsets(), &[0, 32]);
    // The field's record type got a layout of its own along the way.
    assert!(dbg.record_layout(fld_type).is_some());
}

#[test]
fn test_default_layout_bases() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);
    let float_t = cm.builtin(BuiltinKind::Float);
    let double_t = cm.builtin(BuiltinKind::Double);

    let base1 = cm.create_named_record(root, "base1", RecordKind::Struct);
    cm.create_field(base1, "var1", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    cm.create_field(base1, "var2", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let base2 = cm.create_named_record(root, "base2", RecordKind::Struct);
    cm.create_field(base2, "varx", float_t.into(), AccessLevel::Private, 0)
        .unwrap();

    let rec = cm.create_record(root, RecordKind::Struct);
    cm.add_base(rec, base1, AccessLevel::Public).unwrap();
    cm.add_base(rec, base2, AccessLevel::Public).unwrap();
    cm.create_field(rec, "xxx", double_t.into(), AccessLevel::Protected, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    assert_eq!(dbg.type_size(&cm, QualType::unqual(rec)).unwrap(), 20);
    let layout = dbg.record_layout(rec).unwrap();
    assert_eq!(layout.base_offsets(), &[0, 64]);
    assert_eq!(layout.field_offsets(), &[96]);
}

#[test]
fn test_layout_with_base_and_bitfields() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);
    let char_t = cm.builtin(BuiltinKind::Char);

    let base = cm.create_named_record(root, "B", RecordKind::Struct);
    cm.create_field(base, "x", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    cm.create_field(base, "y", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let rec = cm.create_named_record(root, "R", RecordKind::Struct);
    cm.add_base(rec, base, AccessLevel::Public).unwrap();
    cm.create_field(rec, "c", char_t.into(), AccessLevel::Public, 3)
        .unwrap();
    cm.create_field(rec, "d", char_t.into(), AccessLevel::Public, 5)
        .unwrap();
    cm.create_field(rec, "e", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    let layout = dbg.record_layout(rec).unwrap();
    assert_eq!(layout.base_offsets(), &[0]);
    // c packs at bit 64, d right after it at 67; e realigns to byte 9.
    assert_eq!(layout.field_offsets(), &[64, 67, 72]);
    assert_eq!(dbg.type_size(&cm, QualType::unqual(rec)).unwrap(), 13);
}

#[test]
fn test_bitfield_realignment_after_partial_byte() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let rec = cm.create_record(root, RecordKind::Struct);
    cm.create_field(rec, "a", int_t.into(), AccessLevel::Public, 3)
        .unwrap();
    cm.create_field(rec, "b", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    let layout = dbg.record_layout(rec).unwrap();
    assert_eq!(layout.field_offsets(), &[0, 8]);
    assert_eq!(dbg.type_size(&cm, QualType::unqual(rec)).unwrap(), 5);
}

#[test]
fn test_union_layout() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);
    let double_t = cm.builtin(BuiltinKind::Double);

    let rec = cm.create_record(root, RecordKind::Union);
    cm.create_field(rec, "i", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    cm.create_field(rec, "d", double_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    let layout = dbg.record_layout(rec).unwrap();
    assert_eq!(layout.field_offsets(), &[0, 0]);
    assert_eq!(dbg.type_size(&cm, QualType::unqual(rec)).unwrap(), 8);
}

#[test]
fn test_union_with_bases_rejected() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let base = cm.create_named_record(root, "base", RecordKind::Struct);
    let rec = cm.create_record(root, RecordKind::Union);
    cm.add_base(rec, base, AccessLevel::Public).unwrap();

    let mut dbg = DebugInfo::new(&cm);
    let err = dbg.make_default_record_layout(&cm, rec, true).unwrap_err();
    assert!(matches!(err, ModelError::LayoutPrecondition(_)));
}

#[test]
fn test_empty_record_has_size_one() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let rec = cm.create_record(root, RecordKind::Struct);
    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();
    assert_eq!(dbg.type_size(&cm, QualType::unqual(rec)).unwrap(), 1);
}

#[test]
fn test_non_recursive_layout_requires_base_info() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let base = cm.create_named_record(root, "base", RecordKind::Struct);
    let rec = cm.create_record(root, RecordKind::Struct);
    cm.add_base(rec, base, AccessLevel::Public).unwrap();

    let mut dbg = DebugInfo::new(&cm);
    let err = dbg
        .make_default_record_layout(&cm, rec, false)
        .unwrap_err();
    assert!(matches!(err, ModelError::LayoutPrecondition(_)));
}

#[test]
fn test_type_size_queries() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);
    let char_t = cm.builtin(BuiltinKind::Char);

    let mut dbg = DebugInfo::new(&cm);

    // Pointer and reference sizes come from ptr_size.
    let ptr = cm.get_or_create_ptr_type(int_t).unwrap();
    assert_eq!(dbg.find_type_size(&cm, ptr.into()), 8);
    let iref = cm.get_or_create_lvalue_ref_type(int_t).unwrap();
    assert_eq!(dbg.find_type_size(&cm, iref.into()), 8);
    dbg.set_ptr_size(4);
    assert_eq!(dbg.find_type_size(&cm, ptr.into()), 4);
    dbg.set_ptr_size(8);

    // Enum and typedef resolve through their underlying types.
    let en = cm.create_enum(root, "e", char_t).unwrap();
    assert_eq!(dbg.find_type_size(&cm, en.into()), 1);
    let td = cm.create_typedef(root, "td", int_t.into());
    assert_eq!(dbg.find_type_size(&cm, td.into()), 4);

    // Arrays and vectors scale by their element count.
    let arr = cm.get_or_create_arr_type(int_t, 10);
    assert_eq!(dbg.find_type_size(&cm, arr.into()), 40);
    let vec = cm.get_or_create_vec_type(char_t, 16).unwrap();
    assert_eq!(dbg.find_type_size(&cm, vec.into()), 16);
}

#[test]
fn test_mem_ptr_sizes() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);
    let void_t = cm.builtin(BuiltinKind::Void);

    let rec = cm.create_named_record(root, "rec", RecordKind::Class);
    let dbg = DebugInfo::new(&cm);

    let data_ptr = cm.get_or_create_mem_ptr_type(rec, int_t).unwrap();
    assert_eq!(dbg.find_type_size(&cm, data_ptr.into()), 8);

    let ftype = cm.get_or_create_func_type(void_t, &[]).unwrap();
    let fn_ptr = cm.get_or_create_mem_ptr_type(rec, ftype).unwrap();
    assert_eq!(dbg.find_type_size(&cm, fn_ptr.into()), 16);
}

#[test]
fn test_zero_length_array_size() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);
    let dbg = DebugInfo::new(&cm);

    let arr = cm.get_or_create_arr_type(int_t, 0);
    assert_eq!(dbg.type_size(&cm, arr.into()).unwrap(), 0);
}

#[test]
fn test_missing_size_is_an_error() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let rec = cm.create_named_record(root, "rec", RecordKind::Struct);

    let dbg = DebugInfo::new(&cm);
    let err = dbg.type_size(&cm, rec.into()).unwrap_err();
    assert!(matches!(err, ModelError::LayoutPrecondition(_)));
}
