use crate::{DebugInfo, find_field};
use cmod_core::{AccessLevel, BuiltinKind, CodeModel, RecordKind};

#[test]
fn test_find_direct_field() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let rec = cm.create_named_record(root, "rec", RecordKind::Struct);
    cm.create_field(rec, "x", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    let y = cm
        .create_field(rec, "y", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    let (found, offs) = find_field(&cm, Some(&dbg), rec, "y", false).unwrap();
    assert_eq!(found, y);
    assert_eq!(offs, 32);

    assert!(find_field(&cm, Some(&dbg), rec, "missing", false).is_none());
}

#[test]
fn test_find_field_without_debug_info() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let rec = cm.create_named_record(root, "rec", RecordKind::Struct);
    let y = cm
        .create_field(rec, "y", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    // Without debug info all offsets are 0.
    let (found, offs) = find_field(&cm, None, rec, "y", false).unwrap();
    assert_eq!(found, y);
    assert_eq!(offs, 0);
}

#[test]
fn test_find_field_in_base() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let base = cm.create_named_record(root, "base", RecordKind::Struct);
    cm.create_field(base, "a", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    let b = cm
        .create_field(base, "b", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let rec = cm.create_named_record(root, "rec", RecordKind::Struct);
    cm.add_base(rec, base, AccessLevel::Public).unwrap();
    cm.create_field(rec, "x", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    let (found, offs) = find_field(&cm, Some(&dbg), rec, "b", true).unwrap();
    assert_eq!(found, b);
    assert_eq!(offs, 32);

    // Base lookup disabled.
    assert!(find_field(&cm, Some(&dbg), rec, "b", false).is_none());
}

#[test]
fn test_find_field_in_anonymous_member() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    // struct inner { int deep; }; struct rec { int head; inner <anon>; };
    let inner = cm.create_named_record(root, "inner", RecordKind::Struct);
    let deep = cm
        .create_field(inner, "deep", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let rec = cm.create_named_record(root, "rec", RecordKind::Struct);
    cm.create_field(rec, "head", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    cm.create_field(rec, "", inner.into(), AccessLevel::Public, 0)
        .unwrap();

    let mut dbg = DebugInfo::new(&cm);
    dbg.make_default_record_layout(&cm, rec, true).unwrap();

    let (found, offs) = find_field(&cm, Some(&dbg), rec, "deep", false).unwrap();
    assert_eq!(found, deep);
    assert_eq!(offs, 32);
}
