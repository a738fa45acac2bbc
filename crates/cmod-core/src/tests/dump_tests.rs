use crate::{AccessLevel, BuiltinKind, CodeModel, DumpOptions, RecordKind};

#[test]
fn test_dump_namespace_and_record() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let ns = cm.get_or_create_namespace(root, "app");
    let rec = cm.create_named_record(ns, "point", RecordKind::Struct);
    cm.create_field(rec, "x", int_t.into(), AccessLevel::Public, 0)
        .unwrap();
    cm.create_field(rec, "y", int_t.into(), AccessLevel::Public, 0)
        .unwrap();

    let out = cm.dump_to_string(DumpOptions::default());
    assert!(out.contains("namespace app {"));
    assert!(out.contains("struct point {"));
    assert!(out.contains("field x: int;"));
    assert!(out.contains("field y: int;"));

    // Declaration order is preserved.
    let x_pos = out.find("field x").unwrap();
    let y_pos = out.find("field y").unwrap();
    assert!(x_pos < y_pos);
}

#[test]
fn test_dump_skips_builtins_by_default() {
    let cm = CodeModel::new();
    let out = cm.dump_to_string(DumpOptions::default());
    assert!(!out.contains("int"));
}

#[test]
fn test_qualified_type_desc() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);

    let const_int = crate::QualType::unqual(int_t).with_const();
    assert_eq!(cm.qual_type_desc(const_int), "int const");

    let ptr = cm.get_or_create_ptr_type(const_int).unwrap();
    assert_eq!(cm.desc(ptr), "int const *");

    let arr = cm.get_or_create_arr_type(int_t, 4);
    assert_eq!(cm.desc(arr), "int[4]");

    let ftype = cm.get_or_create_func_type(int_t, &[ptr.into()]).unwrap();
    assert_eq!(cm.desc(ftype), "int (int const *)");
}

#[test]
fn test_template_desc() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let templ = cm.create_template_record(root, "vec", RecordKind::Class);
    cm.add_type_template_param(templ, "T");
    let inst = cm.create_instantiation(templ, &[int_t.into()]).unwrap();

    assert_eq!(cm.desc(templ), "vec<T>");
    assert_eq!(cm.desc(inst), "vec<int>");
}
