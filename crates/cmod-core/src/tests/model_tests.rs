use crate::{AccessLevel, BuiltinKind, CodeModel, ModelError, QualType, RecordKind};
use std::path::Path;

#[test]
fn test_create_ptr() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);
    let ptr = cm.get_or_create_ptr_type(int_t).unwrap();

    let base = cm.pointee(ptr);
    assert!(!base.is_const());
    assert!(!base.is_volatile());
    assert_eq!(base.ty, int_t);
}

#[test]
fn test_ptr_interning() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);
    let char_t = cm.builtin(BuiltinKind::Char);

    let p1 = cm.get_or_create_ptr_type(int_t).unwrap();
    let p2 = cm.get_or_create_ptr_type(int_t).unwrap();
    let p3 = cm.get_or_create_ptr_type(char_t).unwrap();

    assert_eq!(p1, p2);
    assert_ne!(p1, p3);
}

#[test]
fn test_create_ptr_const() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);

    let p1 = cm.get_or_create_ptr_type(int_t).unwrap();
    let p2 = cm
        .get_or_create_ptr_type(QualType::unqual(int_t).with_const())
        .unwrap();
    let p3 = cm
        .get_or_create_ptr_type(QualType::unqual(int_t).with_volatile())
        .unwrap();
    let p4 = cm
        .get_or_create_ptr_type(QualType::unqual(int_t).with_const().with_volatile())
        .unwrap();

    assert_ne!(p1, p2);
    assert_ne!(p1, p3);
    assert_ne!(p1, p4);
    assert_ne!(p2, p3);
    assert_ne!(p2, p4);
    assert_ne!(p3, p4);
}

#[test]
fn test_create_ref() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);
    let char_t = cm.builtin(BuiltinKind::Char);

    let r1 = cm.get_or_create_lvalue_ref_type(int_t).unwrap();
    let r2 = cm.get_or_create_lvalue_ref_type(int_t).unwrap();
    let r3 = cm.get_or_create_lvalue_ref_type(char_t).unwrap();

    assert_eq!(r1, r2);
    assert_ne!(r1, r3);
    assert_eq!(cm.pointee(r1).ty, int_t);
}

#[test]
fn test_rvalue_ref_distinct_from_lvalue_ref() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);

    let lref = cm.get_or_create_lvalue_ref_type(int_t).unwrap();
    let rref = cm.get_or_create_rvalue_ref_type(int_t).unwrap();
    assert_ne!(lref, rref);
}

#[test]
fn test_ptr_to_ref_rejected() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);
    let iref = cm.get_or_create_lvalue_ref_type(int_t).unwrap();

    let err = cm.get_or_create_ptr_type(iref).unwrap_err();
    assert!(matches!(err, ModelError::TypeConstraint(_)));
}

#[test]
fn test_ref_to_ref_rejected() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);
    let iref = cm.get_or_create_lvalue_ref_type(int_t).unwrap();

    let err = cm.get_or_create_lvalue_ref_type(iref).unwrap_err();
    assert!(matches!(err, ModelError::TypeConstraint(_)));
    let err = cm.get_or_create_rvalue_ref_type(iref).unwrap_err();
    assert!(matches!(err, ModelError::TypeConstraint(_)));
}

#[test]
fn test_create_arr() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);

    let arr = cm.get_or_create_arr_type(int_t, 20);
    let (elem, len) = cm.array_info(arr);
    assert_eq!(elem, int_t);
    assert_eq!(len, 20);

    let arr2 = cm.get_or_create_arr_type(int_t, 20);
    assert_eq!(arr, arr2);

    let arr3 = cm.get_or_create_arr_type(int_t, 30);
    assert_ne!(arr, arr3);
}

#[test]
fn test_create_vec() {
    let mut cm = CodeModel::new();
    let float_t = cm.builtin(BuiltinKind::Float);

    let vec = cm.get_or_create_vec_type(float_t, 4).unwrap();
    let vec2 = cm.get_or_create_vec_type(float_t, 4).unwrap();
    assert_eq!(vec, vec2);

    let vec8 = cm.get_or_create_vec_type(float_t, 8).unwrap();
    assert_ne!(vec, vec8);
}

#[test]
fn test_vec_elem_must_be_builtin() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let rec = cm.create_named_record(root, "rec", RecordKind::Struct);

    let err = cm.get_or_create_vec_type(rec, 4).unwrap_err();
    assert!(matches!(err, ModelError::TypeConstraint(_)));

    let float_t = cm.builtin(BuiltinKind::Float);
    let err = cm.get_or_create_vec_type(float_t, u64::MAX).unwrap_err();
    assert!(matches!(err, ModelError::TypeConstraint(_)));
}

#[test]
fn test_func_type_interning_with_qualifiers() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);
    let float_t = cm.builtin(BuiltinKind::Float);
    let short_t = cm.builtin(BuiltinKind::Short);

    let ret = QualType::unqual(int_t).with_volatile();
    let f1 = cm
        .get_or_create_func_type(ret, &[float_t.into(), short_t.into()])
        .unwrap();
    let f2 = cm
        .get_or_create_func_type(ret, &[float_t.into(), short_t.into()])
        .unwrap();
    let f3 = cm
        .get_or_create_func_type(
            ret,
            &[QualType::unqual(float_t).with_const(), short_t.into()],
        )
        .unwrap();

    assert_eq!(f1, f2);
    assert_ne!(f1, f3);

    assert_eq!(cm.func_type_ret(f1), ret);
    assert_eq!(cm.func_type_params(f1).len(), 2);
    assert_eq!(cm.func_type_params(f1)[0], QualType::unqual(float_t));
}

#[test]
fn test_func_returning_func_rejected() {
    let mut cm = CodeModel::new();
    let void_t = cm.builtin(BuiltinKind::Void);
    let ftype = cm.get_or_create_func_type(void_t, &[]).unwrap();

    let err = cm.get_or_create_func_type(ftype, &[]).unwrap_err();
    assert!(matches!(err, ModelError::TypeConstraint(_)));

    // A pointer to a function type is fine.
    cm.get_or_create_ptr_type(ftype).unwrap();
}

#[test]
fn test_func_type_of_function() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let func = cm.create_function(root, "foo");
    cm.set_ret_type(func, Some(int_t.into())).unwrap();
    cm.add_param(func, int_t.into());

    let sig = cm.get_or_create_func_type_of(func).unwrap();
    let expected = cm
        .get_or_create_func_type(int_t, &[int_t.into()])
        .unwrap();
    assert_eq!(sig, expected);
}

#[test]
fn test_mem_ptr_interning() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);
    let rec = cm.create_named_record(root, "rec", RecordKind::Class);

    let m1 = cm.get_or_create_mem_ptr_type(rec, int_t).unwrap();
    let m2 = cm.get_or_create_mem_ptr_type(rec, int_t).unwrap();
    assert_eq!(m1, m2);

    let (owner, member) = cm.mem_ptr_info(m1);
    assert_eq!(owner, rec);
    assert_eq!(member.ty, int_t);

    let err = cm.get_or_create_mem_ptr_type(int_t, int_t).unwrap_err();
    assert!(matches!(err, ModelError::TypeConstraint(_)));
}

#[test]
fn test_create_typedef_global() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let td = cm.create_typedef(root, "my_int", int_t.into());
    assert_eq!(cm.entity(td).name(), Some("my_int"));
    assert_eq!(cm.typedef_aliased(td).ty, int_t);
    assert_eq!(cm.untypedef(td), int_t);
}

#[test]
fn test_create_rec_ptr_recursive() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let rec = cm.create_named_record(root, "rec", RecordKind::Struct);
    let ptr = cm.get_or_create_ptr_type(rec).unwrap();
    cm.create_field(rec, "fld", ptr.into(), AccessLevel::Public, 0)
        .unwrap();

    cm.check_consistency().unwrap();
}

#[test]
fn test_record_base_in_namespace() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let ns = cm.get_or_create_namespace(root, "ns");
    let base = cm.create_named_record(ns, "base", RecordKind::Struct);
    let rec = cm.create_named_record(ns, "rec", RecordKind::Struct);
    cm.add_base(rec, base, AccessLevel::Private).unwrap();

    cm.check_consistency().unwrap();
}

#[test]
fn test_replace_type() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let rec1 = cm.create_named_record(root, "rec1", RecordKind::Struct);
    let ptr = cm.get_or_create_ptr_type(rec1).unwrap();
    let rec2 = cm.create_named_record(root, "rec2", RecordKind::Struct);

    let holder = cm.create_named_record(root, "str", RecordKind::Struct);
    let field = cm
        .create_field(holder, "x", ptr.into(), AccessLevel::Public, 0)
        .unwrap();

    cm.replace_type(rec1, rec2).unwrap();

    let new_ptr = cm.var_type(field).ty;
    assert_ne!(new_ptr, ptr);
    assert_eq!(cm.pointee(new_ptr).ty, rec2);
}

#[test]
fn test_replace_type_cascade_and_sweep() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let a = cm.create_named_record(root, "A", RecordKind::Struct);
    let b = cm.create_named_record(root, "B", RecordKind::Struct);
    let ptr_a = cm.get_or_create_ptr_type(a).unwrap();

    let holder = cm.create_named_record(root, "V", RecordKind::Struct);
    let field = cm
        .create_field(holder, "x", ptr_a.into(), AccessLevel::Public, 0)
        .unwrap();

    cm.replace_type(a, b).unwrap();
    cm.remove_unused_composite_types();

    let ptr_b = cm.get_or_create_ptr_type(b).unwrap();
    assert_eq!(cm.var_type(field).ty, ptr_b);
    assert!(!cm.is_alive(ptr_a));
    assert!(!cm.entity(a).has_uses());
    assert!(!cm.ptr_types().any(|ty| ty == ptr_a));

    cm.check_consistency().unwrap();
}

#[test]
fn test_replace_type_through_function_type() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let a = cm.create_named_record(root, "A", RecordKind::Struct);
    let b = cm.create_named_record(root, "B", RecordKind::Struct);
    let ptr_a = cm.get_or_create_ptr_type(a).unwrap();
    let ftype = cm
        .get_or_create_func_type(int_t, &[ptr_a.into(), a.into()])
        .unwrap();
    let fptr = cm.get_or_create_ptr_type(ftype).unwrap();
    let td = cm.create_typedef(root, "callback", fptr.into());

    cm.replace_type(a, b).unwrap();
    cm.remove_unused_composite_types();

    let new_fptr = cm.typedef_aliased(td).ty;
    let new_ftype = cm.pointee(new_fptr).ty;
    let params = cm.func_type_params(new_ftype);
    let ptr_b = cm.get_or_create_ptr_type(b).unwrap();
    assert_eq!(params[0].ty, ptr_b);
    assert_eq!(params[1].ty, b);
    assert!(!cm.entity(a).has_uses());

    cm.check_consistency().unwrap();
}

#[test]
fn test_remove_unused_composite_types_fixed_point() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);

    let ptr = cm.get_or_create_ptr_type(int_t).unwrap();
    let ptr_ptr = cm.get_or_create_ptr_type(ptr).unwrap();
    assert!(cm.entity(ptr).has_uses());

    cm.remove_unused_composite_types();
    assert!(!cm.is_alive(ptr));
    assert!(!cm.is_alive(ptr_ptr));

    cm.check_consistency().unwrap();
}

#[test]
fn test_remove_type_with_uses_rejected() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);

    let ptr = cm.get_or_create_ptr_type(int_t).unwrap();
    cm.get_or_create_ptr_type(ptr).unwrap();

    let err = cm.remove_type(ptr).unwrap_err();
    assert!(matches!(err, ModelError::UseInvariant(_)));
}

#[test]
fn test_remove_composite_type() {
    let mut cm = CodeModel::new();
    let int_t = cm.builtin(BuiltinKind::Int);

    let arr = cm.get_or_create_arr_type(int_t, 8);
    cm.remove_type(arr).unwrap();
    assert!(!cm.is_alive(arr));
    assert!(cm.arr_types().next().is_none());
}

#[test]
fn test_remove_entity_and_uses_cascade() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let a = cm.create_named_record(root, "A", RecordKind::Struct);
    let ptr_a = cm.get_or_create_ptr_type(a).unwrap();
    let holder = cm.create_named_record(root, "holder", RecordKind::Struct);
    let field = cm
        .create_field(holder, "x", ptr_a.into(), AccessLevel::Public, 0)
        .unwrap();

    cm.remove_entity_and_uses(a).unwrap();
    assert!(!cm.is_alive(a));
    assert!(!cm.is_alive(ptr_a));
    assert!(!cm.is_alive(field));
    assert!(cm.is_alive(holder));

    cm.check_consistency().unwrap();
}

#[test]
fn test_untypedef_chain() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let td1 = cm.create_typedef(root, "t1", int_t.into());
    let td2 = cm.create_typedef(root, "t2", td1.into());
    assert_eq!(cm.untypedef(td2), int_t);
}

#[test]
fn test_sources() {
    let mut cm = CodeModel::new();
    let id = cm.source("/src/main.cpp");
    let id2 = cm.source("/src/main.cpp");
    assert_eq!(id, id2);

    assert_eq!(cm.find_source(Path::new("/src/main.cpp"), false), Some(id));
    assert_eq!(cm.find_source(Path::new("other.cpp"), false), None);
    assert_eq!(cm.find_source(Path::new("main.cpp"), true), Some(id));
}

#[test]
fn test_builtin_singletons() {
    let cm = CodeModel::new();
    assert_eq!(cm.builtin(BuiltinKind::Int), cm.builtin(BuiltinKind::Int));
    assert_ne!(cm.builtin(BuiltinKind::Int), cm.builtin(BuiltinKind::Long));
    assert_eq!(cm.entity(cm.builtin(BuiltinKind::LongLong)).name(), Some("long long"));
    assert!(cm.entity(cm.builtin(BuiltinKind::Bool)).is_builtin());
}

#[test]
fn test_consistency_of_fresh_model() {
    let cm = CodeModel::new();
    cm.check_consistency().unwrap();
}
