use crate::{BuiltinKind, CodeModel, ModelError, QualType, RecordKind};

#[test]
fn test_params_in_order() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);
    let float_t = cm.builtin(BuiltinKind::Float);

    let func = cm.create_function(root, "foo");
    let a = cm.add_named_param(func, "a", int_t.into());
    let b = cm.add_param(func, float_t.into());

    assert_eq!(cm.params(func), &[a, b]);
    assert_eq!(cm.entity(a).name(), Some("a"));
    assert_eq!(cm.entity(b).name(), None);
    assert_eq!(cm.param_type(a), QualType::unqual(int_t));
    assert_eq!(cm.param_type(b), QualType::unqual(float_t));
}

#[test]
fn test_set_ret_type_swaps_uses() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);
    let rec = cm.create_named_record(root, "rec", RecordKind::Struct);

    let func = cm.create_function(root, "foo");
    cm.set_ret_type(func, Some(rec.into())).unwrap();
    assert!(cm.entity(rec).has_uses());

    cm.set_ret_type(func, Some(int_t.into())).unwrap();
    assert!(!cm.entity(rec).has_uses());
    assert_eq!(cm.ret_type(func), Some(QualType::unqual(int_t)));

    cm.set_ret_type(func, None).unwrap();
    assert_eq!(cm.ret_type(func), None);

    cm.check_consistency().unwrap();
}

#[test]
fn test_ret_type_cant_be_function_type() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let void_t = cm.builtin(BuiltinKind::Void);
    let ftype = cm.get_or_create_func_type(void_t, &[]).unwrap();

    let func = cm.create_function(root, "foo");
    let err = cm.set_ret_type(func, Some(ftype.into())).unwrap_err();
    assert!(matches!(err, ModelError::TypeConstraint(_)));
}

#[test]
fn test_remove_param() {
    let mut cm = CodeModel::new();
    let root = cm.root();
    let int_t = cm.builtin(BuiltinKind::Int);

    let func = cm.create_function(root, "foo");
    let a = cm.add_param(func, int_t.into());
    let b = cm.add_param(func, int_t.into());

    cm.remove_param(func, a).unwrap();
    assert_eq!(cm.params(func), &[b]);
    assert!(!cm.is_alive(a));

    cm.check_consistency().unwrap();
}

#[test]
fn test_function_is_a_context() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let func = cm.create_function(root, "foo");
    let local = cm.create_named_record(func, "local", RecordKind::Struct);
    assert_eq!(cm.find_named_record(func, "local"), Some(local));
    assert_eq!(cm.entity(local).parent(), Some(func));
}
