use crate::{CodeModel, ModelError, RecordKind};

#[test]
fn test_get_or_create_namespace() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let ns = cm.get_or_create_namespace(root, "test");
    let ns2 = cm.get_or_create_namespace(root, "test");
    assert_eq!(ns, ns2);
    assert_eq!(cm.find_namespace(root, "test"), Some(ns));
    assert_eq!(cm.entity(ns).name(), Some("test"));
}

#[test]
fn test_create_namespace_rejects_duplicate() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    cm.create_namespace(root, "dup").unwrap();
    let err = cm.create_namespace(root, "dup").unwrap_err();
    assert!(matches!(err, ModelError::DuplicateInsertion(_)));
}

#[test]
fn test_nested_namespaces() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let ns1 = cm.get_or_create_namespace(root, "ns1");
    let ns2 = cm.get_or_create_namespace(ns1, "ns2");
    assert_ne!(ns1, ns2);
    assert_eq!(cm.find_namespace(ns1, "ns2"), Some(ns2));
    assert_eq!(cm.find_namespace(root, "ns2"), None);
    assert_eq!(cm.entity(ns2).parent(), Some(ns1));
}

#[test]
fn test_anon_namespaces_are_distinct() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let a1 = cm.create_anon_namespace(root);
    let a2 = cm.create_anon_namespace(root);
    assert_ne!(a1, a2);
    assert_eq!(cm.entity(a1).name(), None);
    assert_eq!(cm.namespaces(root).count(), 2);
}

#[test]
fn test_namespaces_iterate_in_creation_order() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let a = cm.get_or_create_namespace(root, "a");
    let b = cm.get_or_create_namespace(root, "b");
    let c = cm.get_or_create_namespace(root, "c");
    assert_eq!(cm.namespaces(root).collect::<Vec<_>>(), vec![a, b, c]);
}

#[test]
fn test_namespace_entities_are_separate_from_nested_namespaces() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let ns = cm.get_or_create_namespace(root, "ns");
    let rec = cm.create_named_record(ns, "rec", RecordKind::Struct);

    // The nested-namespace map is distinct from the entity list.
    assert_eq!(cm.entities(ns), &[rec]);
    assert!(!cm.entities(root).contains(&ns));
    assert_eq!(cm.namespaces(ns).count(), 0);
}

#[test]
fn test_remove_namespace() {
    let mut cm = CodeModel::new();
    let root = cm.root();

    let ns = cm.get_or_create_namespace(root, "gone");
    cm.remove_entity(ns).unwrap();
    assert_eq!(cm.find_namespace(root, "gone"), None);

    cm.check_consistency().unwrap();
}
