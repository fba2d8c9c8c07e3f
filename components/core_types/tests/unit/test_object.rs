//! Unit tests for property descriptors and object payloads

use core_types::{HandleId, ObjectData, PropertyDescriptor, PropertyKey, PropertySlot};

#[test]
fn test_descriptor_helpers() {
    let h = HandleId::new(1, 0);
    let d = PropertyDescriptor::data(h);
    assert!(d.writable() && d.enumerable && d.configurable);
    assert_eq!(d.value(), Some(h));

    let hidden = PropertyDescriptor::hidden(h);
    assert!(!hidden.enumerable);

    let accessor = PropertyDescriptor::accessor(Some(h), None, false, true);
    assert!(!accessor.is_data());
    assert!(!accessor.writable());
    assert_eq!(accessor.value(), None);
    assert!(matches!(accessor.slot, PropertySlot::Accessor { get: Some(_), set: None }));
}

#[test]
fn test_new_object_is_extensible() {
    let obj = ObjectData::new(None);
    assert!(obj.extensible);
    assert!(!obj.sealed && !obj.frozen);
    assert!(obj.own_keys().is_empty());
}

#[test]
fn test_insertion_order_preserved() {
    let h = HandleId::new(0, 0);
    let mut obj = ObjectData::default();
    for name in ["z", "a", "m"] {
        obj.properties.insert(PropertyKey::from(name), PropertyDescriptor::data(h));
    }
    let names: Vec<String> = obj.own_keys().iter().map(|k| k.to_string()).collect();
    assert_eq!(names, vec!["z", "a", "m"]);
}

#[test]
fn test_accessor_references() {
    let get = HandleId::new(4, 0);
    let set = HandleId::new(5, 0);
    let mut obj = ObjectData::default();
    obj.properties.insert(
        PropertyKey::from("x"),
        PropertyDescriptor::accessor(Some(get), Some(set), true, true),
    );
    let mut refs = Vec::new();
    obj.references(&mut refs);
    assert_eq!(refs, vec![get, set]);
}
