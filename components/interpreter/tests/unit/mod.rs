//! Unit tests for interpreter components

use core_types::{ErrorKind, PropertyDescriptor, PropertyKey, Value, ValueKind};
use interpreter::{BinaryOp, BindingKind, CompareOp, JsResult, Runtime, UnaryOp};
use num_bigint::BigInt;
use proptest::prelude::*;

fn number(rt: &Runtime, handle: interpreter::JsResult) -> Option<f64> {
    handle.ok().and_then(|h| rt.value(h)).and_then(Value::as_number)
}

fn answer(rt: &mut Runtime, _this: core_types::HandleId, _args: &[core_types::HandleId]) -> JsResult {
    Ok(rt.number(42.0))
}

// ============================================================================
// Values & coercion
// ============================================================================

#[test]
fn test_typeof_values() {
    let mut rt = Runtime::new();
    let undefined = rt.undefined();
    let null = rt.null();
    let symbol = rt.symbol(None);
    let big = rt.bigint(BigInt::from(7));
    let function = rt.create_native_function("answer", answer);
    let object = rt.create_object();

    assert_eq!(rt.type_of(undefined), "undefined");
    assert_eq!(rt.type_of(null), "object");
    assert_eq!(rt.type_of(symbol), "symbol");
    assert_eq!(rt.type_of(big), "bigint");
    assert_eq!(rt.type_of(function), "function");
    assert_eq!(rt.type_of(object), "object");
}

#[test]
fn test_number_to_string() {
    let mut rt = Runtime::new();
    let half = rt.number(1.5);
    let nan = rt.number(f64::NAN);
    assert_eq!(rt.to_string(half).unwrap(), "1.5");
    assert_eq!(rt.to_string(nan).unwrap(), "NaN");
}

#[test]
fn test_symbol_to_string_throws() {
    let mut rt = Runtime::new();
    let symbol = rt.symbol(Some("s".into()));
    let err = rt.to_string(symbol).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
}

#[test]
fn test_null_loosely_equals_undefined() {
    let mut rt = Runtime::new();
    let undefined = rt.undefined();
    let null = rt.null();
    assert!(rt.loose_equals(null, undefined).unwrap());
    assert!(!rt.strict_equals(null, undefined));
}

#[test]
fn test_strings_compare_by_content() {
    let mut rt = Runtime::new();
    let a = rt.string("same");
    let b = rt.string("same");
    assert_ne!(a, b);
    assert!(rt.strict_equals(a, b));
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_add_with_string_concatenates() {
    let mut rt = Runtime::new();
    let a = rt.string("a");
    let one = rt.number(1.0);
    let result = rt.binary_op(BinaryOp::Add, a, one).unwrap();
    assert_eq!(rt.value(result).and_then(Value::as_str), Some("a1"));
}

#[test]
fn test_mixing_bigint_and_number_is_type_error() {
    let mut rt = Runtime::new();
    let big = rt.bigint(BigInt::from(1));
    let one = rt.number(1.0);
    let err = rt.binary_op(BinaryOp::Add, big, one).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
}

#[test]
fn test_bigint_division_by_zero() {
    let mut rt = Runtime::new();
    let one = rt.bigint(BigInt::from(1));
    let zero = rt.bigint(BigInt::from(0));
    let err = rt.binary_op(BinaryOp::Div, one, zero).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::RangeError));
}

#[test]
fn test_compare_and_increment() {
    let mut rt = Runtime::new();
    let two = rt.number(2.0);
    let three = rt.number(3.0);
    assert!(rt.compare(CompareOp::Lt, two, three).unwrap());
    assert!(!rt.compare(CompareOp::Ge, two, three).unwrap());
    let inc = rt.unary_op(UnaryOp::Inc, two);
    assert_eq!(number(&rt, inc), Some(3.0));
}

#[test]
fn test_in_requires_object() {
    let mut rt = Runtime::new();
    let key = rt.string("x");
    let target = rt.number(1.0);
    let err = rt.in_operator(key, target).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
}

// ============================================================================
// Objects
// ============================================================================

#[test]
fn test_lookup_walks_prototype_chain() {
    let mut rt = Runtime::new();
    let q = rt.create_object();
    let p = rt.create_object_with_proto(Some(q));
    let o = rt.create_object_with_proto(Some(p));
    let z = rt.number(26.0);
    rt.set(q, "z".into(), z).unwrap();

    let found = rt.get(o, &PropertyKey::from("z"));
    assert_eq!(number(&rt, found), Some(26.0));
    assert!(rt.has_property(o, &PropertyKey::from("z")));
    assert!(!rt.has_own_property(o, &PropertyKey::from("z")));
}

#[test]
fn test_non_configurable_property_survives_delete() {
    let mut rt = Runtime::new();
    let object = rt.create_object();
    let value = rt.number(1.0);
    rt.define_property(
        object,
        "fixed".into(),
        PropertyDescriptor::data_with(value, true, true, false),
    )
    .unwrap();

    let err = rt.delete(object, &PropertyKey::from("fixed")).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
    let still = rt.get(object, &PropertyKey::from("fixed"));
    assert_eq!(number(&rt, still), Some(1.0));
}

#[test]
fn test_frozen_object_rejects_writes() {
    let mut rt = Runtime::new();
    let object = rt.create_object();
    let one = rt.number(1.0);
    rt.set(object, "a".into(), one).unwrap();
    rt.freeze(object).unwrap();
    assert!(rt.is_frozen(object));

    let two = rt.number(2.0);
    assert!(rt.set(object, "a".into(), two).is_err());
    assert!(rt.set(object, "b".into(), two).is_err());
}

#[test]
fn test_getter_is_called() {
    let mut rt = Runtime::new();
    let object = rt.create_object();
    let getter = rt.create_native_function("answer", answer);
    rt.define_property(
        object,
        "answer".into(),
        PropertyDescriptor::accessor(Some(getter), None, true, true),
    )
    .unwrap();

    let value = rt.get(object, &PropertyKey::from("answer"));
    assert_eq!(number(&rt, value), Some(42.0));
    let one = rt.number(1.0);
    assert!(rt.set(object, "answer".into(), one).is_err());
}

#[test]
fn test_array_length_follows_indices() {
    let mut rt = Runtime::new();
    let array = rt.create_array(&[]);
    let value = rt.string("x");
    rt.set(array, "5".into(), value).unwrap();
    assert_eq!(rt.array_length(array), 6);
    assert_eq!(rt.kind(array), ValueKind::Array);
}

#[test]
fn test_string_indexing_uses_utf16_units() {
    let mut rt = Runtime::new();
    let text = rt.string("a\u{1F600}");
    let length = rt.get(text, &PropertyKey::from("length"));
    assert_eq!(number(&rt, length), Some(3.0));

    let first = rt.get(text, &PropertyKey::from("0")).unwrap();
    assert_eq!(rt.value(first).and_then(Value::as_str), Some("a"));
    let half = rt.get(text, &PropertyKey::from("1")).unwrap();
    assert_eq!(rt.value(half).and_then(Value::as_str), Some("\u{FFFD}"));
    let past = rt.get(text, &PropertyKey::from("3")).unwrap();
    assert_eq!(rt.kind(past), ValueKind::Undefined);
}

// ============================================================================
// Scopes
// ============================================================================

#[test]
fn test_uninitialized_binding() {
    let mut rt = Runtime::new();
    let uninitialized = rt.uninitialized();
    rt.declare("x", uninitialized, BindingKind::Var).unwrap();

    let err = rt.load("x").unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::ReferenceError));
    assert_eq!(rt.error_message(err), Some("Cannot access 'x' before initialization"));

    let five = rt.number(5.0);
    rt.declare("x", five, BindingKind::Var).unwrap();
    let loaded = rt.load("x");
    assert_eq!(number(&rt, loaded), Some(5.0));
}

#[test]
fn test_redeclaration_is_syntax_error() {
    let mut rt = Runtime::new();
    let one = rt.number(1.0);
    rt.declare("y", one, BindingKind::Var).unwrap();
    let err = rt.declare("y", one, BindingKind::Var).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::SyntaxError));
}

#[test]
fn test_const_assignment_is_type_error() {
    let mut rt = Runtime::new();
    let one = rt.number(1.0);
    rt.declare("c", one, BindingKind::Const).unwrap();
    let err = rt.store("c", one).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
}

#[test]
fn test_unresolved_name() {
    let mut rt = Runtime::new();
    let err = rt.load("nope").unwrap_err();
    assert_eq!(rt.error_message(err), Some("nope is not defined"));
}

#[test]
fn test_inner_scope_shadows_and_restores() {
    let mut rt = Runtime::new();
    let outer = rt.number(1.0);
    rt.declare("v", outer, BindingKind::Var).unwrap();
    rt.push_scope();
    let inner = rt.number(2.0);
    rt.declare("v", inner, BindingKind::Var).unwrap();
    let seen = rt.load("v");
    assert_eq!(number(&rt, seen), Some(2.0));
    rt.pop_scope().unwrap();
    let seen = rt.load("v");
    assert_eq!(number(&rt, seen), Some(1.0));
}

#[test]
fn test_global_scope_cannot_be_popped() {
    let mut rt = Runtime::new();
    let err = rt.pop_scope().unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::InternalError));
}

proptest! {
    #[test]
    fn test_integer_formatting(n in -1_000_000_000i64..1_000_000_000i64) {
        let mut rt = Runtime::new();
        let handle = rt.number(n as f64);
        prop_assert_eq!(rt.to_string(handle).unwrap(), n.to_string());
    }

    #[test]
    fn test_number_addition_commutes(a in -1.0e12f64..1.0e12, b in -1.0e12f64..1.0e12) {
        let mut rt = Runtime::new();
        let x = rt.number(a);
        let y = rt.number(b);
        let left = rt.binary_op(BinaryOp::Add, x, y);
        let right = rt.binary_op(BinaryOp::Add, y, x);
        prop_assert_eq!(number(&rt, left), number(&rt, right));
    }
}
