//! Contract tests for interpreter API
//!
//! These tests pin down the guarantees embedders rely on.

use std::rc::Rc;

use bytecode_system::{Opcode, Program, ProgramBuilder};
use core_types::{ErrorKind, HandleId, PropertyKey, Value};
use interpreter::{BindingKind, Completion, Runtime, RuntimeConfig, Vm, DEFAULT_MAX_CALL_DEPTH};

fn program(build: impl FnOnce(&mut ProgramBuilder)) -> Rc<Program> {
    let mut b = ProgramBuilder::new("contract.js");
    build(&mut b);
    Rc::new(b.build().unwrap())
}

fn number(rt: &Runtime, handle: HandleId) -> Option<f64> {
    rt.value(handle).and_then(Value::as_number)
}

/// Contract: Runtime::new() starts in the global scope with an empty call stack
#[test]
fn test_runtime_new_contract() {
    let rt = Runtime::new();
    assert_eq!(rt.current_scope(), rt.global_scope());
    assert!(rt.call_stack().is_empty());
    assert_eq!(rt.config().max_call_depth, DEFAULT_MAX_CALL_DEPTH);
}

/// Contract: eval() returns the completion value on the Ok side
#[test]
fn test_eval_ok_contract() {
    let mut rt = Runtime::new();
    let result = rt
        .eval(program(|b| {
            b.push_string("done").op(Opcode::Ret);
        }))
        .unwrap();
    assert_eq!(rt.value(result).and_then(Value::as_str), Some("done"));
}

/// Contract: errors travel in-band as exception handles wrapping the thrown value
#[test]
fn test_eval_err_contract() {
    let mut rt = Runtime::new();
    let err = rt
        .eval(program(|b| {
            b.push_number(7.0).op(Opcode::Throw);
        }))
        .unwrap_err();
    assert!(rt.is_exception(err));
    let thrown = rt.thrown_value(err);
    assert_eq!(number(&rt, thrown), Some(7.0));
    assert_eq!(rt.current_scope(), rt.global_scope());
}

/// Contract: uncaught non-error values are reported as plain Error
#[test]
fn test_report_non_error_contract() {
    let mut rt = Runtime::new();
    let err = rt
        .eval(program(|b| {
            b.push_string("plain").op(Opcode::Throw);
        }))
        .unwrap_err();
    let report = rt.report(err);
    assert_eq!(report.kind, ErrorKind::Error);
    assert_eq!(report.message, "plain");
}

/// Contract: reading a property of undefined is a TypeError and later
/// instructions do not run
#[test]
fn test_get_field_undefined_contract() {
    let mut rt = Runtime::new();
    let err = rt
        .eval(program(|b| {
            b.op(Opcode::PushUndefined).push_string("x").op(Opcode::GetField);
            b.push_number(1.0).def("after");
        }))
        .unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
    assert!(rt.load("after").is_err());
}

/// Contract: a handle whose value was collected never resolves again
#[test]
fn test_dead_handle_contract() {
    let mut rt = Runtime::new();
    rt.push_scope();
    let temp = rt.string("temporary");
    rt.pop_scope().unwrap();
    rt.collect_garbage();
    let _fresh = rt.string("fresh");
    assert!(!rt.is_alive(temp));
    assert!(rt.value(temp).is_none());
}

/// Contract: values reachable from a live binding survive collection
#[test]
fn test_reachable_survives_contract() {
    let mut rt = Runtime::new();
    let object = rt.create_object();
    let inner = rt.number(5.0);
    rt.set(object, "inner".into(), inner).unwrap();
    rt.declare("keep", object, BindingKind::Var).unwrap();
    rt.collect_garbage();
    assert!(rt.is_alive(object));
    assert!(rt.is_alive(inner));
}

/// Contract: a weak map entry disappears once its key is unreachable, and
/// its value is released by the following collection
#[test]
fn test_weak_map_contract() {
    let mut rt = Runtime::new();
    let map = rt.create_weak_map();
    rt.declare("map", map, BindingKind::Var).unwrap();
    rt.push_scope();
    let key = rt.create_object();
    let value = rt.string("payload");
    rt.weak_map_set(map, key, value).unwrap();
    rt.pop_scope().unwrap();

    rt.collect_garbage();
    assert!(!rt.weak_map_has(map, key));
    rt.collect_garbage();
    assert!(!rt.is_alive(value));
}

/// Contract: weak map keys must be objects
#[test]
fn test_weak_map_key_contract() {
    let mut rt = Runtime::new();
    let map = rt.create_weak_map();
    let key = rt.number(1.0);
    let value = rt.number(2.0);
    let err = rt.weak_map_set(map, key, value).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
}

/// Contract: property lookup follows the prototype chain
#[test]
fn test_prototype_chain_contract() {
    let mut rt = Runtime::new();
    let q = rt.create_object();
    let p = rt.create_object_with_proto(Some(q));
    let o = rt.create_object_with_proto(Some(p));
    let value = rt.string("from q");
    rt.set(q, "name".into(), value).unwrap();
    let found = rt.get(o, &PropertyKey::from("name")).unwrap();
    assert_eq!(found, value);
    assert_eq!(rt.get_prototype(o), Some(p));
}

/// Contract: prototype cycles are rejected
#[test]
fn test_prototype_cycle_contract() {
    let mut rt = Runtime::new();
    let a = rt.create_object();
    let b = rt.create_object_with_proto(Some(a));
    assert!(rt.set_prototype(a, Some(b)).is_err());
}

/// Contract: deleting a non-configurable property fails and keeps it
#[test]
fn test_non_configurable_delete_contract() {
    let mut rt = Runtime::new();
    let object = rt.create_object();
    let value = rt.number(1.0);
    rt.define_property(
        object,
        "k".into(),
        core_types::PropertyDescriptor::data_with(value, false, false, false),
    )
    .unwrap();
    assert!(rt.delete(object, &PropertyKey::from("k")).is_err());
    assert!(rt.has_own_property(object, &PropertyKey::from("k")));
}

/// Contract: Vm::run() reports its outcome as a Completion and restores the scope
#[test]
fn test_vm_run_contract() {
    let mut rt = Runtime::new();
    let code = program(|b| {
        b.push_number(3.0).op(Opcode::Ret);
    });
    let this = rt.undefined();
    let global = rt.global_scope();
    let completion = Vm::new(code, 0, global, this, false).run(&mut rt);
    let Completion::Return(value) = completion else {
        panic!("expected a return, got {:?}", completion);
    };
    assert_eq!(number(&rt, value), Some(3.0));
    assert_eq!(rt.current_scope(), global);
}

/// Contract: call depth is bounded by the configuration
#[test]
fn test_call_depth_contract() {
    let mut rt = Runtime::with_config(RuntimeConfig::new().with_max_call_depth(8));
    let err = rt
        .eval(program(|b| {
            let body = b.new_label();
            b.op(Opcode::PushFunction).jump(Opcode::SetAddress, body).def("r").op(Opcode::Pop);
            b.load("r").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);
            b.bind(body);
            b.load("r").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);
        }))
        .unwrap_err();
    assert_eq!(rt.error_message(err), Some("Maximum call stack size exceeded"));
}

/// Contract: resume() on something that is not suspended is a TypeError
#[test]
fn test_resume_contract() {
    let mut rt = Runtime::new();
    let object = rt.create_object();
    let undefined = rt.undefined();
    let err = rt.resume(object, undefined).unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
}
