//! Integration tests for interpreter
//!
//! Whole programs assembled with `ProgramBuilder` and run through the VM:
//! functions and closures, exceptions, labels, disposal and coroutines.

use std::rc::Rc;

use bytecode_system::{Opcode, ProgramBuilder};
use core_types::{ErrorKind, HandleId, PropertyKey, Value};
use interpreter::{BindingKind, JsResult, Runtime, RuntimeConfig};

fn eval(rt: &mut Runtime, build: impl FnOnce(&mut ProgramBuilder)) -> JsResult {
    let mut b = ProgramBuilder::new("test.js");
    build(&mut b);
    rt.eval(Rc::new(b.build().unwrap()))
}

fn number(rt: &Runtime, handle: HandleId) -> Option<f64> {
    rt.value(handle).and_then(Value::as_number)
}

fn field(rt: &mut Runtime, object: HandleId, name: &str) -> HandleId {
    rt.get(object, &PropertyKey::from(name)).unwrap()
}

/// Emit `PUSH_FUNCTION; SET_ADDRESS body; SET_NAME name; DEF name; POP`
fn define_function(b: &mut ProgramBuilder, opcode: Opcode, name: &str, body: bytecode_system::Label) {
    b.op(opcode).jump(Opcode::SetAddress, body).op_str(Opcode::SetName, name);
    b.def(name).op(Opcode::Pop);
}

fn log_dispose(rt: &mut Runtime, this: HandleId, _args: &[HandleId]) -> JsResult {
    let name = rt.get(this, &PropertyKey::from("name"))?;
    let log = rt.load("log")?;
    let joined = rt.concat(log, name)?;
    rt.store("log", joined)?;
    Ok(rt.undefined())
}

fn resource(rt: &mut Runtime, name: &str) -> HandleId {
    let object = rt.create_object();
    let label = rt.string(name);
    rt.set(object, "name".into(), label).unwrap();
    let dispose = rt.create_native_function("dispose", log_dispose);
    let key = rt.symbol_key(rt.intrinsics().symbols.dispose).unwrap();
    rt.set(object, key, dispose).unwrap();
    object
}

fn log_async_dispose(rt: &mut Runtime, this: HandleId, args: &[HandleId]) -> JsResult {
    log_dispose(rt, this, args)?;
    Ok(rt.number(7.0))
}

fn async_resource(rt: &mut Runtime, name: &str) -> HandleId {
    let object = rt.create_object();
    let label = rt.string(name);
    rt.set(object, "name".into(), label).unwrap();
    let dispose = rt.create_native_function("asyncDispose", log_async_dispose);
    let key = rt.symbol_key(rt.intrinsics().symbols.async_dispose).unwrap();
    rt.set(object, key, dispose).unwrap();
    object
}

/// Define `async function work()` holding one `await using` binding of
/// the global `res`, then call it and return the task
fn await_using_task(rt: &mut Runtime) -> HandleId {
    eval(rt, |b| {
        let body = b.new_label();
        define_function(b, Opcode::PushAsyncFunction, "work", body);
        b.load("work").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);
        b.bind(body);
        b.push_number(4.0);
        b.op(Opcode::PushScope);
        b.load("res").def("r").op_str(Opcode::SetAwaitUsing, "r").op(Opcode::Pop);
        b.op(Opcode::PopScope);
        b.push_number(7.0).op(Opcode::Add).op(Opcode::Ret);
    })
    .unwrap()
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_call_with_arguments() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        let body = b.new_label();
        define_function(b, Opcode::PushFunction, "add", body);
        b.load("add").op(Opcode::PushArray);
        b.push_number(0.0).push_number(2.0).op(Opcode::InitField);
        b.push_number(1.0).push_number(40.0).op(Opcode::InitField);
        b.call(Opcode::Call, 1, 1).op(Opcode::Ret);

        b.bind(body);
        b.load("arguments").push_number(0.0).op(Opcode::GetField);
        b.load("arguments").push_number(1.0).op(Opcode::GetField);
        b.op(Opcode::Add).op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(number(&rt, result), Some(42.0));
}

#[test]
fn test_closure_survives_scope_pop_and_collection() {
    let mut rt = Runtime::new();
    eval(&mut rt, |b| {
        let body = b.new_label();
        let end = b.new_label();
        b.op(Opcode::PushUndefined).def("f").op(Opcode::Pop);
        b.op(Opcode::PushScope);
        b.push_number(10.0).def("x").op(Opcode::Pop);
        b.op(Opcode::PushFunction).jump(Opcode::SetAddress, body);
        b.op_str(Opcode::SetClosure, "x").store("f").op(Opcode::Pop);
        b.op(Opcode::PopScope);
        b.jump(Opcode::Jmp, end);
        b.bind(body);
        b.load("x").op(Opcode::Ret);
        b.bind(end);
    })
    .unwrap();

    rt.collect_garbage();

    let result = eval(&mut rt, |b| {
        b.load("f").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(number(&rt, result), Some(10.0));
    assert!(rt.load("x").is_err());
}

#[test]
fn test_constructor_and_instance_of() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        let body = b.new_label();
        let end = b.new_label();
        define_function(b, Opcode::PushFunction, "Point", body);
        b.load("Point").op(Opcode::PushArray).call(Opcode::New, 2, 1);
        b.def("p").op(Opcode::Pop);
        b.jump(Opcode::Jmp, end);

        b.bind(body);
        b.op(Opcode::PushThis).push_string("x").push_number(3.0).op(Opcode::SetField);
        b.op(Opcode::Pop).op(Opcode::PushUndefined).op(Opcode::Ret);

        b.bind(end);
        b.load("p").load("Point").op(Opcode::InstanceOf).op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(result, rt.boolean(true));
    let p = rt.load("p").unwrap();
    let x = field(&mut rt, p, "x");
    assert_eq!(number(&rt, x), Some(3.0));
}

#[test]
fn test_member_call_binds_receiver() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        let body = b.new_label();
        let end = b.new_label();
        b.op(Opcode::PushObject);
        b.push_string("n").push_number(7.0).op(Opcode::InitField);
        b.push_string("get").op(Opcode::PushFunction).jump(Opcode::SetAddress, body);
        b.op(Opcode::InitField);
        b.def("o").op(Opcode::Pop);
        b.jump(Opcode::Jmp, end);

        b.bind(body);
        b.op(Opcode::PushThis).push_string("n").op(Opcode::GetField).op(Opcode::Ret);

        b.bind(end);
        b.load("o").push_string("get").op(Opcode::PushArray);
        b.call(Opcode::MemberCall, 1, 1).op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(number(&rt, result), Some(7.0));
}

#[test]
fn test_calling_a_number_fails() {
    let mut rt = Runtime::new();
    let err = eval(&mut rt, |b| {
        b.push_number(1.0).op(Opcode::PushArray).call(Opcode::Call, 1, 1);
    })
    .unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
    assert_eq!(rt.error_message(err), Some("1 is not a function"));
}

#[test]
fn test_runaway_recursion_is_range_error() {
    let mut rt = Runtime::with_config(RuntimeConfig::new().with_max_call_depth(32));
    let err = eval(&mut rt, |b| {
        let body = b.new_label();
        define_function(b, Opcode::PushFunction, "f", body);
        b.load("f").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);
        b.bind(body);
        b.load("f").op(Opcode::PushArray).call(Opcode::Call, 2, 3).op(Opcode::Ret);
    })
    .unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::RangeError));
    assert!(rt.call_stack().is_empty());
    assert_eq!(rt.current_scope(), rt.global_scope());
}

#[test]
fn test_uncaught_error_keeps_call_frames() {
    let mut rt = Runtime::new();
    let err = eval(&mut rt, |b| {
        let body = b.new_label();
        define_function(b, Opcode::PushFunction, "inner", body);
        b.load("inner").op(Opcode::PushArray).call(Opcode::Call, 4, 9).op(Opcode::Ret);
        b.bind(body);
        b.op(Opcode::PushUndefined).push_string("x").op(Opcode::GetField);
    })
    .unwrap_err();
    let report = rt.report(err);
    assert_eq!(report.kind, ErrorKind::TypeError);
    assert_eq!(report.stack.len(), 1);
    assert_eq!(report.stack[0].function_name.as_deref(), Some("inner"));
    assert_eq!(report.stack[0].line, 4);
    assert_eq!(report.stack[0].column, 9);
}

// ============================================================================
// Exceptions
// ============================================================================

#[test]
fn test_try_catch_finally() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        let catch = b.new_label();
        let finally = b.new_label();
        let end = b.new_label();
        b.op(Opcode::PushUndefined).def("caught").op(Opcode::Pop);
        b.op(Opcode::PushFalse).def("cleaned").op(Opcode::Pop);

        b.try_begin(Some(catch), Some(finally));
        b.push_string("boom").op(Opcode::Throw);
        b.op(Opcode::TryEnd).jump(Opcode::Jmp, end);
        b.bind(catch);
        b.store("caught").op(Opcode::Pop).op(Opcode::TryEnd);
        b.bind(finally);
        b.op(Opcode::PushTrue).store("cleaned").op(Opcode::Pop).op(Opcode::TryEnd);
        b.bind(end);
        b.load("caught").op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(rt.value(result).and_then(Value::as_str), Some("boom"));
    let cleaned = rt.load("cleaned").unwrap();
    assert_eq!(cleaned, rt.boolean(true));
}

#[test]
fn test_finally_runs_before_return() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        let body = b.new_label();
        let finally = b.new_label();
        b.op(Opcode::PushFalse).def("cleaned").op(Opcode::Pop);
        define_function(b, Opcode::PushFunction, "f", body);
        b.load("f").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);

        b.bind(body);
        b.try_begin(None, Some(finally));
        b.push_number(1.0).op(Opcode::Ret);
        b.op(Opcode::TryEnd);
        b.bind(finally);
        b.op(Opcode::PushTrue).store("cleaned").op(Opcode::Pop).op(Opcode::TryEnd);
        b.push_number(2.0).op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(number(&rt, result), Some(1.0));
    let cleaned = rt.load("cleaned").unwrap();
    assert_eq!(cleaned, rt.boolean(true));
}

#[test]
fn test_exception_rethrown_after_finally() {
    let mut rt = Runtime::new();
    let err = eval(&mut rt, |b| {
        let finally = b.new_label();
        b.op(Opcode::PushFalse).def("cleaned").op(Opcode::Pop);
        b.try_begin(None, Some(finally));
        b.push_string("late").op(Opcode::Throw);
        b.op(Opcode::TryEnd);
        b.bind(finally);
        b.op(Opcode::PushTrue).store("cleaned").op(Opcode::Pop).op(Opcode::TryEnd);
        b.push_string("unreachable").op(Opcode::Ret);
    })
    .unwrap_err();
    let thrown = rt.thrown_value(err);
    assert_eq!(rt.value(thrown).and_then(Value::as_str), Some("late"));
    let cleaned = rt.load("cleaned").unwrap();
    assert_eq!(cleaned, rt.boolean(true));
}

#[test]
fn test_exception_from_callee_is_caught() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        let body = b.new_label();
        let catch = b.new_label();
        let end = b.new_label();
        define_function(b, Opcode::PushFunction, "fail", body);
        b.try_begin(Some(catch), None);
        b.load("fail").op(Opcode::PushArray).call(Opcode::Call, 1, 1);
        b.op(Opcode::TryEnd).jump(Opcode::Jmp, end);
        b.bind(catch);
        b.push_string("message").op(Opcode::GetField).op(Opcode::Ret);
        b.bind(body);
        b.load("TypeError").op(Opcode::PushArray);
        b.push_number(0.0).push_string("nested").op(Opcode::InitField);
        b.call(Opcode::New, 1, 1).op(Opcode::Throw);
        b.bind(end);
    })
    .unwrap();
    assert_eq!(rt.value(result).and_then(Value::as_str), Some("nested"));
}

#[test]
fn test_error_skips_remaining_instructions() {
    let mut rt = Runtime::new();
    let no = rt.boolean(false);
    rt.declare("reached", no, BindingKind::Var).unwrap();
    let err = eval(&mut rt, |b| {
        b.op(Opcode::PushUndefined).push_string("x").op(Opcode::GetField);
        b.op(Opcode::PushTrue).store("reached");
    })
    .unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::TypeError));
    assert_eq!(rt.load("reached").unwrap(), rt.boolean(false));
}

// ============================================================================
// Labels
// ============================================================================

#[test]
fn test_break_leaves_loop() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        let top = b.new_label();
        let exit = b.new_label();
        let done = b.new_label();
        b.push_number(0.0).def("i").op(Opcode::Pop);
        b.label_frame(Opcode::PushBreakLabel, "outer", done);
        b.bind(top);
        b.load("i").push_number(3.0).op(Opcode::Ge).jump(Opcode::JTrue, exit);
        b.op(Opcode::Pop);
        b.load("i").op(Opcode::Inc).store("i").op(Opcode::Pop);
        b.jump(Opcode::Jmp, top);
        b.bind(exit);
        b.op(Opcode::Pop).op_str(Opcode::Break, "outer");
        b.bind(done);
        b.load("i").op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(number(&rt, result), Some(3.0));
}

#[test]
fn test_break_runs_finally() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        let finally = b.new_label();
        let done = b.new_label();
        b.op(Opcode::PushFalse).def("cleaned").op(Opcode::Pop);
        b.label_frame(Opcode::PushBreakLabel, "l", done);
        b.try_begin(None, Some(finally));
        b.op_str(Opcode::Break, "l");
        b.op(Opcode::TryEnd);
        b.bind(finally);
        b.op(Opcode::PushTrue).store("cleaned").op(Opcode::Pop).op(Opcode::TryEnd);
        b.push_string("fell through").op(Opcode::Ret);
        b.bind(done);
        b.load("cleaned").op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(result, rt.boolean(true));
}

#[test]
fn test_break_to_unknown_label() {
    let mut rt = Runtime::new();
    let err = eval(&mut rt, |b| {
        b.op_str(Opcode::Break, "nowhere");
    })
    .unwrap_err();
    assert_eq!(rt.error_kind(err), Some(ErrorKind::SyntaxError));
    assert_eq!(rt.error_message(err), Some("Undefined label 'nowhere'"));
}

#[test]
fn test_break_pops_scopes() {
    let mut rt = Runtime::new();
    eval(&mut rt, |b| {
        let done = b.new_label();
        b.label_frame(Opcode::PushBreakLabel, "", done);
        b.op(Opcode::PushScope).op(Opcode::PushScope);
        b.op_str(Opcode::Break, "");
        b.bind(done);
    })
    .unwrap();
    assert_eq!(rt.current_scope(), rt.global_scope());
}

// ============================================================================
// Disposal
// ============================================================================

#[test]
fn test_using_disposes_in_reverse_order() {
    let mut rt = Runtime::new();
    let empty = rt.string("");
    rt.declare("log", empty, BindingKind::Var).unwrap();
    let a = resource(&mut rt, "a");
    let b_res = resource(&mut rt, "b");
    rt.declare("res_a", a, BindingKind::Var).unwrap();
    rt.declare("res_b", b_res, BindingKind::Var).unwrap();

    let result = eval(&mut rt, |b| {
        b.op(Opcode::PushScope);
        b.load("res_a").def("a").op_str(Opcode::SetUsing, "a").op(Opcode::Pop);
        b.load("res_b").def("b").op_str(Opcode::SetUsing, "b").op(Opcode::Pop);
        b.op(Opcode::PopScope);
        b.load("log").op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(rt.value(result).and_then(Value::as_str), Some("ba"));
}

#[test]
fn test_using_disposed_when_exception_leaves_scope() {
    let mut rt = Runtime::new();
    let empty = rt.string("");
    rt.declare("log", empty, BindingKind::Var).unwrap();
    let a = resource(&mut rt, "a");
    rt.declare("res_a", a, BindingKind::Var).unwrap();

    let result = eval(&mut rt, |b| {
        let catch = b.new_label();
        b.try_begin(Some(catch), None);
        b.op(Opcode::PushScope);
        b.load("res_a").def("a").op_str(Opcode::SetUsing, "a").op(Opcode::Pop);
        b.push_string("oops").op(Opcode::Throw);
        b.bind(catch);
        b.op(Opcode::Pop).op(Opcode::TryEnd);
        b.load("log").op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(rt.value(result).and_then(Value::as_str), Some("a"));
    assert_eq!(rt.current_scope(), rt.global_scope());
}

#[test]
fn test_using_without_disposer_is_skipped() {
    let mut rt = Runtime::new();
    let result = eval(&mut rt, |b| {
        b.op(Opcode::PushScope);
        b.op(Opcode::PushNull).def("r").op_str(Opcode::SetUsing, "r").op(Opcode::Pop);
        b.op(Opcode::PopScope);
        b.push_number(1.0).op(Opcode::Ret);
    })
    .unwrap();
    assert_eq!(number(&rt, result), Some(1.0));
}

#[test]
fn test_await_using_suspends_scope_exit() {
    let mut rt = Runtime::new();
    let empty = rt.string("");
    rt.declare("log", empty, BindingKind::Var).unwrap();
    let res = async_resource(&mut rt, "d");
    rt.declare("res", res, BindingKind::Var).unwrap();
    let task = await_using_task(&mut rt);

    let undefined = rt.undefined();
    let pending = rt.resume(task, undefined).unwrap();
    assert_eq!(rt.interrupt_kind(pending), Some(core_types::InterruptKind::Await));
    let awaited = rt.interrupt_value(pending).unwrap();
    assert_eq!(number(&rt, awaited), Some(7.0));

    rt.collect_garbage();

    // the awaited input is dropped when POP_SCOPE runs again
    let input = rt.number(100.0);
    let result = rt.resume(task, input).unwrap();
    assert_eq!(number(&rt, result), Some(11.0));
    let log = rt.load("log").unwrap();
    assert_eq!(rt.value(log).and_then(Value::as_str), Some("d"));
    assert_eq!(rt.current_scope(), rt.global_scope());
}

#[test]
fn test_await_using_falls_back_to_dispose() {
    let mut rt = Runtime::new();
    let empty = rt.string("");
    rt.declare("log", empty, BindingKind::Var).unwrap();
    let res = resource(&mut rt, "s");
    rt.declare("res", res, BindingKind::Var).unwrap();
    let task = await_using_task(&mut rt);

    let undefined = rt.undefined();
    let result = rt.resume(task, undefined).unwrap();
    assert!(!rt.is_interrupt(result));
    assert_eq!(number(&rt, result), Some(11.0));
    let log = rt.load("log").unwrap();
    assert_eq!(rt.value(log).and_then(Value::as_str), Some("s"));
}

// ============================================================================
// Coroutines
// ============================================================================

#[test]
fn test_generator_yields_then_returns() {
    let mut rt = Runtime::new();
    eval(&mut rt, |b| {
        let body = b.new_label();
        define_function(b, Opcode::PushGenerator, "g", body);
        b.load("g").op(Opcode::PushArray).call(Opcode::Call, 1, 1);
        b.def("it").op(Opcode::Pop).op(Opcode::Hlt);
        b.bind(body);
        b.push_number(1.0).op(Opcode::Yield).op(Opcode::Pop);
        b.push_number(2.0).op(Opcode::Yield).op(Opcode::Pop);
        b.push_number(3.0).op(Opcode::Ret);
    })
    .unwrap();

    let it = rt.load("it").unwrap();
    let undefined = rt.undefined();
    let mut seen = Vec::new();
    for _ in 0..4 {
        let step = rt.generator_next(it, undefined).unwrap();
        let value = field(&mut rt, step, "value");
        let done = field(&mut rt, step, "done");
        seen.push((number(&rt, value), done == rt.boolean(true)));
    }
    assert_eq!(
        seen,
        vec![
            (Some(1.0), false),
            (Some(2.0), false),
            (Some(3.0), true),
            (None, true),
        ]
    );
}

#[test]
fn test_generator_receives_input() {
    let mut rt = Runtime::new();
    let generator = eval(&mut rt, |b| {
        let body = b.new_label();
        define_function(b, Opcode::PushGenerator, "echo", body);
        b.load("echo").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);
        b.bind(body);
        b.op(Opcode::PushUndefined).op(Opcode::Yield);
        b.push_number(1.0).op(Opcode::Add).op(Opcode::Ret);
    })
    .unwrap();

    let undefined = rt.undefined();
    let first = rt.resume(generator, undefined).unwrap();
    assert!(rt.is_interrupt(first));
    let input = rt.number(41.0);
    let last = rt.resume(generator, input).unwrap();
    assert_eq!(number(&rt, last), Some(42.0));
}

#[test]
fn test_async_function_suspends_on_await() {
    let mut rt = Runtime::new();
    let task = eval(&mut rt, |b| {
        let body = b.new_label();
        define_function(b, Opcode::PushAsyncFunction, "work", body);
        b.load("work").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);
        b.bind(body);
        b.push_number(5.0).op(Opcode::Await);
        b.push_number(1.0).op(Opcode::Add).op(Opcode::Ret);
    })
    .unwrap();

    let undefined = rt.undefined();
    let pending = rt.resume(task, undefined).unwrap();
    assert_eq!(rt.interrupt_kind(pending), Some(core_types::InterruptKind::Await));
    let awaited = rt.interrupt_value(pending).unwrap();
    assert_eq!(number(&rt, awaited), Some(5.0));

    rt.collect_garbage();

    let input = rt.number(10.0);
    let result = rt.resume(task, input).unwrap();
    assert_eq!(number(&rt, result), Some(11.0));
}

#[test]
fn test_exception_inside_generator_finishes_it() {
    let mut rt = Runtime::new();
    let generator = eval(&mut rt, |b| {
        let body = b.new_label();
        define_function(b, Opcode::PushGenerator, "bad", body);
        b.load("bad").op(Opcode::PushArray).call(Opcode::Call, 1, 1).op(Opcode::Ret);
        b.bind(body);
        b.push_string("no").op(Opcode::Throw);
    })
    .unwrap();

    let undefined = rt.undefined();
    assert!(rt.resume(generator, undefined).is_err());
    assert_eq!(rt.resume(generator, undefined).unwrap(), rt.undefined());
}
