//! Unit tests for JsError and ErrorKind

use core_types::{ErrorKind, JsError, SourcePosition, StackFrame};

#[test]
fn test_error_display() {
    let error = JsError::new(ErrorKind::ReferenceError, "x is not defined");
    assert_eq!(error.to_string(), "ReferenceError: x is not defined");
    assert!(error.stack.is_empty());
    assert!(error.source_position.is_none());
}

#[test]
fn test_error_is_std_error() {
    fn takes_error(_: &dyn std::error::Error) {}
    takes_error(&JsError::new(ErrorKind::InternalError, "unknown opcode"));
}

#[test]
fn test_trace_lists_frames_in_order() {
    let frame = |name: &str, line| StackFrame {
        function_name: Some(name.to_string()),
        source_url: Some("app.js".to_string()),
        line,
        column: 1,
    };
    let mut error = JsError::new(ErrorKind::TypeError, "boom")
        .with_stack(vec![frame("inner", 2), frame("outer", 9)]);
    error.source_position = Some(SourcePosition {
        line: 2,
        column: 1,
        offset: 0,
    });
    let trace = error.format_trace();
    let lines: Vec<&str> = trace.lines().collect();
    assert_eq!(lines[0], "Uncaught TypeError: boom");
    assert_eq!(lines[1].trim(), "at inner (app.js:2:1)");
    assert_eq!(lines[2].trim(), "at outer (app.js:9:1)");
}
