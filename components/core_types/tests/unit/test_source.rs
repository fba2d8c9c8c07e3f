//! Unit tests for source positions and stack frames

use core_types::{SourcePosition, StackFrame};

#[test]
fn test_source_position_equality() {
    let a = SourcePosition {
        line: 1,
        column: 2,
        offset: 3,
    };
    assert_eq!(a.clone(), a);
}

#[test]
fn test_frame_display_with_name() {
    let frame = StackFrame {
        function_name: Some("compute".to_string()),
        source_url: Some("lib.js".to_string()),
        line: 12,
        column: 4,
    };
    assert_eq!(frame.to_string(), "at compute (lib.js:12:4)");
}

#[test]
fn test_frame_display_empty_name_is_anonymous() {
    let frame = StackFrame {
        function_name: Some(String::new()),
        source_url: Some("lib.js".to_string()),
        line: 1,
        column: 1,
    };
    assert_eq!(frame.to_string(), "at <anonymous> (lib.js:1:1)");
}
