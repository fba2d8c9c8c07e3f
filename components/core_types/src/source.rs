//! Source locations and call-stack frames attached to error values.

use std::fmt;

/// Where an error was raised: the line and column of the innermost call
/// plus the code offset of the faulting instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Code offset of the instruction that raised the error
    pub offset: usize,
}

/// One entry of a captured call stack.
///
/// Frames are recorded by call instructions and copied into every error
/// value created while the call is active.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame {
///     function_name: Some("myFunction".to_string()),
///     source_url: Some("main.js".to_string()),
///     line: 25,
///     column: 10,
/// };
///
/// assert_eq!(frame.to_string(), "at myFunction (main.js:25:10)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the function, or None for anonymous functions
    pub function_name: Option<String>,
    /// URL or file path of the source, or None if not available
    pub source_url: Option<String>,
    /// Line number where the call occurred
    pub line: u32,
    /// Column number where the call occurred
    pub column: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.function_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => "<anonymous>",
        };
        let url = self.source_url.as_deref().unwrap_or("<unknown>");
        write!(f, "at {} ({}:{}:{})", name, url, self.line, self.column)
    }
}
