//! Runtime orchestration for program execution
//!
//! The [`Runtime`] facade owns an interpreter runtime and turns files or
//! byte buffers into printable outcomes.

use std::path::Path;
use std::rc::Rc;

use bytecode_system::Program;
use interpreter::RuntimeConfig;

use crate::error::{CliError, CliResult};

/// Loads serialized programs and runs them on one interpreter runtime
pub struct Runtime {
    /// Interpreter state shared by every program executed here
    inner: interpreter::Runtime,
    /// Print the disassembly instead of running
    disassemble: bool,
}

impl Runtime {
    /// Create a runtime with the given configuration
    ///
    /// # Example
    /// ```
    /// use interpreter::RuntimeConfig;
    /// use js_cli::Runtime;
    ///
    /// let runtime = Runtime::new(RuntimeConfig::default());
    /// ```
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            inner: interpreter::Runtime::with_config(config),
            disassemble: false,
        }
    }

    /// Enable disassembly output
    pub fn with_disassemble(mut self, enabled: bool) -> Self {
        self.disassemble = enabled;
        self
    }

    /// Execute a serialized program file.
    ///
    /// Returns the text to print: the disassembly, or the completion value
    /// unless it is `undefined`.
    ///
    /// # Errors
    /// Returns `CliError` if the file cannot be read or decoded, or if the
    /// program throws.
    ///
    /// # Example
    /// ```no_run
    /// use interpreter::RuntimeConfig;
    /// use js_cli::Runtime;
    ///
    /// let mut runtime = Runtime::new(RuntimeConfig::default());
    /// let output = runtime.execute_file("example.njbc").unwrap();
    /// ```
    pub fn execute_file(&mut self, path: impl AsRef<Path>) -> CliResult<Option<String>> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| CliError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.execute_bytes(&bytes)
    }

    /// Execute a program from its serialized form
    pub fn execute_bytes(&mut self, bytes: &[u8]) -> CliResult<Option<String>> {
        let program = Program::from_bytes(bytes)?;
        tracing::debug!(filename = %program.filename, len = program.len(), "program loaded");
        if self.disassemble {
            return Ok(Some(program.disassemble()?));
        }
        self.execute(Rc::new(program))
    }

    /// Run an already decoded program
    pub fn execute(&mut self, program: Rc<Program>) -> CliResult<Option<String>> {
        match self.inner.eval(program) {
            Ok(value) if value == self.inner.undefined() => Ok(None),
            Ok(value) => Ok(Some(self.inner.display(value))),
            Err(exception) => {
                let report = self.inner.report(exception);
                tracing::debug!(kind = %report.kind, message = %report.message, "uncaught exception");
                Err(CliError::Uncaught(report))
            }
        }
    }

    /// The underlying interpreter runtime
    pub fn interpreter(&mut self) -> &mut interpreter::Runtime {
        &mut self.inner
    }
}
