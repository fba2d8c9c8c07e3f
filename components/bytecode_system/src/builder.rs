//! Program builder with forward labels
//!
//! The compiler front end is external to the runtime; this builder is the
//! emitter it (and the test suites) use to produce well-formed programs.
//!
//! # Example
//!
//! ```
//! use bytecode_system::{Opcode, ProgramBuilder};
//!
//! let mut b = ProgramBuilder::new("example.js");
//! let done = b.new_label();
//! b.push_number(1.0);
//! b.jump(Opcode::JTrue, done);
//! b.push_number(2.0);
//! b.bind(done);
//! b.op(Opcode::Ret);
//! let program = b.build().unwrap();
//! assert!(!program.is_empty());
//! ```

use std::collections::HashMap;

use crate::error::BuildError;
use crate::opcode::{Opcode, Operand};
use crate::program::Program;

/// Forward-referenceable code position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// Incremental program emitter
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    filename: String,
    code: Vec<u8>,
    constants: Vec<String>,
    interned: HashMap<String, usize>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Label)>,
}

impl ProgramBuilder {
    /// Create a builder for a program compiled from `filename`
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Current code offset
    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Allocate an unbound label
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind a label to the current position
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    /// Intern a string constant and return its index
    pub fn constant(&mut self, value: &str) -> usize {
        if let Some(&idx) = self.interned.get(value) {
            return idx;
        }
        let idx = self.constants.len();
        self.constants.push(value.to_string());
        self.interned.insert(value.to_string(), idx);
        idx
    }

    fn emit_code(&mut self, opcode: Opcode) {
        self.code.extend_from_slice(&opcode.to_u16().to_le_bytes());
    }

    fn emit_string(&mut self, value: &str) {
        let idx = self.constant(value) as u64;
        self.code.extend_from_slice(&idx.to_le_bytes());
    }

    fn emit_label(&mut self, label: Label) {
        self.fixups.push((self.code.len(), label));
        self.code.extend_from_slice(&0u64.to_le_bytes());
    }

    /// Emit an opcode without operands
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        debug_assert!(opcode.operands().is_empty(), "{} takes operands", opcode);
        self.emit_code(opcode);
        self
    }

    /// Emit an opcode with a single string operand
    pub fn op_str(&mut self, opcode: Opcode, value: &str) -> &mut Self {
        debug_assert_eq!(opcode.operands(), &[Operand::String]);
        self.emit_code(opcode);
        self.emit_string(value);
        self
    }

    /// Emit an opcode with a single number operand
    pub fn op_num(&mut self, opcode: Opcode, value: f64) -> &mut Self {
        debug_assert_eq!(opcode.operands(), &[Operand::Number]);
        self.emit_code(opcode);
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Emit an opcode with a single integer operand
    pub fn op_int(&mut self, opcode: Opcode, value: i32) -> &mut Self {
        debug_assert_eq!(opcode.operands(), &[Operand::Integer]);
        self.emit_code(opcode);
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Emit an opcode with a single absolute address operand
    pub fn op_addr(&mut self, opcode: Opcode, address: usize) -> &mut Self {
        debug_assert_eq!(opcode.operands(), &[Operand::Address]);
        self.emit_code(opcode);
        self.code.extend_from_slice(&(address as u64).to_le_bytes());
        self
    }

    /// Emit a jump-like opcode targeting a label
    pub fn jump(&mut self, opcode: Opcode, target: Label) -> &mut Self {
        debug_assert_eq!(opcode.operands(), &[Operand::Address]);
        self.emit_code(opcode);
        self.emit_label(target);
        self
    }

    /// Emit a call-like opcode carrying a source location
    pub fn call(&mut self, opcode: Opcode, line: i32, column: i32) -> &mut Self {
        debug_assert_eq!(opcode.operands(), &[Operand::Integer, Operand::Integer]);
        self.emit_code(opcode);
        self.code.extend_from_slice(&line.to_le_bytes());
        self.code.extend_from_slice(&column.to_le_bytes());
        self
    }

    /// Emit `TRY_BEGIN`; a missing label encodes as address 0
    pub fn try_begin(&mut self, catch: Option<Label>, finally: Option<Label>) -> &mut Self {
        self.emit_code(Opcode::TryBegin);
        for target in [catch, finally] {
            match target {
                Some(label) => self.emit_label(label),
                None => self.code.extend_from_slice(&0u64.to_le_bytes()),
            }
        }
        self
    }

    /// Emit `PUSH_BREAK_LABEL` or `PUSH_CONTINUE_LABEL`
    pub fn label_frame(&mut self, opcode: Opcode, name: &str, target: Label) -> &mut Self {
        debug_assert_eq!(opcode.operands(), &[Operand::String, Operand::Address]);
        self.emit_code(opcode);
        self.emit_string(name);
        self.emit_label(target);
        self
    }

    /// Emit `PUSH_NUMBER`
    pub fn push_number(&mut self, value: f64) -> &mut Self {
        self.op_num(Opcode::PushNumber, value)
    }

    /// Emit `PUSH_STRING`
    pub fn push_string(&mut self, value: &str) -> &mut Self {
        self.op_str(Opcode::PushString, value)
    }

    /// Emit `LOAD`
    pub fn load(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::Load, name)
    }

    /// Emit `DEF`
    pub fn def(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::Def, name)
    }

    /// Emit `STORE`
    pub fn store(&mut self, name: &str) -> &mut Self {
        self.op_str(Opcode::Store, name)
    }

    /// Emit the sequence that pushes `host[name]` given the host on top
    pub fn get_named(&mut self, name: &str) -> &mut Self {
        self.push_string(name);
        self.op(Opcode::GetField)
    }

    /// Resolve labels and produce the program
    pub fn build(self) -> Result<Program, BuildError> {
        let mut code = self.code;
        for (at, label) in self.fixups {
            let target = self.labels[label.0].ok_or(BuildError::UnboundLabel(label.0))?;
            code[at..at + 8].copy_from_slice(&(target as u64).to_le_bytes());
        }
        Ok(Program {
            filename: self.filename,
            code,
            constants: self.constants,
        })
    }
}
