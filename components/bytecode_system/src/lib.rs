//! Bytecode system for the JavaScript runtime
//!
//! This crate provides the instruction set definition, the [`Program`]
//! container consumed by the interpreter, a [`ProgramBuilder`] for emitting
//! code, and the binary file format.
//!
//! # Features
//!
//! - Stack-machine bytecode with fixed-width operands
//! - String constant pool shared by all instructions of a program
//! - Binary serialization support
//! - Disassembler
//!
//! # Example
//!
//! ```
//! use bytecode_system::{Opcode, Program, ProgramBuilder};
//!
//! let mut b = ProgramBuilder::new("main.js");
//! b.push_number(42.0);
//! b.op(Opcode::Ret);
//! let program = b.build().unwrap();
//!
//! // Serialize
//! let bytes = program.to_bytes().unwrap();
//! let restored = Program::from_bytes(&bytes).unwrap();
//! assert_eq!(restored, program);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod error;
pub mod instruction;
pub mod opcode;
pub mod program;

// Re-export main types at crate root
pub use builder::{Label, ProgramBuilder};
pub use error::{BuildError, DecodeError};
pub use instruction::{Instruction, OperandValue};
pub use opcode::{Opcode, Operand};
pub use program::Program;
