//! Bytecode interpreter for the JavaScript runtime
//!
//! This crate provides the execution core:
//! - A [`Runtime`] owning the handle heap, the scope chain and the intrinsics
//! - A stack [`Vm`] executing [`bytecode_system::Program`]s, with try and
//!   label frames and resumable suspension for `await`/`yield`
//! - Property access with descriptors, accessors and prototype chains
//! - Lexical scopes with `var`/`const`/`using`/`await using` bindings
//! - Errors carried in-band as exception handles
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use bytecode_system::{Opcode, ProgramBuilder};
//! use interpreter::Runtime;
//!
//! let mut b = ProgramBuilder::new("example.js");
//! b.push_number(40.0).push_number(2.0).op(Opcode::Add).op(Opcode::Ret);
//! let program = Rc::new(b.build().unwrap());
//!
//! let mut rt = Runtime::new();
//! let result = rt.eval(program).unwrap();
//! assert_eq!(rt.to_number(result).unwrap(), 42.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builtins;
pub mod coerce;
pub mod config;
mod dispatch;
pub mod error;
pub mod function;
mod gc;
pub mod heap_data;
pub mod object;
pub mod ops;
pub mod runtime;
pub mod scope;
pub mod vm;

// Re-export main types at crate root
pub use builtins::{Intrinsics, WellKnownSymbols};
pub use coerce::{Numeric, PreferredType, PRIMITIVE_VALUE_SLOT};
pub use config::{RuntimeConfig, DEFAULT_MAX_CALL_DEPTH};
pub use function::COROUTINE_SLOT;
pub use heap_data::{BindingData, BindingKind, HeapData, ScopeData};
pub use ops::{BinaryOp, CompareOp, UnaryOp};
pub use runtime::{JsResult, NativeFn, Runtime};
pub use vm::{Completion, Vm};
