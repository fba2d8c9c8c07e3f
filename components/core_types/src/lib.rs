//! Core value model of the runtime.
//!
//! This crate provides the data types every other component shares: handle
//! identifiers, the tagged [`Value`] enum and its object, callable and
//! interrupt payloads, and the error types reported to embedders.
//!
//! # Overview
//!
//! - [`HandleId`] - Generation-checked reference into the handle arena
//! - [`Value`] - Tagged representation of JavaScript values
//! - [`ObjectData`] - Ordered property table, prototype and internal slots
//! - [`CallableData`] - Native or bytecode entry point plus closure table
//! - [`InterruptData`] - Suspended VM state produced by `await`/`yield`
//! - [`JsError`] - Report of an uncaught error with stack trace
//!
//! # Examples
//!
//! ```
//! use core_types::{HandleId, PropertyDescriptor, PropertyKey, Value};
//!
//! let mut obj = Value::object(None);
//! let answer = HandleId::new(1, 0);
//! if let Some(data) = obj.as_object_mut() {
//!     data.properties
//!         .insert(PropertyKey::from("answer"), PropertyDescriptor::data(answer));
//! }
//!
//! let data = obj.as_object().unwrap();
//! assert_eq!(data.get_own(&"answer".into()).and_then(|d| d.value()), Some(answer));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod callable;
mod error;
mod handle;
mod interrupt;
mod number;
mod object;
mod source;
mod value;

pub use callable::{CallableData, FunctionBody, NativeFunctionId};
pub use error::{ErrorKind, JsError};
pub use handle::HandleId;
pub use interrupt::{
    InterruptData, InterruptKind, JumpTarget, LabelFrame, LabelKind, PendingCompletion, TryFrame,
    TryState, VmState,
};
pub use number::{number_to_string, string_to_number, to_int32, to_uint32};
pub use object::{
    Attachments, ObjectData, PropertyDescriptor, PropertyKey, PropertyMap, PropertySlot,
    SymbolId, SymbolKey, WeakTable,
};
pub use source::{SourcePosition, StackFrame};
pub use value::{ErrorObject, FunctionObject, SymbolData, Value, ValueKind};
