//! Tagged JavaScript value representation.
//!
//! Every datum the runtime handles is a [`Value`]. The set of kinds is
//! closed; operations dispatch on the kind with a `match` rather than through
//! per-kind function tables. Object-like kinds own their property table
//! directly, and references to other values are [`HandleId`]s into the
//! handle arena.

use std::fmt;

use num_bigint::BigInt;
use num_traits::Zero;

use crate::callable::CallableData;
use crate::error::ErrorKind;
use crate::interrupt::InterruptData;
use crate::object::{ObjectData, SymbolId};
use crate::{HandleId, StackFrame};

/// Discriminant of a [`Value`].
///
/// The ordering is meaningful: every kind at or above [`ValueKind::Object`]
/// carries an [`ObjectData`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueKind {
    /// Suspended execution
    Interrupt,
    /// Thrown value in flight
    Exception,
    /// Binding declared but not yet initialized
    Uninitialized,
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// IEEE 754 number
    Number,
    /// Arbitrary precision integer
    BigInt,
    /// `true` or `false`
    Boolean,
    /// String
    String,
    /// Symbol
    Symbol,
    /// Plain object
    Object,
    /// Error object
    Error,
    /// Array
    Array,
    /// Function
    Function,
}

/// Payload of a symbol value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolData {
    /// Identity shared by all copies of this symbol
    pub id: SymbolId,
    /// Description given at creation
    pub description: Option<String>,
}

/// Payload of an error value
#[derive(Debug, Clone)]
pub struct ErrorObject {
    /// Property table and prototype
    pub object: ObjectData,
    /// Constructor kind
    pub kind: ErrorKind,
    /// Message given at creation
    pub message: String,
    /// Call stack captured at creation, innermost first
    pub stack: Vec<StackFrame>,
}

/// Payload of a function value
#[derive(Debug, Clone)]
pub struct FunctionObject {
    /// Property table and prototype
    pub object: ObjectData,
    /// Entry point, flags and closure
    pub callable: CallableData,
}

/// Represents any value the runtime can hold.
///
/// # Examples
///
/// ```
/// use core_types::{Value, ValueKind};
///
/// let number = Value::Number(42.0);
/// assert!(number.to_boolean());
/// assert_eq!(number.type_name(), "number");
/// assert!(Value::Null.kind() < ValueKind::Object);
/// ```
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Suspended VM state produced by `await` or `yield`
    Interrupt(Box<InterruptData>),
    /// Thrown value travelling to the nearest handler
    Exception(HandleId),
    /// Marker stored in bindings before initialization
    Uninitialized,
    /// JavaScript undefined value
    #[default]
    Undefined,
    /// JavaScript null value
    Null,
    /// IEEE 754 double-precision floating point
    Number(f64),
    /// JavaScript BigInt (arbitrary precision integer)
    BigInt(BigInt),
    /// JavaScript boolean (true or false)
    Boolean(bool),
    /// JavaScript string value
    String(String),
    /// Symbol
    Symbol(SymbolData),
    /// Plain object
    Object(Box<ObjectData>),
    /// Error object
    Error(Box<ErrorObject>),
    /// Array; elements are index-keyed properties
    Array(Box<ObjectData>),
    /// Function
    Function(Box<FunctionObject>),
}

impl Value {
    /// Plain object with the given prototype
    pub fn object(prototype: Option<HandleId>) -> Self {
        Value::Object(Box::new(ObjectData::new(prototype)))
    }

    /// Empty array with the given prototype
    pub fn array(prototype: Option<HandleId>) -> Self {
        Value::Array(Box::new(ObjectData::new(prototype)))
    }

    /// Function value
    pub fn function(prototype: Option<HandleId>, callable: CallableData) -> Self {
        Value::Function(Box::new(FunctionObject {
            object: ObjectData::new(prototype),
            callable,
        }))
    }

    /// Error value with an empty stack
    pub fn error(prototype: Option<HandleId>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Value::Error(Box::new(ErrorObject {
            object: ObjectData::new(prototype),
            kind,
            message: message.into(),
            stack: Vec::new(),
        }))
    }

    /// String value
    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    /// Kind discriminant
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Interrupt(_) => ValueKind::Interrupt,
            Value::Exception(_) => ValueKind::Exception,
            Value::Uninitialized => ValueKind::Uninitialized,
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Number(_) => ValueKind::Number,
            Value::BigInt(_) => ValueKind::BigInt,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::String(_) => ValueKind::String,
            Value::Symbol(_) => ValueKind::Symbol,
            Value::Object(_) => ValueKind::Object,
            Value::Error(_) => ValueKind::Error,
            Value::Array(_) => ValueKind::Array,
            Value::Function(_) => ValueKind::Function,
        }
    }

    /// Result of the `typeof` operator
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Interrupt(_) => "interrupt",
            Value::Exception(_) => "exception",
            Value::Uninitialized | Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Object(_) | Value::Error(_) | Value::Array(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Truthiness
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Uninitialized | Value::Undefined | Value::Null => false,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(n) => !n.is_zero(),
            Value::Boolean(b) => *b,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    /// `undefined` or `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Whether the value carries a property table
    pub fn is_object_like(&self) -> bool {
        self.kind() >= ValueKind::Object
    }

    /// Whether the value can be called
    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Property table of an object-like value
    pub fn as_object(&self) -> Option<&ObjectData> {
        match self {
            Value::Object(obj) | Value::Array(obj) => Some(obj),
            Value::Error(err) => Some(&err.object),
            Value::Function(func) => Some(&func.object),
            _ => None,
        }
    }

    /// Mutable property table of an object-like value
    pub fn as_object_mut(&mut self) -> Option<&mut ObjectData> {
        match self {
            Value::Object(obj) | Value::Array(obj) => Some(obj),
            Value::Error(err) => Some(&mut err.object),
            Value::Function(func) => Some(&mut func.object),
            _ => None,
        }
    }

    /// Callable part of a function value
    pub fn as_callable(&self) -> Option<&CallableData> {
        match self {
            Value::Function(func) => Some(&func.callable),
            _ => None,
        }
    }

    /// Mutable callable part of a function value
    pub fn as_callable_mut(&mut self) -> Option<&mut CallableData> {
        match self {
            Value::Function(func) => Some(&mut func.callable),
            _ => None,
        }
    }

    /// Number payload
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// String payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Symbol payload
    pub fn as_symbol(&self) -> Option<&SymbolData> {
        match self {
            Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Interrupt payload
    pub fn as_interrupt(&self) -> Option<&InterruptData> {
        match self {
            Value::Interrupt(i) => Some(i),
            _ => None,
        }
    }

    /// Handles this value keeps alive
    pub fn references(&self, out: &mut Vec<HandleId>) {
        match self {
            Value::Interrupt(interrupt) => interrupt.references(out),
            Value::Exception(thrown) => out.push(*thrown),
            Value::Function(func) => {
                func.object.references(out);
                func.callable.references(out);
            }
            _ => {
                if let Some(obj) = self.as_object() {
                    obj.references(out);
                }
            }
        }
    }

    /// Handles this value observes without keeping alive
    pub fn weak_references(&self, out: &mut Vec<HandleId>) {
        if let Some(obj) = self.as_object() {
            obj.weak_references(out);
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
