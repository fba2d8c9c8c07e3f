//! Function payload: native entry or bytecode entry plus closure table.

use std::rc::Rc;

use bytecode_system::Program;
use indexmap::IndexMap;

use crate::HandleId;

/// Index of a host function in the runtime's native registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeFunctionId(pub u32);

/// Where execution starts when a function is called
#[derive(Debug, Clone)]
pub enum FunctionBody {
    /// Host function
    Native(NativeFunctionId),
    /// Bytecode function entered at `address` of `program`
    Bytecode {
        /// Program holding the function body
        program: Rc<Program>,
        /// Entry offset
        address: usize,
    },
}

/// Callable part of a function value
#[derive(Debug, Clone)]
pub struct CallableData {
    /// Display name, empty for anonymous functions
    pub name: String,
    /// Entry point
    pub body: FunctionBody,
    /// Source text shown by `Function.prototype.toString`
    pub source: Option<String>,
    /// `async` function
    pub is_async: bool,
    /// Generator function
    pub is_generator: bool,
    /// Arrow function: uses the bound receiver instead of the call receiver
    pub is_lambda: bool,
    /// Captured bindings by variable name
    pub closure: IndexMap<String, HandleId>,
    /// Receiver bound at creation (arrow functions)
    pub bind: Option<HandleId>,
}

impl CallableData {
    /// Native function with the given name
    pub fn native(name: impl Into<String>, id: NativeFunctionId) -> Self {
        Self::with_body(name, FunctionBody::Native(id))
    }

    /// Bytecode function entered at `address`
    pub fn bytecode(program: Rc<Program>, address: usize) -> Self {
        Self::with_body(String::new(), FunctionBody::Bytecode { program, address })
    }

    fn with_body(name: impl Into<String>, body: FunctionBody) -> Self {
        Self {
            name: name.into(),
            body,
            source: None,
            is_async: false,
            is_generator: false,
            is_lambda: false,
            closure: IndexMap::new(),
            bind: None,
        }
    }

    /// Whether the function is implemented by the host
    pub fn is_native(&self) -> bool {
        matches!(self.body, FunctionBody::Native(_))
    }

    /// Whether a call produces a coroutine instead of running the body
    pub fn is_coroutine(&self) -> bool {
        self.is_async || self.is_generator
    }

    /// Strong references held by the callable part
    pub fn references(&self, out: &mut Vec<HandleId>) {
        out.extend(self.closure.values().copied());
        out.extend(self.bind);
    }
}
