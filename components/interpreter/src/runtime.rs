//! The runtime: handle arena, scope chain, intrinsics and native registry.
//!
//! A [`Runtime`] is threaded explicitly through every operation; there is no
//! process-wide state. The current scope is a field of the runtime and every
//! value allocated through [`Runtime::alloc`] is linked under it, so a value
//! lives at least as long as the scope that created it.

use std::rc::Rc;

use bytecode_system::Program;
use core_types::{
    CallableData, HandleId, NativeFunctionId, StackFrame, SymbolData, SymbolId, Value, ValueKind,
};
use memory_manager::Heap;
use num_bigint::BigInt;

use crate::builtins::{self, Intrinsics};
use crate::config::RuntimeConfig;
use crate::heap_data::{HeapData, ScopeData};
use crate::vm::Vm;

/// Result of a fallible runtime operation.
///
/// The error side is a handle to an exception value wrapping whatever was
/// thrown. Nothing unwinds the host stack.
pub type JsResult<T = HandleId> = Result<T, HandleId>;

/// Host function signature: runtime, receiver, arguments
pub type NativeFn = fn(&mut Runtime, HandleId, &[HandleId]) -> JsResult;

#[derive(Clone)]
struct NativeEntry {
    name: String,
    func: NativeFn,
}

/// Execution environment for bytecode programs.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use bytecode_system::{Opcode, ProgramBuilder};
/// use interpreter::Runtime;
///
/// let mut builder = ProgramBuilder::new("main.js");
/// builder.push_number(40.0).push_number(2.0).op(Opcode::Add).op(Opcode::Ret);
/// let program = Rc::new(builder.build().unwrap());
///
/// let mut rt = Runtime::new();
/// let result = rt.eval(program).unwrap();
/// assert_eq!(rt.value(result).and_then(|v| v.as_number()), Some(42.0));
/// ```
pub struct Runtime {
    pub(crate) heap: Heap<HeapData>,
    pub(crate) config: RuntimeConfig,
    pub(crate) global: HandleId,
    pub(crate) scope: HandleId,
    pub(crate) intrinsics: Intrinsics,
    natives: Vec<NativeEntry>,
    pub(crate) call_stack: Vec<StackFrame>,
    /// Handles held by host frames, treated as roots by the collector
    pub(crate) pinned: Vec<HandleId>,
    next_symbol_id: u64,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("live_handles", &self.heap.live_count())
            .field("global", &self.global)
            .field("scope", &self.scope)
            .field("natives", &self.natives.len())
            .field("call_depth", &self.call_stack.len())
            .finish()
    }
}

impl Runtime {
    /// Create a runtime with the default configuration
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime with an explicit configuration
    pub fn with_config(config: RuntimeConfig) -> Self {
        let mut heap = Heap::new(config.gc_config());
        let global = heap.alloc(HeapData::Scope(ScopeData::new(None, None)));
        heap.set_root(global, true);
        let intrinsics = Intrinsics::allocate(&mut heap, global);
        let mut rt = Self {
            heap,
            config,
            global,
            scope: global,
            intrinsics,
            natives: Vec::new(),
            call_stack: Vec::new(),
            pinned: Vec::new(),
            next_symbol_id: builtins::FIRST_USER_SYMBOL,
        };
        builtins::install(&mut rt);
        rt
    }

    /// Active configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The handle arena
    pub fn heap(&self) -> &Heap<HeapData> {
        &self.heap
    }

    /// Intrinsic objects
    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Global scope
    pub fn global_scope(&self) -> HandleId {
        self.global
    }

    /// Scope that new allocations are linked under
    pub fn current_scope(&self) -> HandleId {
        self.scope
    }

    /// Stack frames of the calls in progress, outermost first
    pub fn call_stack(&self) -> &[StackFrame] {
        &self.call_stack
    }

    /// Whether `handle` is still allocated
    pub fn is_alive(&self, handle: HandleId) -> bool {
        self.heap.contains(handle)
    }

    /// Value held by a handle
    pub fn value(&self, handle: HandleId) -> Option<&Value> {
        self.heap.get(handle).and_then(HeapData::as_value)
    }

    /// Mutable value held by a handle
    pub fn value_mut(&mut self, handle: HandleId) -> Option<&mut Value> {
        self.heap.get_mut(handle).and_then(HeapData::as_value_mut)
    }

    /// Kind of the value held by a handle; dead or non-value handles read as
    /// `undefined`
    pub fn kind(&self, handle: HandleId) -> ValueKind {
        self.value(handle)
            .map(Value::kind)
            .unwrap_or(ValueKind::Undefined)
    }

    /// Allocate a value without linking it anywhere
    pub(crate) fn alloc_unlinked(&mut self, value: Value) -> HandleId {
        let handle = self.heap.alloc(HeapData::Value(value));
        let mut refs = Vec::new();
        let mut weak = Vec::new();
        if let Some(data) = self.heap.get(handle) {
            memory_manager::Trace::trace(data, &mut refs);
            memory_manager::Trace::trace_weak(data, &mut weak);
        }
        for child in refs {
            self.heap.link(handle, child);
        }
        for target in weak {
            self.heap.link_weak(handle, target);
        }
        handle
    }

    /// Allocate a value owned by the current scope.
    ///
    /// Handles referenced by the value are linked under the new handle.
    pub fn alloc(&mut self, value: Value) -> HandleId {
        let handle = self.alloc_unlinked(value);
        self.heap.link(self.scope, handle);
        handle
    }

    /// Record a strong edge
    pub fn link(&mut self, parent: HandleId, child: HandleId) -> bool {
        self.heap.link(parent, child)
    }

    /// Remove a strong edge
    pub fn unlink(&mut self, parent: HandleId, child: HandleId) -> bool {
        self.heap.unlink(parent, child)
    }

    /// Shared `undefined`
    pub fn undefined(&self) -> HandleId {
        self.intrinsics.undefined
    }

    /// Shared `null`
    pub fn null(&self) -> HandleId {
        self.intrinsics.null
    }

    /// Shared binding marker for uninitialized variables
    pub fn uninitialized(&self) -> HandleId {
        self.intrinsics.uninitialized
    }

    /// Shared `true` or `false`
    pub fn boolean(&self, value: bool) -> HandleId {
        if value {
            self.intrinsics.true_value
        } else {
            self.intrinsics.false_value
        }
    }

    /// New number
    pub fn number(&mut self, value: f64) -> HandleId {
        self.alloc(Value::Number(value))
    }

    /// New string
    pub fn string(&mut self, value: impl Into<String>) -> HandleId {
        self.alloc(Value::String(value.into()))
    }

    /// New BigInt
    pub fn bigint(&mut self, value: BigInt) -> HandleId {
        self.alloc(Value::BigInt(value))
    }

    /// New unique symbol
    pub fn symbol(&mut self, description: Option<String>) -> HandleId {
        let id = self.next_symbol();
        self.alloc(Value::Symbol(SymbolData { id, description }))
    }

    pub(crate) fn next_symbol(&mut self) -> SymbolId {
        let id = SymbolId(self.next_symbol_id);
        self.next_symbol_id += 1;
        id
    }

    /// Register a host function and return its id
    pub fn register_native(&mut self, name: &str, func: NativeFn) -> NativeFunctionId {
        self.natives.push(NativeEntry {
            name: name.to_string(),
            func,
        });
        NativeFunctionId((self.natives.len() - 1) as u32)
    }

    pub(crate) fn native(&self, id: NativeFunctionId) -> Option<NativeFn> {
        self.natives.get(id.0 as usize).map(|entry| entry.func)
    }

    pub(crate) fn native_name(&self, id: NativeFunctionId) -> Option<&str> {
        self.natives.get(id.0 as usize).map(|entry| entry.name.as_str())
    }

    /// Create a function object backed by a host function
    pub fn create_native_function(&mut self, name: &str, func: NativeFn) -> HandleId {
        let id = self.register_native(name, func);
        let proto = self.intrinsics.function_prototype;
        self.alloc(Value::function(Some(proto), CallableData::native(name, id)))
    }

    /// Run a program in the global scope.
    ///
    /// Returns the completion value, an interrupt handle if the program
    /// suspended at a top-level `await`, or the uncaught exception.
    pub fn eval(&mut self, program: Rc<Program>) -> JsResult {
        tracing::debug!(filename = %program.filename, len = program.len(), "eval");
        let this = self.undefined();
        let vm = Vm::new(program, 0, self.global, this, false);
        vm.run(self).into_result()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
