//! Payloads stored in the runtime's handle arena.
//!
//! Besides values the arena holds the two kinds of environment record the
//! VM needs: scopes (one per block or function activation) and bindings
//! (one per variable). Closures capture bindings, not scopes, so a scope
//! can die while the variables a closure uses stay alive.

use core_types::{HandleId, Value};
use indexmap::IndexMap;
use memory_manager::Trace;

/// Declaration kind of a binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    /// `var` or `let`
    Var,
    /// `const`
    Const,
    /// `using`: disposed with `Symbol.dispose` at scope exit
    Using,
    /// `await using`: disposed with `Symbol.asyncDispose` at scope exit
    AwaitUsing,
}

/// One variable cell
#[derive(Debug, Clone)]
pub struct BindingData {
    /// Current value
    pub value: HandleId,
    /// Declaration kind
    pub kind: BindingKind,
    /// Disposal already ran
    pub disposed: bool,
}

/// Lexical environment record
#[derive(Debug, Clone, Default)]
pub struct ScopeData {
    /// Where name lookup continues; not an ownership edge
    pub parent: Option<HandleId>,
    /// Scope this one is linked under while active
    pub owner: Option<HandleId>,
    /// Nested scopes pushed while this one is current
    pub children: Vec<HandleId>,
    /// Bindings by name
    pub variables: IndexMap<String, HandleId>,
    /// `using`/`await using` bindings in declaration order
    pub disposables: Vec<HandleId>,
    /// First error raised by a disposer, rethrown once the scope is gone
    pub dispose_error: Option<HandleId>,
}

impl ScopeData {
    /// Scope with the given lookup parent and owner
    pub fn new(parent: Option<HandleId>, owner: Option<HandleId>) -> Self {
        Self {
            parent,
            owner,
            ..Self::default()
        }
    }
}

/// Payload of one handle
#[derive(Debug, Clone)]
pub enum HeapData {
    /// Language value
    Value(Value),
    /// Environment record
    Scope(ScopeData),
    /// Variable cell
    Binding(BindingData),
}

impl HeapData {
    /// The value, if this handle holds one
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            HeapData::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Mutable value
    pub fn as_value_mut(&mut self) -> Option<&mut Value> {
        match self {
            HeapData::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The scope record, if this handle holds one
    pub fn as_scope(&self) -> Option<&ScopeData> {
        match self {
            HeapData::Scope(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable scope record
    pub fn as_scope_mut(&mut self) -> Option<&mut ScopeData> {
        match self {
            HeapData::Scope(s) => Some(s),
            _ => None,
        }
    }

    /// The binding, if this handle holds one
    pub fn as_binding(&self) -> Option<&BindingData> {
        match self {
            HeapData::Binding(b) => Some(b),
            _ => None,
        }
    }

    /// Mutable binding
    pub fn as_binding_mut(&mut self) -> Option<&mut BindingData> {
        match self {
            HeapData::Binding(b) => Some(b),
            _ => None,
        }
    }
}

impl Trace for HeapData {
    fn trace(&self, out: &mut Vec<HandleId>) {
        match self {
            HeapData::Value(value) => value.references(out),
            HeapData::Scope(scope) => {
                out.extend(scope.children.iter().copied());
                out.extend(scope.variables.values().copied());
                out.extend(scope.dispose_error);
            }
            HeapData::Binding(binding) => out.push(binding.value),
        }
    }

    fn trace_weak(&self, out: &mut Vec<HandleId>) {
        if let HeapData::Value(value) = self {
            value.weak_references(out);
        }
    }
}
