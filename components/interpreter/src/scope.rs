//! Scopes, bindings and `using` disposal.
//!
//! A scope is owned by the scope that was current when it was entered and
//! looks names up through a separate `parent` chain. Function scopes use the
//! global scope as lookup parent and reach outer variables only through the
//! bindings captured in their closure table.

use core_types::{HandleId, PropertyKey, Value};

use crate::heap_data::{BindingData, BindingKind, HeapData, ScopeData};
use crate::runtime::{JsResult, Runtime};

/// Progress of a disposal pass over one scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DisposeStep {
    /// Every disposer ran
    Done,
    /// An `await using` disposer returned this value; the pass continues
    /// after it settles
    Await(HandleId),
}

impl Runtime {
    fn scope_data(&self, scope: HandleId) -> Option<&ScopeData> {
        self.heap.get(scope).and_then(HeapData::as_scope)
    }

    fn scope_data_mut(&mut self, scope: HandleId) -> Option<&mut ScopeData> {
        self.heap.get_mut(scope).and_then(HeapData::as_scope_mut)
    }

    fn binding_data(&self, binding: HandleId) -> Option<&BindingData> {
        self.heap.get(binding).and_then(HeapData::as_binding)
    }

    /// Enter a block scope nested in the current one
    pub fn push_scope(&mut self) -> HandleId {
        let current = self.scope;
        let scope = self.new_scope(Some(current), current);
        self.scope = scope;
        scope
    }

    /// Allocate a scope owned by `owner`. The current scope is unchanged.
    pub(crate) fn new_scope(&mut self, parent: Option<HandleId>, owner: HandleId) -> HandleId {
        let scope = self.heap.alloc(HeapData::Scope(ScopeData::new(parent, None)));
        self.attach_scope(scope, owner);
        scope
    }

    /// Make `owner` keep `scope` alive
    pub(crate) fn attach_scope(&mut self, scope: HandleId, owner: HandleId) {
        if let Some(data) = self.scope_data_mut(scope) {
            data.owner = Some(owner);
        }
        if let Some(data) = self.scope_data_mut(owner) {
            data.children.push(scope);
        }
        self.heap.link(owner, scope);
    }

    /// Cut `scope` loose from its owner and return the former owner
    pub(crate) fn detach_scope(&mut self, scope: HandleId) -> Option<HandleId> {
        let owner = self.scope_data_mut(scope)?.owner.take()?;
        if let Some(data) = self.scope_data_mut(owner) {
            data.children.retain(|&child| child != scope);
        }
        self.heap.unlink(owner, scope);
        Some(owner)
    }

    /// Leave the current scope, running its disposers to completion.
    ///
    /// Results of `await using` disposers are not awaited here; the VM
    /// suspends on them instead when it executes `POP_SCOPE`.
    pub fn pop_scope(&mut self) -> JsResult<()> {
        let scope = self.scope;
        if scope == self.global {
            return Err(self.internal_error("Cannot pop the global scope"));
        }
        while let DisposeStep::Await(value) = self.dispose_scope(scope) {
            tracing::trace!(%value, "async disposal result dropped during synchronous pop");
        }
        self.leave_scope(scope, &[])
    }

    /// Run the pending disposers of `scope` in reverse declaration order.
    ///
    /// Stops early when an `await using` disposer returns something other
    /// than `undefined`; calling again continues with the next disposer.
    pub(crate) fn dispose_scope(&mut self, scope: HandleId) -> DisposeStep {
        loop {
            let next = self.scope_data(scope).and_then(|data| {
                data.disposables.iter().rev().copied().find(|&binding| {
                    self.binding_data(binding)
                        .is_some_and(|b| !b.disposed)
                })
            });
            let Some(binding) = next else {
                return DisposeStep::Done;
            };
            let Some((resource, kind)) = self
                .heap
                .get_mut(binding)
                .and_then(HeapData::as_binding_mut)
                .map(|b| {
                    b.disposed = true;
                    (b.value, b.kind)
                })
            else {
                return DisposeStep::Done;
            };
            if self.is_nullish(resource) {
                continue;
            }
            let method = match self.disposer(resource, kind) {
                Ok(Some(method)) => method,
                Ok(None) => continue,
                Err(error) => {
                    self.record_dispose_error(scope, error);
                    continue;
                }
            };
            match self.call(method, resource, &[]) {
                Ok(result)
                    if kind == BindingKind::AwaitUsing
                        && !matches!(self.value(result), Some(Value::Undefined)) =>
                {
                    return DisposeStep::Await(result);
                }
                Ok(_) => {}
                Err(error) => self.record_dispose_error(scope, error),
            }
        }
    }

    fn disposer(&mut self, resource: HandleId, kind: BindingKind) -> JsResult<Option<HandleId>> {
        let symbols = self.intrinsics.symbols;
        let mut candidates = Vec::with_capacity(2);
        if kind == BindingKind::AwaitUsing {
            candidates.push(symbols.async_dispose);
        }
        candidates.push(symbols.dispose);
        for symbol in candidates {
            let Some(key) = self.symbol_key(symbol) else {
                continue;
            };
            let method = self.get(resource, &key)?;
            if self.is_callable(method) {
                return Ok(Some(method));
            }
        }
        Ok(None)
    }

    fn record_dispose_error(&mut self, scope: HandleId, error: HandleId) {
        tracing::debug!(%scope, "disposer failed");
        let Some(data) = self.scope_data_mut(scope) else {
            return;
        };
        if data.dispose_error.is_none() {
            data.dispose_error = Some(error);
            self.heap.link(scope, error);
        }
    }

    /// Detach `scope`, make its owner current and link `adopt` under the
    /// owner so values produced inside the scope outlive it.
    ///
    /// Returns the first disposer error, now owned by the owner scope.
    pub(crate) fn leave_scope(&mut self, scope: HandleId, adopt: &[HandleId]) -> JsResult<()> {
        let owner = self.detach_scope(scope).unwrap_or(self.global);
        self.scope = owner;
        for &handle in adopt {
            if self.heap.contains(handle) {
                self.heap.link(owner, handle);
            }
        }
        let error = self
            .scope_data_mut(scope)
            .and_then(|data| data.dispose_error.take());
        if let Some(error) = error {
            self.heap.link(owner, error);
        }
        self.maybe_collect();
        match error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Declare a binding in the current scope
    pub fn declare(&mut self, name: &str, value: HandleId, kind: BindingKind) -> JsResult<HandleId> {
        self.declare_in(self.scope, name, value, kind)
    }

    /// Declare a binding in `scope`.
    ///
    /// Redeclaring a name of the same scope initializes it when it is still
    /// uninitialized and is a `SyntaxError` otherwise.
    pub fn declare_in(
        &mut self,
        scope: HandleId,
        name: &str,
        value: HandleId,
        kind: BindingKind,
    ) -> JsResult<HandleId> {
        let existing = self
            .scope_data(scope)
            .and_then(|data| data.variables.get(name).copied());
        if let Some(binding) = existing {
            let current = self.binding_data(binding).map(|b| b.value);
            if current == Some(self.uninitialized()) {
                self.set_binding_value(binding, value);
                return Ok(binding);
            }
            return Err(self.syntax_error(format!("Identifier '{}' has already been declared", name)));
        }
        if self.scope_data(scope).is_none() {
            return Err(self.internal_error("Declaration outside of a scope"));
        }
        let binding = self.heap.alloc(HeapData::Binding(BindingData {
            value,
            kind,
            disposed: false,
        }));
        self.heap.link(binding, value);
        if let Some(data) = self.scope_data_mut(scope) {
            data.variables.insert(name.to_string(), binding);
            if matches!(kind, BindingKind::Using | BindingKind::AwaitUsing) {
                data.disposables.push(binding);
            }
        }
        self.heap.link(scope, binding);
        Ok(binding)
    }

    /// Install an existing binding under `name`, as done for closure captures
    pub(crate) fn bind_existing(&mut self, scope: HandleId, name: &str, binding: HandleId) {
        if let Some(data) = self.scope_data_mut(scope) {
            if let Some(previous) = data.variables.insert(name.to_string(), binding) {
                if previous != binding {
                    self.heap.replace_edge(scope, Some(previous), Some(binding));
                    return;
                }
            }
        }
        self.heap.link(scope, binding);
    }

    /// Find the binding for `name` starting at `scope`
    pub fn resolve(&self, scope: HandleId, name: &str) -> Option<HandleId> {
        let mut current = Some(scope);
        while let Some(handle) = current {
            let data = self.scope_data(handle)?;
            if let Some(&binding) = data.variables.get(name) {
                return Some(binding);
            }
            current = data.parent;
        }
        None
    }

    /// Read a variable visible from the current scope.
    ///
    /// Falls back to properties of `globalThis`.
    pub fn load(&mut self, name: &str) -> JsResult {
        if let Some(binding) = self.resolve(self.scope, name) {
            let value = self.binding_value(binding).unwrap_or(self.intrinsics.undefined);
            if value == self.uninitialized() {
                return Err(
                    self.reference_error(format!("Cannot access '{}' before initialization", name))
                );
            }
            return Ok(value);
        }
        let global_object = self.intrinsics.global_object;
        let key = PropertyKey::from(name);
        if self.has_property(global_object, &key) {
            return self.get(global_object, &key);
        }
        Err(self.reference_error(format!("{} is not defined", name)))
    }

    /// Assign a variable visible from the current scope
    pub fn store(&mut self, name: &str, value: HandleId) -> JsResult<()> {
        let Some(binding) = self.resolve(self.scope, name) else {
            let global_object = self.intrinsics.global_object;
            let key = PropertyKey::from(name);
            if self.has_property(global_object, &key) {
                return self.set(global_object, key, value);
            }
            return Err(self.reference_error(format!("{} is not defined", name)));
        };
        let Some((current, kind)) = self.binding_data(binding).map(|b| (b.value, b.kind)) else {
            return Err(self.internal_error("Dangling binding"));
        };
        if current == self.uninitialized() {
            return Err(
                self.reference_error(format!("Cannot access '{}' before initialization", name))
            );
        }
        if kind != BindingKind::Var {
            return Err(self.type_error("Assignment to constant variable."));
        }
        self.set_binding_value(binding, value);
        Ok(())
    }

    /// Change the declaration kind of a binding of the current scope
    pub fn set_binding_kind(&mut self, name: &str, kind: BindingKind) -> JsResult<()> {
        let scope = self.scope;
        let Some(binding) = self
            .scope_data(scope)
            .and_then(|data| data.variables.get(name).copied())
        else {
            return Err(self.reference_error(format!("{} is not defined", name)));
        };
        let updated = match self.heap.get_mut(binding).and_then(HeapData::as_binding_mut) {
            Some(data) => {
                data.kind = kind;
                true
            }
            None => false,
        };
        if !updated {
            return Err(self.internal_error("Dangling binding"));
        }
        if matches!(kind, BindingKind::Using | BindingKind::AwaitUsing) {
            if let Some(scope_data) = self.scope_data_mut(scope) {
                if !scope_data.disposables.contains(&binding) {
                    scope_data.disposables.push(binding);
                }
            }
        }
        Ok(())
    }

    /// Current value of a binding
    pub fn binding_value(&self, binding: HandleId) -> Option<HandleId> {
        self.binding_data(binding).map(|b| b.value)
    }

    pub(crate) fn set_binding_value(&mut self, binding: HandleId, value: HandleId) {
        let previous = match self.heap.get_mut(binding).and_then(HeapData::as_binding_mut) {
            Some(data) => std::mem::replace(&mut data.value, value),
            None => return,
        };
        self.heap.replace_edge(binding, Some(previous), Some(value));
    }
}
