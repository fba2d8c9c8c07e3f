//! Function objects, calls, construction and coroutines.
//!
//! A call to a bytecode function runs a fresh [`Vm`] in a new scope whose
//! lookup parent is the global scope. Generator and async functions do not
//! run when called: they return a coroutine object holding an *init*
//! interrupt, and [`Runtime::resume`] drives them from then on.

use std::rc::Rc;

use bytecode_system::Program;
use core_types::{
    CallableData, FunctionBody, HandleId, InterruptData, InterruptKind, PropertyDescriptor,
    PropertyKey, StackFrame, Value, VmState,
};

use crate::heap_data::{BindingKind, HeapData};
use crate::runtime::{JsResult, Runtime};
use crate::vm::{Completion, Vm};

/// Internal slot of a coroutine object holding its pending interrupt
pub const COROUTINE_SLOT: &str = "[[Coroutine]]";

const COROUTINE_MARKER: &str = "coroutine";

impl Runtime {
    /// Wrap callable data into a function object
    pub fn create_function(&mut self, callable: CallableData) -> HandleId {
        let proto = self.intrinsics.function_prototype;
        self.alloc(Value::function(Some(proto), callable))
    }

    /// Create a bytecode function with a fresh `prototype` object whose
    /// `constructor` points back at it
    pub(crate) fn create_constructor_function(&mut self, callable: CallableData) -> HandleId {
        let function = self.create_function(callable);
        let prototype = self.create_object();
        self.put_own(prototype, "constructor".into(), PropertyDescriptor::hidden(function));
        self.put_own(
            function,
            "prototype".into(),
            PropertyDescriptor::data_with(prototype, true, false, false),
        );
        function
    }

    /// Display name of a function; anonymous functions read as `anonymous`
    pub fn function_name(&self, function: HandleId) -> String {
        let Some(callable) = self.value(function).and_then(Value::as_callable) else {
            return "anonymous".to_string();
        };
        if !callable.name.is_empty() {
            return callable.name.clone();
        }
        match callable.body {
            FunctionBody::Native(id) => self.native_name(id).unwrap_or("anonymous").to_string(),
            FunctionBody::Bytecode { .. } => "anonymous".to_string(),
        }
    }

    /// Call `callee` with an explicit receiver
    pub fn call(&mut self, callee: HandleId, this: HandleId, args: &[HandleId]) -> JsResult {
        let frame = StackFrame {
            function_name: self.is_callable(callee).then(|| self.function_name(callee)),
            source_url: None,
            line: 0,
            column: 0,
        };
        self.call_with_frame(callee, this, args, frame)
    }

    /// Call `callee`, recording `frame` on the call stack for error traces
    pub fn call_with_frame(
        &mut self,
        callee: HandleId,
        this: HandleId,
        args: &[HandleId],
        frame: StackFrame,
    ) -> JsResult {
        let Some(callable) = self.value(callee).and_then(Value::as_callable).cloned() else {
            let name = match &frame.function_name {
                Some(name) => name.clone(),
                None => self.display(callee),
            };
            return Err(self.type_error(format!("{} is not a function", name)));
        };
        if self.call_stack.len() >= self.config.max_call_depth {
            return Err(self.range_error("Maximum call stack size exceeded"));
        }

        let mark = self.pin(&[callee, this]);
        self.pinned.extend_from_slice(args);
        self.call_stack.push(frame);
        let result = self.invoke(callee, &callable, this, args);
        self.call_stack.pop();
        self.unpin(mark);
        result
    }

    fn invoke(
        &mut self,
        callee: HandleId,
        callable: &CallableData,
        this: HandleId,
        args: &[HandleId],
    ) -> JsResult {
        match &callable.body {
            FunctionBody::Native(id) => {
                let Some(func) = self.native(*id) else {
                    return Err(self.internal_error(format!("Unknown native function {}", id.0)));
                };
                func(self, this, args)
            }
            FunctionBody::Bytecode { program, address } => {
                let this = callable.bind.unwrap_or(this);
                let scope = self.enter_function(callable, args)?;
                if callable.is_coroutine() {
                    let program = program.clone();
                    return Ok(self.create_coroutine(callee, callable, program, *address, scope, this));
                }
                Vm::new(program.clone(), *address, scope, this, true)
                    .run(self)
                    .into_result()
            }
        }
    }

    /// Create the activation scope of a bytecode function
    fn enter_function(&mut self, callable: &CallableData, args: &[HandleId]) -> JsResult {
        let scope = self.new_scope(Some(self.global), self.scope);
        for (name, &binding) in &callable.closure {
            self.bind_existing(scope, name, binding);
        }
        if !callable.is_lambda && !callable.closure.contains_key("arguments") {
            let arguments = self.create_array(args);
            self.declare_in(scope, "arguments", arguments, BindingKind::Var)?;
        }
        Ok(scope)
    }

    fn create_coroutine(
        &mut self,
        callee: HandleId,
        callable: &CallableData,
        program: Rc<Program>,
        address: usize,
        scope: HandleId,
        this: HandleId,
    ) -> HandleId {
        let prototype = match self.get(callee, &PropertyKey::from("prototype")) {
            Ok(proto) if self.is_object_like(proto) => proto,
            _ if callable.is_generator => self.intrinsics.generator_prototype,
            _ => self.intrinsics.object_prototype,
        };
        let object = self.create_object_with_proto(Some(prototype));
        if let Some(data) = self.value_mut(object).and_then(Value::as_object_mut) {
            data.attachments.insert(COROUTINE_MARKER, true);
        }

        let state = VmState {
            program,
            offset: address,
            base: scope,
            scope,
            stack: Vec::new(),
            try_stack: Vec::new(),
            label_stack: Vec::new(),
            this,
            result: None,
            owns_base: true,
            discard_input: false,
        };
        let undefined = self.undefined();
        let interrupt = self.alloc(Value::Interrupt(Box::new(InterruptData {
            kind: InterruptKind::Init,
            value: undefined,
            state: Some(state),
        })));
        self.detach_scope(scope);
        self.set_internal(object, COROUTINE_SLOT, Some(interrupt));
        tracing::trace!(%object, "coroutine created");
        object
    }

    /// Construct an object with `new callee(...args)`
    pub fn construct(&mut self, callee: HandleId, args: &[HandleId]) -> JsResult {
        let frame = StackFrame {
            function_name: self.is_callable(callee).then(|| self.function_name(callee)),
            source_url: None,
            line: 0,
            column: 0,
        };
        self.construct_with_frame(callee, args, frame)
    }

    /// Construct, recording `frame` on the call stack
    pub fn construct_with_frame(
        &mut self,
        callee: HandleId,
        args: &[HandleId],
        frame: StackFrame,
    ) -> JsResult {
        let constructible = self
            .value(callee)
            .and_then(Value::as_callable)
            .is_some_and(|c| !c.is_lambda && !c.is_coroutine());
        if !constructible {
            let name = match &frame.function_name {
                Some(name) => name.clone(),
                None => self.display(callee),
            };
            return Err(self.type_error(format!("{} is not a constructor", name)));
        }
        let prototype = self.get(callee, &PropertyKey::from("prototype"))?;
        let prototype = if self.is_object_like(prototype) {
            prototype
        } else {
            self.intrinsics.object_prototype
        };
        let object = self.create_object_with_proto(Some(prototype));
        let result = self.call_with_frame(callee, object, args, frame)?;
        Ok(if self.is_object_like(result) { result } else { object })
    }

    /// Whether a handle holds an interrupt
    pub fn is_interrupt(&self, handle: HandleId) -> bool {
        matches!(self.value(handle), Some(Value::Interrupt(_)))
    }

    /// Value produced by a `yield` or `await`
    pub fn interrupt_value(&self, interrupt: HandleId) -> Option<HandleId> {
        self.value(interrupt)
            .and_then(Value::as_interrupt)
            .map(|data| data.value)
    }

    /// Why an interrupt suspended
    pub fn interrupt_kind(&self, interrupt: HandleId) -> Option<InterruptKind> {
        self.value(interrupt)
            .and_then(Value::as_interrupt)
            .map(|data| data.kind)
    }

    fn is_coroutine_object(&self, handle: HandleId) -> bool {
        self.value(handle)
            .and_then(Value::as_object)
            .is_some_and(|data| data.attachments.contains(COROUTINE_MARKER))
    }

    /// Resume a suspended computation.
    ///
    /// `target` is an interrupt or a coroutine object. Returns a new
    /// interrupt when the computation suspends again, its completion value
    /// when it returns, or the exception it throws. A finished coroutine
    /// resumes to `undefined`.
    pub fn resume(&mut self, target: HandleId, input: HandleId) -> JsResult {
        let (interrupt, holder) = if self.is_interrupt(target) {
            (target, None)
        } else if let Some(slot) = self.get_internal(target, COROUTINE_SLOT) {
            (slot, Some(target))
        } else if self.is_coroutine_object(target) {
            return Ok(self.undefined());
        } else {
            return Err(self.type_error("value is not resumable"));
        };

        let taken = match self.value_mut(interrupt) {
            Some(Value::Interrupt(data)) => data.state.take().map(|state| (data.kind, state)),
            _ => None,
        };
        let Some((kind, state)) = taken else {
            if let Some(holder) = holder {
                self.set_internal(holder, COROUTINE_SLOT, None);
            }
            return Ok(self.undefined());
        };
        tracing::trace!(%interrupt, ?kind, offset = state.offset, "resuming");

        let caller = self.scope;
        let mut refs = Vec::new();
        state.references(&mut refs);
        for &handle in &refs {
            let is_scope = matches!(self.heap.get(handle), Some(HeapData::Scope(_)));
            if !is_scope {
                self.heap.link(caller, handle);
            }
        }
        if state.owns_base {
            self.attach_scope(state.base, caller);
        }
        for handle in refs {
            self.heap.replace_edge(interrupt, Some(handle), None);
        }

        let discard_input = state.discard_input || kind == InterruptKind::Init;
        let mut vm = Vm::from_state(state);
        if !discard_input {
            vm.stack.push(input);
        }
        let mark = self.pin(&[interrupt, input]);
        let completion = vm.run(self);
        self.unpin(mark);

        match completion {
            Completion::Suspend(next) => {
                if let Some(holder) = holder {
                    self.set_internal(holder, COROUTINE_SLOT, Some(next));
                }
                Ok(next)
            }
            Completion::Return(value) => {
                if let Some(holder) = holder {
                    self.set_internal(holder, COROUTINE_SLOT, None);
                }
                Ok(value)
            }
            Completion::Throw(exception) => {
                if let Some(holder) = holder {
                    self.set_internal(holder, COROUTINE_SLOT, None);
                }
                Err(exception)
            }
        }
    }

    /// Generator protocol: resume and wrap the outcome as `{ value, done }`
    pub fn generator_next(&mut self, generator: HandleId, input: HandleId) -> JsResult {
        let outcome = self.resume(generator, input)?;
        let (value, done) = match self.interrupt_value(outcome) {
            Some(value) => (value, false),
            None => (outcome, true),
        };
        let result = self.create_object();
        let done = self.boolean(done);
        self.put_own(result, "value".into(), PropertyDescriptor::data(value));
        self.put_own(result, "done".into(), PropertyDescriptor::data(done));
        Ok(result)
    }
}
