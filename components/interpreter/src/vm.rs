//! Bytecode virtual machine.
//!
//! One [`Vm`] runs one activation: a function body, a coroutine slice or a
//! top-level program. Instructions are decoded and executed by
//! [`Vm::step`](crate::dispatch); this module owns everything around it:
//! routing exceptions to try frames, running `finally` blocks on the way
//! out, label jumps, suspension into an interrupt and frame teardown.

use std::rc::Rc;

use bytecode_system::Program;
use core_types::{
    HandleId, InterruptData, InterruptKind, JumpTarget, LabelFrame, PendingCompletion, TryFrame,
    TryState, Value, VmState,
};

use crate::runtime::{JsResult, Runtime};
use crate::scope::DisposeStep;

/// How an activation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Returned or halted with a value
    Return(HandleId),
    /// Ended with an uncaught exception
    Throw(HandleId),
    /// Suspended; the handle is the interrupt to resume
    Suspend(HandleId),
}

impl Completion {
    /// Suspension counts as a successful result carrying the interrupt
    pub fn into_result(self) -> JsResult {
        match self {
            Completion::Return(value) | Completion::Suspend(value) => Ok(value),
            Completion::Throw(exception) => Err(exception),
        }
    }
}

/// What the dispatcher asks the driver to do after an instruction
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Flow {
    Next,
    Return(HandleId),
    Halt,
    Jump(JumpTarget),
    Suspend {
        kind: InterruptKind,
        value: HandleId,
        resume_at: usize,
        discard_input: bool,
    },
}

/// Execution state of one activation
#[derive(Debug)]
pub struct Vm {
    pub(crate) program: Rc<Program>,
    pub(crate) offset: usize,
    pub(crate) base: HandleId,
    pub(crate) scope: HandleId,
    pub(crate) stack: Vec<HandleId>,
    pub(crate) try_stack: Vec<TryFrame>,
    pub(crate) label_stack: Vec<LabelFrame>,
    pub(crate) this: HandleId,
    pub(crate) result: Option<HandleId>,
    pub(crate) owns_base: bool,
    caller: HandleId,
}

impl Vm {
    /// Prepare a run of `program` from `address` with `base` as the
    /// activation scope. When `owns_base` is set the base scope is popped
    /// when the activation ends.
    pub fn new(
        program: Rc<Program>,
        address: usize,
        base: HandleId,
        this: HandleId,
        owns_base: bool,
    ) -> Self {
        Self {
            program,
            offset: address,
            base,
            scope: base,
            stack: Vec::new(),
            try_stack: Vec::new(),
            label_stack: Vec::new(),
            this,
            result: None,
            owns_base,
            caller: base,
        }
    }

    /// Rebuild a VM from the state captured by an interrupt
    pub fn from_state(state: VmState) -> Self {
        Self {
            program: state.program,
            offset: state.offset,
            base: state.base,
            scope: state.scope,
            stack: state.stack,
            try_stack: state.try_stack,
            label_stack: state.label_stack,
            this: state.this,
            result: state.result,
            owns_base: state.owns_base,
            caller: state.base,
        }
    }

    /// Run until the activation returns, throws or suspends.
    ///
    /// The runtime's current scope is restored to what it was on entry.
    pub fn run(mut self, rt: &mut Runtime) -> Completion {
        self.caller = rt.scope;
        rt.scope = self.scope;
        tracing::trace!(filename = %self.program.filename, offset = self.offset, "vm enter");

        loop {
            if self.offset >= self.program.len() {
                let value = self.result.unwrap_or(rt.intrinsics.undefined);
                return self.finish(rt, Ok(value));
            }

            let mark = rt.pin(&self.stack);
            rt.pinned.push(self.this);
            let step = self.step(rt);
            rt.unpin(mark);

            let flow = match step {
                Ok(flow) => flow,
                Err(exception) => match self.route_exception(rt, exception) {
                    Ok(()) => continue,
                    Err(exception) => return self.finish(rt, Err(exception)),
                },
            };

            let routed = match flow {
                Flow::Next => Ok(()),
                Flow::Halt => {
                    let value = self.result.unwrap_or(rt.intrinsics.undefined);
                    return self.finish(rt, Ok(value));
                }
                Flow::Return(value) => match self.return_through_finally(rt, value) {
                    Ok(Some(value)) => return self.finish(rt, Ok(value)),
                    Ok(None) => Ok(()),
                    Err(exception) => Err(exception),
                },
                Flow::Jump(target) => self.jump_to_label(rt, target),
                Flow::Suspend {
                    kind,
                    value,
                    resume_at,
                    discard_input,
                } => return self.suspend(rt, kind, value, resume_at, discard_input),
            };
            if let Err(exception) = routed {
                if let Err(exception) = self.route_exception(rt, exception) {
                    return self.finish(rt, Err(exception));
                }
            }
        }
    }

    /// Pop scopes until `scope` is current again, dropping stack slots and
    /// label frames above the given depths. Disposers run synchronously;
    /// the first disposer error is returned once unwinding is done.
    fn unwind_to(
        &mut self,
        rt: &mut Runtime,
        scope: HandleId,
        stack_depth: usize,
        label_depth: usize,
    ) -> Result<(), HandleId> {
        self.stack.truncate(stack_depth);
        self.label_stack.truncate(label_depth);
        let mut first_error = None;
        while rt.scope != scope && rt.scope != self.base && rt.scope != rt.global {
            let current = rt.scope;
            while let DisposeStep::Await(pending) = rt.dispose_scope(current) {
                tracing::trace!(%pending, "async disposal not awaited while unwinding");
            }
            if let Err(error) = rt.leave_scope(current, &self.stack) {
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Hand an exception to the innermost try frame able to take it.
    ///
    /// Returns the exception back when no frame of this activation handles
    /// it.
    fn route_exception(&mut self, rt: &mut Runtime, exception: HandleId) -> Result<(), HandleId> {
        while let Some(frame) = self.try_stack.last() {
            let (scope, stack_depth, label_depth) = (frame.scope, frame.stack_depth, frame.label_depth);
            let target = match frame.state {
                TryState::Try => frame
                    .catch_address
                    .map(|address| (TryState::Catch, address))
                    .or(frame.finally_address.map(|address| (TryState::Finally, address))),
                TryState::Catch => frame.finally_address.map(|address| (TryState::Finally, address)),
                TryState::Finally => None,
            };
            let Some((state, address)) = target else {
                self.try_stack.pop();
                continue;
            };

            rt.link(scope, exception);
            if let Err(ignored) = self.unwind_to(rt, scope, stack_depth, label_depth) {
                tracing::debug!(%ignored, "disposer error dropped while unwinding an exception");
            }
            if let Some(frame) = self.try_stack.last_mut() {
                frame.state = state;
                frame.pending = match state {
                    TryState::Finally => Some(PendingCompletion::Throw(exception)),
                    _ => None,
                };
            }
            if state == TryState::Catch {
                let thrown = rt.thrown_value(exception);
                self.stack.push(thrown);
            }
            self.offset = address;
            return Ok(());
        }
        Err(exception)
    }

    /// Run pending `finally` blocks before returning `value`.
    ///
    /// `Ok(None)` means control moved into a `finally` block that will
    /// replay the return when it ends.
    fn return_through_finally(
        &mut self,
        rt: &mut Runtime,
        value: HandleId,
    ) -> Result<Option<HandleId>, HandleId> {
        while let Some(frame) = self.try_stack.last() {
            let (scope, stack_depth, label_depth) = (frame.scope, frame.stack_depth, frame.label_depth);
            match (frame.finally_address, frame.state) {
                (Some(address), state) if state != TryState::Finally => {
                    rt.link(scope, value);
                    self.unwind_to(rt, scope, stack_depth, label_depth)?;
                    if let Some(frame) = self.try_stack.last_mut() {
                        frame.state = TryState::Finally;
                        frame.pending = Some(PendingCompletion::Return(value));
                    }
                    self.offset = address;
                    return Ok(None);
                }
                _ => {
                    self.try_stack.pop();
                }
            }
        }
        Ok(Some(value))
    }

    fn find_label(&self, target: &JumpTarget) -> Option<usize> {
        self.label_stack.iter().rposition(|frame| {
            frame.kind == target.kind && (target.label.is_empty() || frame.label == target.label)
        })
    }

    /// `BREAK`/`CONTINUE`: leave every try frame between here and the
    /// label, running their `finally` blocks, then jump.
    pub(crate) fn jump_to_label(
        &mut self,
        rt: &mut Runtime,
        target: JumpTarget,
    ) -> Result<(), HandleId> {
        let Some(index) = self.find_label(&target) else {
            return Err(rt.syntax_error(format!("Undefined label '{}'", target.label)));
        };
        let label = self.label_stack[index].clone();

        while self.try_stack.len() > label.try_depth {
            let Some(frame) = self.try_stack.last() else {
                break;
            };
            let (scope, stack_depth, label_depth) = (frame.scope, frame.stack_depth, frame.label_depth);
            match (frame.finally_address, frame.state) {
                (Some(address), state) if state != TryState::Finally => {
                    self.unwind_to(rt, scope, stack_depth, label_depth)?;
                    if let Some(frame) = self.try_stack.last_mut() {
                        frame.state = TryState::Finally;
                        frame.pending = Some(PendingCompletion::Jump(target));
                    }
                    self.offset = address;
                    return Ok(());
                }
                _ => {
                    self.try_stack.pop();
                }
            }
        }

        self.unwind_to(rt, label.scope, label.stack_depth, index)?;
        self.offset = label.address;
        Ok(())
    }

    /// Package the activation into an interrupt and give control back
    fn suspend(
        &mut self,
        rt: &mut Runtime,
        kind: InterruptKind,
        value: HandleId,
        resume_at: usize,
        discard_input: bool,
    ) -> Completion {
        let state = VmState {
            program: Rc::clone(&self.program),
            offset: resume_at,
            base: self.base,
            scope: rt.scope,
            stack: std::mem::take(&mut self.stack),
            try_stack: std::mem::take(&mut self.try_stack),
            label_stack: std::mem::take(&mut self.label_stack),
            this: self.this,
            result: self.result,
            owns_base: self.owns_base,
            discard_input,
        };
        rt.scope = self.caller;
        let interrupt = rt.alloc(Value::Interrupt(Box::new(InterruptData {
            kind,
            value,
            state: Some(state),
        })));
        if self.owns_base {
            rt.detach_scope(self.base);
        }
        tracing::trace!(%interrupt, ?kind, offset = resume_at, "vm suspended");
        Completion::Suspend(interrupt)
    }

    /// Tear the activation down: keep the outcome alive in the caller's
    /// scope, pop every scope this activation entered and restore the
    /// caller's scope.
    ///
    /// A disposer error replaces a normal completion; while an exception is
    /// already leaving, disposer errors are dropped.
    fn finish(&mut self, rt: &mut Runtime, outcome: JsResult) -> Completion {
        let mut outcome = outcome;
        let handle = match outcome {
            Ok(value) | Err(value) => value,
        };
        rt.link(self.caller, handle);

        loop {
            let current = rt.scope;
            let at_base = current == self.base;
            if (at_base && !self.owns_base) || current == rt.global {
                break;
            }
            while let DisposeStep::Await(pending) = rt.dispose_scope(current) {
                tracing::trace!(%pending, "async disposal not awaited at frame exit");
            }
            if let Err(error) = rt.leave_scope(current, &[]) {
                match outcome {
                    Ok(_) => {
                        rt.link(self.caller, error);
                        outcome = Err(error);
                    }
                    Err(_) => {
                        tracing::debug!(%error, "disposer error dropped at frame exit");
                    }
                }
            }
            if at_base {
                break;
            }
        }
        rt.scope = self.caller;

        match outcome {
            Ok(value) => Completion::Return(value),
            Err(exception) => {
                tracing::trace!(%exception, "activation threw");
                Completion::Throw(exception)
            }
        }
    }
}
