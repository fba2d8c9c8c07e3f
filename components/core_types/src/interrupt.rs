//! Suspended execution state.
//!
//! `await` and `yield` do not unwind the host stack through a special
//! mechanism: the VM copies everything it needs to continue into a
//! [`VmState`], wraps it in an [`InterruptData`] and returns it as an
//! ordinary value. Resuming rebuilds the VM from that record.
//!
//! The frame records ([`TryFrame`], [`LabelFrame`]) live here as well because
//! they are part of the captured state.

use std::rc::Rc;

use bytecode_system::Program;

use crate::HandleId;

/// Why execution was suspended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptKind {
    /// Coroutine created but not started
    Init,
    /// Suspended at `yield`
    Yield,
    /// Suspended at `await`
    Await,
}

/// Phase of a try frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryState {
    /// Running the protected block
    Try,
    /// Running the catch block
    Catch,
    /// Running the finally block
    Finally,
}

/// Where a labeled jump goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JumpTarget {
    /// Label name
    pub label: String,
    /// Break or continue
    pub kind: LabelKind,
}

/// Completion deferred until a finally block finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingCompletion {
    /// Rethrow the exception
    Throw(HandleId),
    /// Return the value
    Return(HandleId),
    /// Continue a labeled break or continue
    Jump(JumpTarget),
}

impl PendingCompletion {
    fn reference(&self) -> Option<HandleId> {
        match self {
            PendingCompletion::Throw(h) | PendingCompletion::Return(h) => Some(*h),
            PendingCompletion::Jump(_) => None,
        }
    }
}

/// Active try/catch/finally region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TryFrame {
    /// Scope current when the region was entered
    pub scope: HandleId,
    /// Operand stack depth at entry
    pub stack_depth: usize,
    /// Label stack depth at entry
    pub label_depth: usize,
    /// Catch block offset, if any
    pub catch_address: Option<usize>,
    /// Finally block offset, if any
    pub finally_address: Option<usize>,
    /// Current phase
    pub state: TryState,
    /// Completion to replay after the finally block
    pub pending: Option<PendingCompletion>,
}

/// Kind of a label frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    /// Target of `break label`
    Break,
    /// Target of `continue label`
    Continue,
}

/// Active labeled statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFrame {
    /// Break or continue target
    pub kind: LabelKind,
    /// Label name, empty for unlabeled loops
    pub label: String,
    /// Jump destination
    pub address: usize,
    /// Scope current when the label was pushed
    pub scope: HandleId,
    /// Operand stack depth when the label was pushed
    pub stack_depth: usize,
    /// Try stack depth when the label was pushed
    pub try_depth: usize,
}

/// Everything needed to continue a suspended VM
#[derive(Debug, Clone)]
pub struct VmState {
    /// Program being executed
    pub program: Rc<Program>,
    /// Offset of the next instruction
    pub offset: usize,
    /// Base scope of the frame
    pub base: HandleId,
    /// Current scope at suspension
    pub scope: HandleId,
    /// Operand stack
    pub stack: Vec<HandleId>,
    /// Try frames, innermost last
    pub try_stack: Vec<TryFrame>,
    /// Label frames, innermost last
    pub label_stack: Vec<LabelFrame>,
    /// Receiver
    pub this: HandleId,
    /// Saved result for `HLT`
    pub result: Option<HandleId>,
    /// Whether the frame pops its base scope on exit
    pub owns_base: bool,
    /// Drop the resume input instead of pushing it
    pub discard_input: bool,
}

impl VmState {
    /// Handles the suspended frame keeps alive
    pub fn references(&self, out: &mut Vec<HandleId>) {
        out.push(self.base);
        out.push(self.scope);
        out.push(self.this);
        out.extend(self.stack.iter().copied());
        out.extend(self.result);
        for frame in &self.try_stack {
            out.push(frame.scope);
            out.extend(frame.pending.as_ref().and_then(PendingCompletion::reference));
        }
        out.extend(self.label_stack.iter().map(|l| l.scope));
    }
}

/// Payload of an interrupt value
#[derive(Debug, Clone)]
pub struct InterruptData {
    /// Why execution stopped
    pub kind: InterruptKind,
    /// Value produced by `yield` or awaited by `await`
    pub value: HandleId,
    /// Suspended frame; None once the interrupt has been resumed
    pub state: Option<VmState>,
}

impl InterruptData {
    /// Whether the interrupt can still be resumed
    pub fn is_pending(&self) -> bool {
        self.state.is_some()
    }

    /// Strong references held by the interrupt
    pub fn references(&self, out: &mut Vec<HandleId>) {
        out.push(self.value);
        if let Some(state) = &self.state {
            state.references(out);
        }
    }
}
