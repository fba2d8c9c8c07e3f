//! Instruction decoding and execution.
//!
//! [`Vm::step`] executes exactly one instruction. Anything that needs the
//! driver (returns, label jumps, suspension) is reported back as a
//! [`Flow`]; exceptions come back on the `Err` side and are routed by the
//! driver.

use std::rc::Rc;

use bytecode_system::{DecodeError, Opcode};
use core_types::{
    CallableData, FunctionBody, HandleId, InterruptKind, JumpTarget, LabelFrame, LabelKind,
    PendingCompletion, PropertyDescriptor, StackFrame, TryFrame, TryState, Value,
};
use num_bigint::BigInt;

use crate::heap_data::BindingKind;
use crate::ops::{BinaryOp, CompareOp, UnaryOp};
use crate::runtime::Runtime;
use crate::scope::DisposeStep;
use crate::vm::{Flow, Vm};

fn decode_failed(rt: &mut Runtime, error: DecodeError) -> HandleId {
    rt.internal_error(error.to_string())
}

fn binary_opcode(opcode: Opcode) -> Option<BinaryOp> {
    Some(match opcode {
        Opcode::Add => BinaryOp::Add,
        Opcode::Sub => BinaryOp::Sub,
        Opcode::Mul => BinaryOp::Mul,
        Opcode::Div => BinaryOp::Div,
        Opcode::Mod => BinaryOp::Mod,
        Opcode::Pow => BinaryOp::Pow,
        Opcode::And => BinaryOp::And,
        Opcode::Or => BinaryOp::Or,
        Opcode::Xor => BinaryOp::Xor,
        Opcode::Shl => BinaryOp::Shl,
        Opcode::Shr => BinaryOp::Shr,
        Opcode::Ushr => BinaryOp::Ushr,
        _ => return None,
    })
}

fn unary_opcode(opcode: Opcode) -> Option<UnaryOp> {
    Some(match opcode {
        Opcode::Plus => UnaryOp::Plus,
        Opcode::Neg => UnaryOp::Neg,
        Opcode::Not => UnaryOp::BitNot,
        Opcode::Inc => UnaryOp::Inc,
        Opcode::Dec => UnaryOp::Dec,
        _ => return None,
    })
}

fn compare_opcode(opcode: Opcode) -> Option<CompareOp> {
    Some(match opcode {
        Opcode::Lt => CompareOp::Lt,
        Opcode::Gt => CompareOp::Gt,
        Opcode::Le => CompareOp::Le,
        Opcode::Ge => CompareOp::Ge,
        _ => return None,
    })
}

fn position(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

impl Vm {
    fn pop(&mut self, rt: &mut Runtime) -> Result<HandleId, HandleId> {
        match self.stack.pop() {
            Some(value) => Ok(value),
            None => Err(rt.internal_error("Operand stack underflow")),
        }
    }

    fn top(&self, rt: &mut Runtime) -> Result<HandleId, HandleId> {
        match self.stack.last() {
            Some(&value) => Ok(value),
            None => Err(rt.internal_error("Operand stack underflow")),
        }
    }

    /// Apply `update` to the function on top of the stack
    fn update_function(
        &self,
        rt: &mut Runtime,
        update: impl FnOnce(&mut CallableData),
    ) -> Result<HandleId, HandleId> {
        let function = self.top(rt)?;
        if !rt.is_callable(function) {
            return Err(rt.type_error("variable is not a function"));
        }
        if let Some(callable) = rt.value_mut(function).and_then(Value::as_callable_mut) {
            update(callable);
        }
        Ok(function)
    }

    fn call_frame(&self, name: Option<String>, line: i32, column: i32) -> StackFrame {
        StackFrame {
            function_name: name,
            source_url: Some(self.program.filename.clone()),
            line: position(line),
            column: position(column),
        }
    }

    /// Decode and execute one instruction
    pub(crate) fn step(&mut self, rt: &mut Runtime) -> Result<Flow, HandleId> {
        let program = Rc::clone(&self.program);
        let start = self.offset;
        let opcode = program
            .read_code(&mut self.offset)
            .map_err(|e| decode_failed(rt, e))?;

        if let Some(op) = binary_opcode(opcode) {
            let right = self.pop(rt)?;
            let left = self.pop(rt)?;
            let result = rt.binary_op(op, left, right)?;
            self.stack.push(result);
            return Ok(Flow::Next);
        }
        if let Some(op) = unary_opcode(opcode) {
            let operand = self.pop(rt)?;
            let result = rt.unary_op(op, operand)?;
            self.stack.push(result);
            return Ok(Flow::Next);
        }
        if let Some(op) = compare_opcode(opcode) {
            let right = self.pop(rt)?;
            let left = self.pop(rt)?;
            let result = rt.compare(op, left, right)?;
            self.stack.push(rt.boolean(result));
            return Ok(Flow::Next);
        }

        match opcode {
            // ===== Scopes & stack =====
            Opcode::PushScope => {
                rt.push_scope();
            }
            Opcode::PopScope => {
                let scope = rt.scope;
                if scope == self.base || scope == rt.global {
                    return Err(rt.internal_error("POP_SCOPE without a matching PUSH_SCOPE"));
                }
                if let DisposeStep::Await(value) = rt.dispose_scope(scope) {
                    return Ok(Flow::Suspend {
                        kind: InterruptKind::Await,
                        value,
                        resume_at: start,
                        discard_input: true,
                    });
                }
                rt.leave_scope(scope, &self.stack)?;
            }
            Opcode::Pop => {
                self.pop(rt)?;
            }
            Opcode::Store => {
                let name = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let value = self.top(rt)?;
                rt.store(name, value)?;
            }
            Opcode::Save => {
                let value = self.top(rt)?;
                self.result = Some(value);
                rt.link(self.base, value);
            }
            Opcode::Def => {
                let name = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let value = self.top(rt)?;
                rt.declare(name, value, BindingKind::Var)?;
            }
            Opcode::Load => {
                let name = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let value = rt.load(name)?;
                self.stack.push(value);
            }
            Opcode::Clone => {
                let value = self.top(rt)?;
                let copy = rt.structural_copy(value);
                self.stack.push(copy);
            }
            Opcode::PushValue => {
                let depth = program.read_integer(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let index = usize::try_from(depth)
                    .ok()
                    .filter(|&d| d >= 1 && d <= self.stack.len())
                    .map(|d| self.stack.len() - d);
                let Some(index) = index else {
                    return Err(rt.internal_error(format!("PUSH_VALUE {} out of range", depth)));
                };
                self.stack.push(self.stack[index]);
            }
            Opcode::SetConst | Opcode::SetUsing | Opcode::SetAwaitUsing => {
                let name = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let kind = match opcode {
                    Opcode::SetConst => BindingKind::Const,
                    Opcode::SetUsing => BindingKind::Using,
                    _ => BindingKind::AwaitUsing,
                };
                rt.set_binding_kind(name, kind)?;
            }

            // ===== Literals =====
            Opcode::PushUndefined => self.stack.push(rt.undefined()),
            Opcode::PushNull => self.stack.push(rt.null()),
            Opcode::PushNan => {
                let nan = rt.number(f64::NAN);
                self.stack.push(nan);
            }
            Opcode::PushInfinity => {
                let infinity = rt.number(f64::INFINITY);
                self.stack.push(infinity);
            }
            Opcode::PushUninitialized => self.stack.push(rt.uninitialized()),
            Opcode::PushTrue => self.stack.push(rt.boolean(true)),
            Opcode::PushFalse => self.stack.push(rt.boolean(false)),
            Opcode::PushNumber => {
                let n = program.read_number(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let value = rt.number(n);
                self.stack.push(value);
            }
            Opcode::PushString => {
                let s = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let value = rt.string(s);
                self.stack.push(value);
            }
            Opcode::PushBigint => {
                let digits = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let Ok(n) = digits.parse::<BigInt>() else {
                    return Err(rt.syntax_error(format!("Cannot convert {} to a BigInt", digits)));
                };
                let value = rt.bigint(n);
                self.stack.push(value);
            }
            Opcode::PushObject => {
                let object = rt.create_object();
                self.stack.push(object);
            }
            Opcode::PushArray => {
                let array = rt.create_array(&[]);
                self.stack.push(array);
            }
            Opcode::PushThis => self.stack.push(self.this),

            // ===== Functions =====
            Opcode::PushFunction
            | Opcode::PushAsyncFunction
            | Opcode::PushLambda
            | Opcode::PushAsyncLambda
            | Opcode::PushGenerator
            | Opcode::PushAsyncGenerator => {
                let mut callable = CallableData::bytecode(Rc::clone(&program), 0);
                callable.is_async = matches!(
                    opcode,
                    Opcode::PushAsyncFunction | Opcode::PushAsyncLambda | Opcode::PushAsyncGenerator
                );
                callable.is_generator =
                    matches!(opcode, Opcode::PushGenerator | Opcode::PushAsyncGenerator);
                callable.is_lambda = matches!(opcode, Opcode::PushLambda | Opcode::PushAsyncLambda);
                if callable.is_lambda {
                    callable.bind = Some(self.this);
                }
                let function = if opcode == Opcode::PushFunction {
                    rt.create_constructor_function(callable)
                } else {
                    rt.create_function(callable)
                };
                self.stack.push(function);
            }
            Opcode::SetAddress => {
                let entry = program.read_address(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                self.update_function(rt, |callable| {
                    if let FunctionBody::Bytecode { address, .. } = &mut callable.body {
                        *address = entry;
                    }
                })?;
            }
            Opcode::SetSource => {
                let source = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                self.update_function(rt, |callable| callable.source = Some(source.to_string()))?;
            }
            Opcode::SetName => {
                let name = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                self.update_function(rt, |callable| callable.name = name.to_string())?;
            }
            Opcode::SetClosure => {
                let name = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let Some(binding) = rt.resolve(rt.scope, name) else {
                    return Err(rt.reference_error(format!("{} is not defined", name)));
                };
                let function = self.update_function(rt, |callable| {
                    callable.closure.insert(name.to_string(), binding);
                })?;
                rt.link(function, binding);
            }
            Opcode::SetBind => {
                let receiver = self.pop(rt)?;
                let mut previous = None;
                let function = self.update_function(rt, |callable| {
                    previous = callable.bind.replace(receiver);
                })?;
                rt.heap.replace_edge(function, previous, Some(receiver));
            }
            Opcode::SetAsync => {
                self.update_function(rt, |callable| callable.is_async = true)?;
            }
            Opcode::SetGenerator => {
                self.update_function(rt, |callable| callable.is_generator = true)?;
            }

            // ===== Properties =====
            Opcode::InitField => {
                let value = self.pop(rt)?;
                let key = self.pop(rt)?;
                let host = self.top(rt)?;
                let key = rt.to_property_key(key)?;
                rt.define_property(host, key, PropertyDescriptor::data(value))?;
            }
            Opcode::InitAccessor => {
                let setter = self.pop(rt)?;
                let getter = self.pop(rt)?;
                let key = self.pop(rt)?;
                let host = self.top(rt)?;
                let key = rt.to_property_key(key)?;
                let getter = (!rt.is_nullish(getter)).then_some(getter);
                let setter = (!rt.is_nullish(setter)).then_some(setter);
                rt.define_property(host, key, PropertyDescriptor::accessor(getter, setter, true, true))?;
            }
            Opcode::GetField => {
                let key = self.pop(rt)?;
                let host = self.pop(rt)?;
                let value = rt.get_field(host, key)?;
                self.stack.push(value);
            }
            Opcode::SetField => {
                let value = self.pop(rt)?;
                let key = self.pop(rt)?;
                let host = self.top(rt)?;
                rt.set_field(host, key, value)?;
            }
            Opcode::DelField => {
                let key = self.pop(rt)?;
                let host = self.pop(rt)?;
                let deleted = rt.delete_field(host, key)?;
                self.stack.push(rt.boolean(deleted));
            }
            Opcode::Keys => {
                let value = self.pop(rt)?;
                let keys = rt.keys(value)?;
                self.stack.push(keys);
            }

            // ===== Calls =====
            Opcode::Call => {
                let line = program.read_integer(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let column = program.read_integer(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let arguments = self.pop(rt)?;
                let callee = self.pop(rt)?;
                let args = rt.array_elements(arguments);
                let name = rt.is_callable(callee).then(|| rt.function_name(callee));
                let frame = self.call_frame(name, line, column);
                let this = rt.undefined();
                let result = rt.call_with_frame(callee, this, &args, frame)?;
                self.stack.push(result);
            }
            Opcode::MemberCall => {
                let line = program.read_integer(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let column = program.read_integer(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let arguments = self.pop(rt)?;
                let key = self.pop(rt)?;
                let host = self.pop(rt)?;
                let key = rt.to_property_key(key)?;
                let callee = rt.get(host, &key)?;
                let args = rt.array_elements(arguments);
                let frame = self.call_frame(Some(key.to_string()), line, column);
                let result = rt.call_with_frame(callee, host, &args, frame)?;
                self.stack.push(result);
            }
            Opcode::New => {
                let line = program.read_integer(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let column = program.read_integer(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let arguments = self.pop(rt)?;
                let callee = self.pop(rt)?;
                let args = rt.array_elements(arguments);
                let name = rt.is_callable(callee).then(|| rt.function_name(callee));
                let frame = self.call_frame(name, line, column);
                let result = rt.construct_with_frame(callee, &args, frame)?;
                self.stack.push(result);
            }

            // ===== Control transfer =====
            Opcode::Jmp => {
                self.offset = program.read_address(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
            }
            Opcode::JNull | Opcode::JNotNull | Opcode::JFalse | Opcode::JTrue => {
                let target = program.read_address(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let value = self.top(rt)?;
                let taken = match opcode {
                    Opcode::JNull => rt.is_nullish(value),
                    Opcode::JNotNull => !rt.is_nullish(value),
                    Opcode::JFalse => !rt.to_boolean(value),
                    _ => rt.to_boolean(value),
                };
                if taken {
                    self.offset = target;
                }
            }
            Opcode::Throw => {
                let value = self.pop(rt)?;
                return Err(rt.exception(value));
            }
            Opcode::TryBegin => {
                let catch = program.read_address(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let finally = program.read_address(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                self.try_stack.push(TryFrame {
                    scope: rt.scope,
                    stack_depth: self.stack.len(),
                    label_depth: self.label_stack.len(),
                    catch_address: (catch != 0).then_some(catch),
                    finally_address: (finally != 0).then_some(finally),
                    state: TryState::Try,
                    pending: None,
                });
            }
            Opcode::TryEnd => return self.end_try(rt),
            Opcode::Ret => {
                let value = self.stack.pop().unwrap_or(rt.undefined());
                return Ok(Flow::Return(value));
            }
            Opcode::Hlt => return Ok(Flow::Halt),
            Opcode::Await | Opcode::Yield => {
                let value = self.pop(rt)?;
                let kind = if opcode == Opcode::Await {
                    InterruptKind::Await
                } else {
                    InterruptKind::Yield
                };
                return Ok(Flow::Suspend {
                    kind,
                    value,
                    resume_at: self.offset,
                    discard_input: false,
                });
            }

            // ===== Labels =====
            Opcode::PushBreakLabel | Opcode::PushContinueLabel => {
                let label = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let address = program.read_address(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                self.label_stack.push(LabelFrame {
                    kind: if opcode == Opcode::PushBreakLabel {
                        LabelKind::Break
                    } else {
                        LabelKind::Continue
                    },
                    label: label.to_string(),
                    address,
                    scope: rt.scope,
                    stack_depth: self.stack.len(),
                    try_depth: self.try_stack.len(),
                });
            }
            Opcode::PopLabel => {
                if self.label_stack.pop().is_none() {
                    return Err(rt.internal_error("POP_LABEL without a label frame"));
                }
            }
            Opcode::Break | Opcode::Continue => {
                let label = program.read_string(&mut self.offset).map_err(|e| decode_failed(rt, e))?;
                let kind = if opcode == Opcode::Break {
                    LabelKind::Break
                } else {
                    LabelKind::Continue
                };
                return Ok(Flow::Jump(JumpTarget {
                    label: label.to_string(),
                    kind,
                }));
            }

            // ===== Operators =====
            Opcode::Eq | Opcode::Ne => {
                let right = self.pop(rt)?;
                let left = self.pop(rt)?;
                let equal = rt.loose_equals(left, right)?;
                self.stack.push(rt.boolean(equal == (opcode == Opcode::Eq)));
            }
            Opcode::Seq | Opcode::Sne => {
                let right = self.pop(rt)?;
                let left = self.pop(rt)?;
                let equal = rt.strict_equals(left, right);
                self.stack.push(rt.boolean(equal == (opcode == Opcode::Seq)));
            }
            Opcode::LogicalNot => {
                let value = self.pop(rt)?;
                let result = !rt.to_boolean(value);
                self.stack.push(rt.boolean(result));
            }
            Opcode::Concat => {
                let right = self.pop(rt)?;
                let left = self.pop(rt)?;
                let joined = rt.concat(left, right)?;
                self.stack.push(joined);
            }
            Opcode::Typeof => {
                let value = self.pop(rt)?;
                let name = rt.type_of(value);
                let result = rt.string(name);
                self.stack.push(result);
            }
            Opcode::Void => {
                self.pop(rt)?;
                self.stack.push(rt.undefined());
            }
            Opcode::In => {
                let object = self.pop(rt)?;
                let key = self.pop(rt)?;
                let found = rt.in_operator(key, object)?;
                self.stack.push(rt.boolean(found));
            }
            Opcode::InstanceOf => {
                let constructor = self.pop(rt)?;
                let value = self.pop(rt)?;
                let result = rt.instance_of(value, constructor)?;
                self.stack.push(rt.boolean(result));
            }

            other => {
                return Err(rt.internal_error(format!("unknown opcode {} at offset {}", other, start)));
            }
        }
        Ok(Flow::Next)
    }

    /// `TRY_END`: leave the protected region or handler for the `finally`
    /// block, or leave the `finally` block and replay what was pending.
    fn end_try(&mut self, rt: &mut Runtime) -> Result<Flow, HandleId> {
        let Some(frame) = self.try_stack.last_mut() else {
            return Err(rt.internal_error("TRY_END without a try frame"));
        };
        match frame.state {
            TryState::Try | TryState::Catch => {
                if let Some(address) = frame.finally_address {
                    frame.state = TryState::Finally;
                    frame.pending = None;
                    self.offset = address;
                } else {
                    self.try_stack.pop();
                }
                Ok(Flow::Next)
            }
            TryState::Finally => {
                let pending = self.try_stack.pop().and_then(|frame| frame.pending);
                match pending {
                    None => Ok(Flow::Next),
                    Some(PendingCompletion::Throw(exception)) => Err(exception),
                    Some(PendingCompletion::Return(value)) => Ok(Flow::Return(value)),
                    Some(PendingCompletion::Jump(target)) => Ok(Flow::Jump(target)),
                }
            }
        }
    }
}
