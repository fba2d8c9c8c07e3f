//! In-band error channel.
//!
//! A thrown value travels as an *exception* handle: a `Value::Exception`
//! wrapping whatever the script threw. Operations hand it back through the
//! `Err` side of [`JsResult`](crate::JsResult); the VM routes it to the
//! nearest try frame. [`Runtime::report`] turns an uncaught one into a
//! host-side [`JsError`].

use core_types::{ErrorKind, HandleId, JsError, PropertyDescriptor, PropertyKey, Value};

use crate::runtime::Runtime;

impl Runtime {
    /// Create an error object of `kind`.
    ///
    /// The current call stack is captured innermost first. `message` and
    /// `stack` are also exposed as non-enumerable own properties.
    pub fn create_error(&mut self, kind: ErrorKind, message: impl Into<String>) -> HandleId {
        let message = message.into();
        let proto = self.intrinsics.error_prototype_for(kind);
        let stack: Vec<_> = self.call_stack.iter().rev().cloned().collect();

        let mut trace = format!("{}: {}", kind, message);
        for frame in &stack {
            trace.push_str("\n    ");
            trace.push_str(&frame.to_string());
        }
        let message_handle = self.string(message.clone());
        let stack_handle = self.string(trace);

        let mut value = Value::error(Some(proto), kind, message);
        if let Value::Error(err) = &mut value {
            err.stack = stack;
            err.object.properties.insert(
                PropertyKey::from("message"),
                PropertyDescriptor::hidden(message_handle),
            );
            err.object.properties.insert(
                PropertyKey::from("stack"),
                PropertyDescriptor::hidden(stack_handle),
            );
        }
        self.alloc(value)
    }

    /// Wrap a thrown value into an exception handle
    pub fn exception(&mut self, thrown: HandleId) -> HandleId {
        self.alloc(Value::Exception(thrown))
    }

    /// Create an error of `kind` and return it already wrapped as an
    /// exception, ready for `Err(..)`
    pub fn throw_error(&mut self, kind: ErrorKind, message: impl Into<String>) -> HandleId {
        let error = self.create_error(kind, message);
        tracing::trace!(%kind, "error raised");
        self.exception(error)
    }

    /// `TypeError` exception
    pub fn type_error(&mut self, message: impl Into<String>) -> HandleId {
        self.throw_error(ErrorKind::TypeError, message)
    }

    /// `ReferenceError` exception
    pub fn reference_error(&mut self, message: impl Into<String>) -> HandleId {
        self.throw_error(ErrorKind::ReferenceError, message)
    }

    /// `RangeError` exception
    pub fn range_error(&mut self, message: impl Into<String>) -> HandleId {
        self.throw_error(ErrorKind::RangeError, message)
    }

    /// `SyntaxError` exception
    pub fn syntax_error(&mut self, message: impl Into<String>) -> HandleId {
        self.throw_error(ErrorKind::SyntaxError, message)
    }

    /// `InternalError` exception, used for corrupt programs
    pub fn internal_error(&mut self, message: impl Into<String>) -> HandleId {
        self.throw_error(ErrorKind::InternalError, message)
    }

    /// Whether a handle holds an exception
    pub fn is_exception(&self, handle: HandleId) -> bool {
        matches!(self.value(handle), Some(Value::Exception(_)))
    }

    /// Value carried by an exception; any other handle is returned as is
    pub fn thrown_value(&self, exception: HandleId) -> HandleId {
        match self.value(exception) {
            Some(Value::Exception(thrown)) => *thrown,
            _ => exception,
        }
    }

    /// Kind of an error object, looking through an exception wrapper
    pub fn error_kind(&self, handle: HandleId) -> Option<ErrorKind> {
        match self.value(self.thrown_value(handle)) {
            Some(Value::Error(err)) => Some(err.kind),
            _ => None,
        }
    }

    /// Message of an error object, looking through an exception wrapper
    pub fn error_message(&self, handle: HandleId) -> Option<&str> {
        match self.value(self.thrown_value(handle)) {
            Some(Value::Error(err)) => Some(&err.message),
            _ => None,
        }
    }

    /// Build the host-side report of an uncaught exception.
    ///
    /// Error objects keep their kind, message and captured stack. Any other
    /// thrown value is reported as a plain `Error` whose message is the
    /// value's string form.
    pub fn report(&mut self, exception: HandleId) -> JsError {
        let thrown = self.thrown_value(exception);
        if let Some(Value::Error(err)) = self.value(thrown) {
            return JsError::new(err.kind, err.message.clone()).with_stack(err.stack.clone());
        }
        let message = match self.to_string(thrown) {
            Ok(text) => text,
            Err(_) => self.kind(thrown).to_string(),
        };
        JsError::new(ErrorKind::Error, message)
    }
}
