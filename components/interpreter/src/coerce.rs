//! Type conversions and equality.

use core_types::{number_to_string, string_to_number, HandleId, Value, ValueKind};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Zero};

use crate::runtime::{JsResult, Runtime};

/// Internal slot holding the primitive wrapped by `to_object`
pub const PRIMITIVE_VALUE_SLOT: &str = "[[PrimitiveValue]]";

/// Hint passed to `to_primitive`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    /// No preference (`+`, `==`)
    Default,
    /// Numeric context
    Number,
    /// String context
    String,
}

impl PreferredType {
    fn as_str(self) -> &'static str {
        match self {
            PreferredType::Default => "default",
            PreferredType::Number => "number",
            PreferredType::String => "string",
        }
    }
}

/// Result of `to_numeric`
#[derive(Debug, Clone, PartialEq)]
pub enum Numeric {
    /// IEEE 754 number
    Number(f64),
    /// Arbitrary precision integer
    BigInt(BigInt),
}

/// Parse the string form of a BigInt; surrounding whitespace is ignored and
/// the empty string is zero
pub(crate) fn parse_bigint(text: &str) -> Option<BigInt> {
    let text = text.trim();
    if text.is_empty() {
        return Some(BigInt::zero());
    }
    text.parse::<BigInt>().ok()
}

fn bigint_equals_number(big: &BigInt, number: f64) -> bool {
    number.is_finite() && number.fract() == 0.0 && BigInt::from_f64(number).as_ref() == Some(big)
}

fn loose_primitive_equals(a: &Value, b: &Value) -> bool {
    let nullish = |v: &Value| matches!(v, Value::Undefined | Value::Null | Value::Uninitialized);
    match (a, b) {
        (x, y) if nullish(x) && nullish(y) => true,
        (x, y) if nullish(x) || nullish(y) => false,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::BigInt(x), Value::BigInt(y)) => x == y,
        (Value::Symbol(x), Value::Symbol(y)) => x.id == y.id,
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            *n == string_to_number(s)
        }
        (Value::BigInt(big), Value::String(s)) | (Value::String(s), Value::BigInt(big)) => {
            parse_bigint(s).as_ref() == Some(big)
        }
        (Value::BigInt(big), Value::Number(n)) | (Value::Number(n), Value::BigInt(big)) => {
            bigint_equals_number(big, *n)
        }
        (Value::Boolean(flag), other) | (other, Value::Boolean(flag)) => {
            loose_primitive_equals(&Value::Number(if *flag { 1.0 } else { 0.0 }), other)
        }
        _ => false,
    }
}

impl Runtime {
    /// Whether a handle holds an object-like value
    pub fn is_object_like(&self, handle: HandleId) -> bool {
        self.value(handle).is_some_and(Value::is_object_like)
    }

    /// Whether a handle holds a function
    pub fn is_callable(&self, handle: HandleId) -> bool {
        self.value(handle).is_some_and(Value::is_callable)
    }

    /// Whether a handle holds `null` or `undefined`
    pub fn is_nullish(&self, handle: HandleId) -> bool {
        matches!(
            self.value(handle),
            None | Some(Value::Undefined) | Some(Value::Null) | Some(Value::Uninitialized)
        )
    }

    /// Truthiness
    pub fn to_boolean(&self, handle: HandleId) -> bool {
        self.value(handle).is_some_and(Value::to_boolean)
    }

    /// Result of the `typeof` operator
    pub fn type_of(&self, handle: HandleId) -> &'static str {
        self.value(handle).map(Value::type_name).unwrap_or("undefined")
    }

    /// Convert an object-like value to a primitive.
    ///
    /// `Symbol.toPrimitive` wins when present; otherwise `valueOf` and
    /// `toString` are tried in the order the hint asks for.
    pub fn to_primitive(&mut self, value: HandleId, hint: PreferredType) -> JsResult {
        if !self.is_object_like(value) {
            return Ok(value);
        }
        let to_primitive = self.intrinsics.symbols.to_primitive;
        if let Some(key) = self.symbol_key(to_primitive) {
            let exotic = self.get(value, &key)?;
            if !self.is_nullish(exotic) {
                if !self.is_callable(exotic) {
                    return Err(self.type_error("Symbol.toPrimitive is not a function"));
                }
                let hint = self.string(hint.as_str());
                let result = self.call(exotic, value, &[hint])?;
                if self.is_object_like(result) {
                    return Err(self.type_error("Cannot convert object to primitive value"));
                }
                return Ok(result);
            }
        }
        let order = match hint {
            PreferredType::String => ["toString", "valueOf"],
            _ => ["valueOf", "toString"],
        };
        for name in order {
            let method = self.get(value, &name.into())?;
            if self.is_callable(method) {
                let result = self.call(method, value, &[])?;
                if !self.is_object_like(result) {
                    return Ok(result);
                }
            }
        }
        Err(self.type_error("Cannot convert object to primitive value"))
    }

    /// String conversion
    pub fn to_string(&mut self, value: HandleId) -> JsResult<String> {
        let text = match self.value(value) {
            None | Some(Value::Undefined) | Some(Value::Uninitialized) => "undefined".to_string(),
            Some(Value::Null) => "null".to_string(),
            Some(Value::Boolean(b)) => b.to_string(),
            Some(Value::Number(n)) => number_to_string(*n),
            Some(Value::BigInt(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Interrupt(_)) => "[object Interrupt]".to_string(),
            Some(Value::Exception(thrown)) => {
                let thrown = *thrown;
                return self.to_string(thrown);
            }
            Some(Value::Symbol(_)) => {
                return Err(self.type_error("Cannot convert a Symbol value to a string"));
            }
            Some(_) => {
                let primitive = self.to_primitive(value, PreferredType::String)?;
                return self.to_string(primitive);
            }
        };
        Ok(text)
    }

    /// String form for diagnostics; never fails
    pub fn display(&mut self, value: HandleId) -> String {
        if let Some(Value::Symbol(symbol)) = self.value(value) {
            return format!("Symbol({})", symbol.description.as_deref().unwrap_or(""));
        }
        if let Some(callable) = self.value(value).and_then(Value::as_callable) {
            return match callable.name.as_str() {
                "" => "anonymous".to_string(),
                name => name.to_string(),
            };
        }
        match self.to_string(value) {
            Ok(text) => text,
            Err(_) => format!("[object {}]", self.kind(value)),
        }
    }

    /// Number conversion; BigInts and symbols raise a `TypeError`
    pub fn to_number(&mut self, value: HandleId) -> JsResult<f64> {
        let number = match self.value(value) {
            None | Some(Value::Undefined) | Some(Value::Uninitialized) => f64::NAN,
            Some(Value::Null) => 0.0,
            Some(Value::Boolean(b)) => f64::from(u8::from(*b)),
            Some(Value::Number(n)) => *n,
            Some(Value::String(s)) => string_to_number(s),
            Some(Value::BigInt(_)) => {
                return Err(self.type_error("Cannot convert a BigInt value to a number"));
            }
            Some(Value::Symbol(_)) => {
                return Err(self.type_error("Cannot convert a Symbol value to a number"));
            }
            Some(Value::Interrupt(_)) | Some(Value::Exception(_)) => f64::NAN,
            Some(_) => {
                let primitive = self.to_primitive(value, PreferredType::Number)?;
                return self.to_number(primitive);
            }
        };
        Ok(number)
    }

    /// Numeric conversion keeping BigInts
    pub fn to_numeric(&mut self, value: HandleId) -> JsResult<Numeric> {
        let primitive = self.to_primitive(value, PreferredType::Number)?;
        if let Some(Value::BigInt(n)) = self.value(primitive) {
            return Ok(Numeric::BigInt(n.clone()));
        }
        Ok(Numeric::Number(self.to_number(primitive)?))
    }

    /// Box a primitive into an object; object-like values are returned as is
    pub fn to_object(&mut self, value: HandleId) -> JsResult {
        if self.is_object_like(value) {
            return Ok(value);
        }
        if self.is_nullish(value) {
            return Err(self.type_error("Cannot convert undefined or null to object"));
        }
        let object = self.create_object();
        self.set_internal(object, PRIMITIVE_VALUE_SLOT, Some(value));
        Ok(object)
    }

    /// Strict equality: NaN is unequal to itself, strings compare by
    /// content, objects and symbols by identity
    pub fn strict_equals(&self, a: HandleId, b: HandleId) -> bool {
        match (self.value(a), self.value(b)) {
            (Some(Value::Number(x)), Some(Value::Number(y))) => x == y,
            (Some(Value::String(x)), Some(Value::String(y))) => x == y,
            (Some(Value::Boolean(x)), Some(Value::Boolean(y))) => x == y,
            (Some(Value::BigInt(x)), Some(Value::BigInt(y))) => x == y,
            (Some(Value::Symbol(x)), Some(Value::Symbol(y))) => x.id == y.id,
            (Some(x), Some(y)) if x.is_object_like() || y.is_object_like() => a == b,
            (x, y) => {
                let kind = |v: Option<&Value>| v.map(Value::kind).unwrap_or(ValueKind::Undefined);
                let normalize = |k: ValueKind| match k {
                    ValueKind::Uninitialized => ValueKind::Undefined,
                    other => other,
                };
                let (kx, ky) = (normalize(kind(x)), normalize(kind(y)));
                kx == ky && matches!(kx, ValueKind::Undefined | ValueKind::Null) || a == b
            }
        }
    }

    /// Loose equality (`==`)
    pub fn loose_equals(&mut self, a: HandleId, b: HandleId) -> JsResult<bool> {
        let (a_object, b_object) = (self.is_object_like(a), self.is_object_like(b));
        if a_object && b_object {
            return Ok(a == b);
        }
        if (a_object && self.is_nullish(b)) || (b_object && self.is_nullish(a)) {
            return Ok(false);
        }
        let a = if a_object {
            self.to_primitive(a, PreferredType::Default)?
        } else {
            a
        };
        let b = if b_object {
            self.to_primitive(b, PreferredType::Default)?
        } else {
            b
        };
        Ok(match (self.value(a), self.value(b)) {
            (Some(x), Some(y)) => loose_primitive_equals(x, y),
            _ => false,
        })
    }

    /// `CLONE`: objects keep their identity, primitives get a fresh handle
    pub fn structural_copy(&mut self, value: HandleId) -> HandleId {
        let copy = match self.value(value) {
            None | Some(Value::Undefined) => return self.undefined(),
            Some(Value::Null) => return self.null(),
            Some(Value::Uninitialized) => return self.uninitialized(),
            Some(Value::Boolean(b)) => return self.boolean(*b),
            Some(v) if v.is_object_like() => return value,
            Some(Value::Interrupt(_)) | Some(Value::Exception(_)) => return value,
            Some(v) => v.clone(),
        };
        self.alloc(copy)
    }
}
