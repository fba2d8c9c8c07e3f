//! Operators: arithmetic, bitwise, relational, `in` and `instanceof`.

use core_types::{to_int32, to_uint32, HandleId, PropertyKey, Value};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Signed, ToPrimitive, Zero};

use crate::coerce::{parse_bigint, Numeric, PreferredType};
use crate::runtime::{JsResult, Runtime};

const MIXED_TYPES: &str = "Cannot mix BigInt and other types, use explicit conversions";

/// Binary arithmetic and bitwise operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
    /// `>>>`
    Ushr,
}

/// Relational operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
}

/// Unary numeric operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `+x`
    Plus,
    /// `-x`
    Neg,
    /// `~x`
    BitNot,
    /// `x + 1`
    Inc,
    /// `x - 1`
    Dec,
}

/// `Math.pow` semantics: `1 ** ±Infinity` and `(-1) ** ±Infinity` are NaN
pub(crate) fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() {
        return f64::NAN;
    }
    if exponent.is_infinite() && base.abs() == 1.0 {
        return f64::NAN;
    }
    base.powf(exponent)
}

fn js_rem(a: f64, b: f64) -> f64 {
    if b.is_infinite() && a.is_finite() {
        return a;
    }
    a % b
}

fn number_op(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Mod => js_rem(a, b),
        BinaryOp::Pow => js_pow(a, b),
        BinaryOp::And => f64::from(to_int32(a) & to_int32(b)),
        BinaryOp::Or => f64::from(to_int32(a) | to_int32(b)),
        BinaryOp::Xor => f64::from(to_int32(a) ^ to_int32(b)),
        BinaryOp::Shl => f64::from(to_int32(a).wrapping_shl(to_uint32(b) & 31)),
        BinaryOp::Shr => f64::from(to_int32(a) >> (to_uint32(b) & 31)),
        BinaryOp::Ushr => f64::from(to_uint32(a) >> (to_uint32(b) & 31)),
    }
}

fn compare_utf16(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn compare_bigint_number(big: &BigInt, number: f64) -> Option<std::cmp::Ordering> {
    if number.is_nan() {
        return None;
    }
    if number == f64::INFINITY {
        return Some(std::cmp::Ordering::Less);
    }
    if number == f64::NEG_INFINITY {
        return Some(std::cmp::Ordering::Greater);
    }
    let floor = number.floor();
    let whole = BigInt::from_f64(floor)?;
    match big.cmp(&whole) {
        std::cmp::Ordering::Equal if number > floor => Some(std::cmp::Ordering::Less),
        ordering => Some(ordering),
    }
}

impl Runtime {
    /// Apply a binary arithmetic or bitwise operator
    pub fn binary_op(&mut self, op: BinaryOp, left: HandleId, right: HandleId) -> JsResult {
        let (left, right) = if op == BinaryOp::Add {
            let left = self.to_primitive(left, PreferredType::Default)?;
            let right = self.to_primitive(right, PreferredType::Default)?;
            let is_string = |rt: &Runtime, h| matches!(rt.value(h), Some(Value::String(_)));
            if is_string(self, left) || is_string(self, right) {
                let mut text = self.to_string(left)?;
                text.push_str(&self.to_string(right)?);
                return Ok(self.string(text));
            }
            (left, right)
        } else {
            (left, right)
        };

        match (self.to_numeric(left)?, self.to_numeric(right)?) {
            (Numeric::Number(a), Numeric::Number(b)) => Ok(self.number(number_op(op, a, b))),
            (Numeric::BigInt(a), Numeric::BigInt(b)) => {
                let result = self.bigint_op(op, a, b)?;
                Ok(self.bigint(result))
            }
            _ => Err(self.type_error(MIXED_TYPES)),
        }
    }

    fn bigint_op(&mut self, op: BinaryOp, a: BigInt, b: BigInt) -> JsResult<BigInt> {
        let shift_amount = |rt: &mut Runtime, b: &BigInt| -> JsResult<i64> {
            b.to_i64()
                .filter(|n| n.unsigned_abs() <= u64::from(u32::MAX))
                .ok_or_else(|| rt.range_error("Maximum BigInt size exceeded"))
        };
        let result = match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div | BinaryOp::Mod if b.is_zero() => {
                return Err(self.range_error("Division by zero"));
            }
            BinaryOp::Div => a / b,
            BinaryOp::Mod => a % b,
            BinaryOp::Pow => {
                if b.is_negative() {
                    return Err(self.range_error("Exponent must be non-negative"));
                }
                let exponent = b
                    .to_u32()
                    .ok_or_else(|| self.range_error("Maximum BigInt size exceeded"))?;
                num_traits::pow(a, exponent as usize)
            }
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
            BinaryOp::Shl | BinaryOp::Shr => {
                let mut amount = shift_amount(self, &b)?;
                if op == BinaryOp::Shr {
                    amount = -amount;
                }
                if amount >= 0 {
                    a << (amount as usize)
                } else {
                    // arithmetic shift rounds toward negative infinity
                    let divisor = num_traits::pow(BigInt::from(2), amount.unsigned_abs() as usize);
                    let quotient = &a / &divisor;
                    if a.is_negative() && !(&a % &divisor).is_zero() {
                        quotient - 1
                    } else {
                        quotient
                    }
                }
            }
            BinaryOp::Ushr => {
                return Err(self.type_error("BigInts have no unsigned right shift, use >> instead"));
            }
        };
        Ok(result)
    }

    /// Apply a relational operator
    pub fn compare(&mut self, op: CompareOp, left: HandleId, right: HandleId) -> JsResult<bool> {
        let left = self.to_primitive(left, PreferredType::Number)?;
        let right = self.to_primitive(right, PreferredType::Number)?;

        let textual = match (self.value(left), self.value(right)) {
            (Some(Value::String(a)), Some(Value::String(b))) => Some(Some(compare_utf16(a, b))),
            (Some(Value::BigInt(a)), Some(Value::String(b))) => {
                Some(parse_bigint(b).map(|b| a.cmp(&b)))
            }
            (Some(Value::String(a)), Some(Value::BigInt(b))) => {
                Some(parse_bigint(a).map(|a| a.cmp(b)))
            }
            _ => None,
        };
        let ordering = match textual {
            Some(ordering) => ordering,
            None => match (self.to_numeric(left)?, self.to_numeric(right)?) {
                (Numeric::Number(a), Numeric::Number(b)) => a.partial_cmp(&b),
                (Numeric::BigInt(a), Numeric::BigInt(b)) => Some(a.cmp(&b)),
                (Numeric::BigInt(a), Numeric::Number(b)) => compare_bigint_number(&a, b),
                (Numeric::Number(a), Numeric::BigInt(b)) => {
                    compare_bigint_number(&b, a).map(std::cmp::Ordering::reverse)
                }
            },
        };

        let Some(ordering) = ordering else {
            return Ok(false);
        };
        Ok(match op {
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Le => ordering.is_le(),
            CompareOp::Ge => ordering.is_ge(),
        })
    }

    /// Apply a unary numeric operator
    pub fn unary_op(&mut self, op: UnaryOp, operand: HandleId) -> JsResult {
        if op == UnaryOp::Plus {
            let n = self.to_number(operand)?;
            return Ok(self.number(n));
        }
        match self.to_numeric(operand)? {
            Numeric::Number(n) => {
                let result = match op {
                    UnaryOp::Neg => -n,
                    UnaryOp::BitNot => f64::from(!to_int32(n)),
                    UnaryOp::Inc => n + 1.0,
                    UnaryOp::Dec => n - 1.0,
                    UnaryOp::Plus => n,
                };
                Ok(self.number(result))
            }
            Numeric::BigInt(n) => {
                let result = match op {
                    UnaryOp::Neg => -n,
                    UnaryOp::BitNot => -n - 1,
                    UnaryOp::Inc => n + 1,
                    UnaryOp::Dec => n - 1,
                    UnaryOp::Plus => n,
                };
                Ok(self.bigint(result))
            }
        }
    }

    /// `CONCAT`: join the string forms of two values
    pub fn concat(&mut self, left: HandleId, right: HandleId) -> JsResult {
        let mut text = self.to_string(left)?;
        text.push_str(&self.to_string(right)?);
        Ok(self.string(text))
    }

    /// `key in object`
    pub fn in_operator(&mut self, key: HandleId, object: HandleId) -> JsResult<bool> {
        if !self.is_object_like(object) {
            let shown = self.display(key);
            return Err(self.type_error(format!(
                "Cannot use 'in' operator to search for '{}' in {}",
                shown,
                self.type_of(object)
            )));
        }
        let key = self.to_property_key(key)?;
        Ok(self.has_property(object, &key))
    }

    /// `value instanceof constructor`
    pub fn instance_of(&mut self, value: HandleId, constructor: HandleId) -> JsResult<bool> {
        if !self.is_callable(constructor) {
            return Err(self.type_error("Right-hand side of 'instanceof' is not callable"));
        }
        if !self.is_object_like(value) {
            return Ok(false);
        }
        let prototype = self.get(constructor, &PropertyKey::from("prototype"))?;
        if !self.is_object_like(prototype) {
            return Err(self.type_error(
                "Function has non-object prototype in instanceof check",
            ));
        }
        let mut current = self.get_prototype(value);
        let mut depth = 0;
        while let Some(proto) = current {
            if proto == prototype {
                return Ok(true);
            }
            depth += 1;
            if depth > 10_000 {
                break;
            }
            current = self.get_prototype(proto);
        }
        Ok(false)
    }
}
