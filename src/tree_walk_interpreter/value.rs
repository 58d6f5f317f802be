use std::{cmp::Ordering, fmt::Display};

use crate::ast::{fmt_float, Literal};

use super::{list::List, ExecutionErrorKind};

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    List(List),
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Integer(n) => Value::Integer(*n),
            Literal::Float(n) => Value::Float(*n),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Boolean(b) => Value::Boolean(*b),
        }
    }
}

/// Values of different runtime types are never equal, so `1 == 1.0` is false.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Display form with strings quoted, as used inside lists.
    pub fn quoted(&self) -> Quoted<'_> {
        Quoted(self)
    }

    pub fn as_index(&self) -> Result<i64, ExecutionErrorKind> {
        match self {
            Value::Integer(n) => Ok(*n),
            other => Err(ExecutionErrorKind::NonIntegerIndex(other.clone())),
        }
    }

    pub fn into_list(self) -> Result<List, ExecutionErrorKind> {
        match self {
            Value::List(list) => Ok(list),
            other => Err(ExecutionErrorKind::NotAList(other)),
        }
    }

    /// `int(value)`: truncates floats and parses decimal strings.
    pub fn to_integer(&self) -> Result<i64, ExecutionErrorKind> {
        let invalid = || ExecutionErrorKind::InvalidIntCast(self.clone());
        match self {
            Value::Integer(n) => Ok(*n),
            Value::Float(n) => {
                let truncated = n.trunc();
                if truncated.is_finite()
                    && truncated >= i64::MIN as f64
                    && truncated < i64::MAX as f64
                {
                    Ok(truncated as i64)
                } else {
                    Err(invalid())
                }
            }
            Value::String(s) => s.trim().parse().map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }

    pub fn add(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::List(a), Value::List(b)) => Ok(Value::List(a.concat(&b))),
            (a, b) => arithmetic(
                a,
                b,
                i64::checked_add,
                |a, b| a + b,
                ExecutionErrorKind::InvalidAdd,
            ),
        }
    }

    pub fn sub(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        arithmetic(
            self,
            other,
            i64::checked_sub,
            |a, b| a - b,
            ExecutionErrorKind::InvalidSub,
        )
    }

    pub fn mul(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        arithmetic(
            self,
            other,
            i64::checked_mul,
            |a, b| a * b,
            ExecutionErrorKind::InvalidMult,
        )
    }

    /// Division always produces a float.
    pub fn div(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        let (a, b) = match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => (a as f64, b as f64),
            (Value::Integer(a), Value::Float(b)) => (a as f64, b),
            (Value::Float(a), Value::Integer(b)) => (a, b as f64),
            (Value::Float(a), Value::Float(b)) => (a, b),
            (a, b) => return Err(ExecutionErrorKind::InvalidDiv(a, b)),
        };
        if b == 0.0 {
            return Err(ExecutionErrorKind::DivisionByZero);
        }
        Ok(Value::Float(a / b))
    }

    /// Floored modulo: the result takes the sign of the divisor.
    pub fn rem(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Err(ExecutionErrorKind::ModuloByZero),
            (Value::Integer(a), Value::Integer(b)) => {
                // Only `i64::MIN % -1` wraps, and its result is 0.
                let r = a.wrapping_rem(b);
                let r = if r != 0 && (r < 0) != (b < 0) { r + b } else { r };
                Ok(Value::Integer(r))
            }
            (a, b) => {
                let (a, b) = match (a, b) {
                    (Value::Integer(a), Value::Float(b)) => (a as f64, b),
                    (Value::Float(a), Value::Integer(b)) => (a, b as f64),
                    (Value::Float(a), Value::Float(b)) => (a, b),
                    (a, b) => return Err(ExecutionErrorKind::InvalidMod(a, b)),
                };
                if b == 0.0 {
                    return Err(ExecutionErrorKind::ModuloByZero);
                }
                let r = a % b;
                let r = if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r };
                Ok(Value::Float(r))
            }
        }
    }

    pub fn less(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        compare(self, other, Ordering::is_lt, ExecutionErrorKind::InvalidLess)
    }

    pub fn less_equal(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        compare(self, other, Ordering::is_le, ExecutionErrorKind::InvalidLessEqual)
    }

    pub fn greater(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        compare(self, other, Ordering::is_gt, ExecutionErrorKind::InvalidGreater)
    }

    pub fn greater_equal(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        compare(
            self,
            other,
            Ordering::is_ge,
            ExecutionErrorKind::InvalidGreaterEqual,
        )
    }

    /// Both sides are already evaluated; there is no short-circuit.
    pub fn and(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a && b)),
            (a, b) => Err(ExecutionErrorKind::InvalidAnd(a, b)),
        }
    }

    pub fn or(self, other: Value) -> Result<Value, ExecutionErrorKind> {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => Ok(Value::Boolean(a || b)),
            (a, b) => Err(ExecutionErrorKind::InvalidOr(a, b)),
        }
    }

    pub fn negate(self) -> Result<Value, ExecutionErrorKind> {
        match self {
            Value::Integer(n) => n
                .checked_neg()
                .map(Value::Integer)
                .ok_or(ExecutionErrorKind::IntegerOverflow),
            Value::Float(n) => Ok(Value::Float(-n)),
            x => Err(ExecutionErrorKind::InvalidNegate(x)),
        }
    }

    pub fn not(self) -> Result<Value, ExecutionErrorKind> {
        match self {
            Value::Boolean(b) => Ok(Value::Boolean(!b)),
            x => Err(ExecutionErrorKind::InvalidNot(x)),
        }
    }
}

fn arithmetic(
    a: Value,
    b: Value,
    integer: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
    invalid: fn(Value, Value) -> ExecutionErrorKind,
) -> Result<Value, ExecutionErrorKind> {
    match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => integer(a, b)
            .map(Value::Integer)
            .ok_or(ExecutionErrorKind::IntegerOverflow),
        (Value::Integer(a), Value::Float(b)) => Ok(Value::Float(float(a as f64, b))),
        (Value::Float(a), Value::Integer(b)) => Ok(Value::Float(float(a, b as f64))),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float(a, b))),
        (a, b) => Err(invalid(a, b)),
    }
}

/// Numbers compare with numbers and strings compare lexicographically.
fn compare(
    a: Value,
    b: Value,
    test: fn(Ordering) -> bool,
    invalid: fn(Value, Value) -> ExecutionErrorKind,
) -> Result<Value, ExecutionErrorKind> {
    let ordering = match (a, b) {
        (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(&b)),
        (Value::Integer(a), Value::Float(b)) => (a as f64).partial_cmp(&b),
        (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(b as f64)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(&b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(&b)),
        (a, b) => return Err(invalid(a, b)),
    };
    Ok(Value::Boolean(ordering.map_or(false, test)))
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => fmt_float(f, *n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::List(list) => write!(f, "{}", list),
        }
    }
}

pub struct Quoted<'a>(&'a Value);

impl Display for Quoted<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Value::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}
