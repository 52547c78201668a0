use crate::ast::Expr;
use crate::error::Error;

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Not, Rem, Sub};
use std::rc::Rc;

/// The language's explicit truth value.
///
/// Kept apart from numbers so that `bool(x)`, comparisons and logical
/// operators produce something arithmetic refuses to consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Boolean(bool);

impl Boolean {
    pub const TRUE: Boolean = Boolean(true);
    pub const FALSE: Boolean = Boolean(false);

    pub fn get(self) -> bool {
        self.0
    }
}

impl From<bool> for Boolean {
    fn from(b: bool) -> Self {
        Boolean(b)
    }
}

impl From<Boolean> for bool {
    fn from(b: Boolean) -> Self {
        b.0
    }
}

impl From<Boolean> for f64 {
    fn from(b: Boolean) -> Self {
        if b.0 { 1.0 } else { 0.0 }
    }
}

impl From<f64> for Boolean {
    fn from(n: f64) -> Self {
        Boolean(n != 0.0)
    }
}

impl Not for Boolean {
    type Output = Boolean;
    fn not(self) -> Boolean {
        Boolean(!self.0)
    }
}

impl fmt::Display for Boolean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Expr>,
}

#[derive(Clone, Debug)]
pub enum Value {
    // No branch matched, loop finished, empty block...
    Unit,
    Number(f64),
    Boolean(Boolean),
    String(String),
    Function(Rc<Function>),
    // Result of a declaration shadowing a keyword
    Warning(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "none",
            Value::Number(_) => "number",
            Value::Boolean(_) => "bool",
            Value::String(_) => "string",
            Value::Function(_) => "function",
            Value::Warning(_) => "warning",
        }
    }

    pub fn truthy(&self) -> Boolean {
        match self {
            Value::Unit => Boolean::FALSE,
            Value::Number(n) => Boolean::from(*n),
            Value::Boolean(b) => *b,
            Value::String(s) | Value::Warning(s) => Boolean::from(!s.is_empty()),
            Value::Function(_) => Boolean::TRUE,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn pow(self, exp: Value) -> Result<Value, Error> {
        let (base, exp) = numeric_operands(&self, &exp)?;
        Ok(Value::Number(base.powf(exp)))
    }

    /// Ordering used by `< > <= >=`. Booleans compare as 1 and 0; `None`
    /// means unordered (NaN).
    pub fn compare(&self, other: &Value) -> Result<Option<Ordering>, Error> {
        if let (Value::String(a), Value::String(b)) = (self, other) {
            return Ok(Some(a.cmp(b)));
        }
        match (self.as_comparable_number(), other.as_comparable_number()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(Error::Type(format!(
                "Ordering not supported between instances of {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    fn as_comparable_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Boolean(b) => Some(f64::from(*b)),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Unit, Unit) => true,
            (Number(a), Number(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Number(a), Boolean(b)) | (Boolean(b), Number(a)) => *a == f64::from(*b),
            (String(a), String(b)) => a == b,
            (Warning(a), Warning(b)) => a == b,
            (Function(a), Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn numeric_operands(a: &Value, b: &Value) -> Result<(f64, f64), Error> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        (Value::Number(_), other) | (other, _) => Err(Error::Type(format!(
            "Cannot use mathematical operations on object of type {}",
            other.type_name()
        ))),
    }
}

impl Add for Value {
    type Output = Result<Value, Error>;
    fn add(self, rhs: Value) -> Self::Output {
        let (a, b) = numeric_operands(&self, &rhs)?;
        Ok(Value::Number(a + b))
    }
}

impl Sub for Value {
    type Output = Result<Value, Error>;
    fn sub(self, rhs: Value) -> Self::Output {
        let (a, b) = numeric_operands(&self, &rhs)?;
        Ok(Value::Number(a - b))
    }
}

impl Mul for Value {
    type Output = Result<Value, Error>;
    fn mul(self, rhs: Value) -> Self::Output {
        let (a, b) = numeric_operands(&self, &rhs)?;
        Ok(Value::Number(a * b))
    }
}

impl Div for Value {
    type Output = Result<Value, Error>;
    // IEEE semantics: x/0 is ±inf, 0/0 is NaN.
    fn div(self, rhs: Value) -> Self::Output {
        let (a, b) = numeric_operands(&self, &rhs)?;
        Ok(Value::Number(a / b))
    }
}

impl Rem for Value {
    type Output = Result<Value, Error>;

    // Floored modulo: the result takes the sign of the divisor.
    fn rem(self, rhs: Value) -> Self::Output {
        let (a, b) = numeric_operands(&self, &rhs)?;
        Ok(Value::Number(a - b * (a / b).floor()))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => Ok(()),
            Value::Number(n) => write!(f, "{n}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Warning(w) => write!(f, "{w}"),
            Value::Function(func) => write!(f, "<function {}({})>", func.name, func.params.join(", ")),
        }
    }
}
