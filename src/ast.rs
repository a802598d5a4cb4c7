//! This module defines the core expression type shared by the reader and the
//! evaluator. [`Expression`] is both the syntax tree produced by parsing and the
//! runtime value representation: a parsed `(+ 1 2)` is a `List` of a `Symbol`
//! and two `Number`s, and the result of `(list 1 2)` is the same kind of `List`.
//! Ergonomic helper functions such as [`val`], [`sym`] and [`nil`] are provided
//! for convenient construction in code and tests. `Display` implements the
//! printed form used by the REPL and the regression table.

use crate::Error;
use crate::evaluator::Environment;
use crate::evaluator::intooperation::PrimitiveFn;
use std::rc::Rc;

/// Type alias for number values in the interpreter
pub(crate) type NumberType = f64;

/// Core expression type
///
/// To build an expression, use the ergonomic helper functions:
/// - `val(42)` for values, `sym("name")` for symbols, `nil()` for empty lists
/// - `val([1, 2, 3])` for homogeneous lists
/// - `val(vec![sym("op"), val(42)])` for mixed lists
#[derive(Clone)]
pub enum Expression {
    /// Numbers (all numeric literals are doubles)
    Number(NumberType),
    /// Boolean values
    Boolean(bool),
    /// Symbols (identifiers)
    Symbol(String),
    /// Lists; the empty list is the only nil value
    List(Vec<Expression>),
    /// Primitive procedures and closures
    Procedure(Procedure),
}

/// A callable value.
#[derive(Clone)]
pub enum Procedure {
    /// Native function, compared by its registration id
    Primitive { id: String, func: Rc<PrimitiveFn> },
    /// User-defined function created by `lambda`
    Closure(Rc<Closure>),
}

/// Parameters, body and defining environment of a `lambda`.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Expression,
    pub env: Environment,
}

impl std::fmt::Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Number(n) => write!(f, "Number({n})"),
            Expression::Boolean(b) => write!(f, "Boolean({b})"),
            Expression::Symbol(s) => write!(f, "Symbol({s})"),
            Expression::List(list) => {
                write!(f, "List(")?;
                for (i, v) in list.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v:?}")?;
                }
                write!(f, ")")
            }
            Expression::Procedure(Procedure::Primitive { id, .. }) => write!(f, "Primitive({id})"),
            Expression::Procedure(Procedure::Closure(closure)) => write!(
                f,
                "Closure(params={:?}, body={:?})",
                closure.params, closure.body
            ),
        }
    }
}

// From trait implementations for Expression - enables .into() conversion
impl From<bool> for Expression {
    fn from(b: bool) -> Self {
        Expression::Boolean(b)
    }
}

impl From<f64> for Expression {
    fn from(n: f64) -> Self {
        Expression::Number(n)
    }
}

impl From<Procedure> for Expression {
    fn from(p: Procedure) -> Self {
        Expression::Procedure(p)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Expression {
            fn from(n: $int_type) -> Self {
                Expression::Number(NumberType::from(n))
            }
        }
    };
}

// Integer literals in tests and host code widen losslessly to f64
impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);
impl_from_integer!(f32);

impl<T: Into<Expression>> From<Vec<T>> for Expression {
    fn from(v: Vec<T>) -> Self {
        Expression::List(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T: Into<Expression>, const N: usize> From<[T; N]> for Expression {
    fn from(arr: [T; N]) -> Self {
        Expression::List(arr.into_iter().map(|x| x.into()).collect())
    }
}

// Fallible conversions from `Expression` back into primitive Rust types.

impl std::convert::TryInto<NumberType> for Expression {
    type Error = Error;

    fn try_into(self) -> Result<NumberType, Error> {
        if let Expression::Number(n) = self {
            Ok(n)
        } else {
            Err(Error::TypeError(format!("expected number, got {}", self.type_name())))
        }
    }
}

impl std::convert::TryInto<bool> for Expression {
    type Error = Error;

    fn try_into(self) -> Result<bool, Error> {
        if let Expression::Boolean(b) = self {
            Ok(b)
        } else {
            Err(Error::TypeError(format!("expected boolean, got {}", self.type_name())))
        }
    }
}

impl std::convert::TryInto<Procedure> for Expression {
    type Error = Error;

    fn try_into(self) -> Result<Procedure, Error> {
        if let Expression::Procedure(p) = self {
            Ok(p)
        } else {
            Err(Error::TypeError(format!("expected procedure, got {}", self.type_name())))
        }
    }
}

/// Helper function for creating symbols
pub fn sym<S: AsRef<str>>(name: S) -> Expression {
    Expression::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating expressions from anything convertible
pub fn val<T: Into<Expression>>(value: T) -> Expression {
    value.into()
}

/// Helper function for creating the empty list (nil)
pub fn nil() -> Expression {
    Expression::List(vec![])
}

/// Print a number the way the REPL shows it: integral values without a
/// fraction, very large or very small magnitudes in scientific notation.
fn format_number(f: &mut std::fmt::Formatter<'_>, n: NumberType) -> std::fmt::Result {
    let magnitude = n.abs();
    if n.is_finite() && magnitude != 0.0 && !(1e-7..1e21).contains(&magnitude) {
        write!(f, "{n:e}")
    } else {
        write!(f, "{n}")
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Number(n) => format_number(f, *n),
            Expression::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
            Expression::Symbol(s) => write!(f, "{s}"),
            // The empty list prints as nothing; this doubles as "no value"
            Expression::List(elements) if elements.is_empty() => Ok(()),
            Expression::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Expression::Procedure(_) => write!(f, "#<procedure>"),
        }
    }
}

impl Expression {
    /// Check if an expression is nil (the empty list)
    pub fn is_nil(&self) -> bool {
        matches!(self, Expression::List(list) if list.is_empty())
    }

    /// Variant name used in type error messages
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Expression::Number(_) => "number",
            Expression::Boolean(_) => "boolean",
            Expression::Symbol(_) => "symbol",
            Expression::List(_) => "list",
            Expression::Procedure(_) => "procedure",
        }
    }
}

impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Compare primitives by id string, not function pointer
            (Procedure::Primitive { id: id1, .. }, Procedure::Primitive { id: id2, .. }) => {
                id1 == id2
            }
            // Closures are equal only to themselves
            (Procedure::Closure(c1), Procedure::Closure(c2)) => Rc::ptr_eq(c1, c2),
            _ => false,
        }
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Expression::Number(a), Expression::Number(b)) => a == b,
            (Expression::Boolean(a), Expression::Boolean(b)) => a == b,
            (Expression::Symbol(a), Expression::Symbol(b)) => a == b,
            (Expression::List(a), Expression::List(b)) => a == b,
            (Expression::Procedure(a), Expression::Procedure(b)) => a == b,
            _ => false, // Different variants are never equal
        }
    }
}
