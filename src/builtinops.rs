//! Special-form keywords and the primitive procedure library.
//!
//! ## Special Forms vs Primitives
//!
//! - **Special forms** (`quote`, `if`, `define`, `set!`, `lambda`, `begin`)
//!   control the evaluation of their sub-forms. They form a closed
//!   [`SpecialForm`] enumeration that the evaluator checks *before* looking a
//!   symbol up, so a user binding named `if` can never shadow the keyword.
//! - **Primitives** evaluate all arguments before application and are ordinary
//!   [`Procedure`](crate::ast::Procedure) values bound in the global
//!   environment, so they can be passed around like closures:
//!
//! ```scheme
//! ((if (> n 0) + -) 0 n)
//! (map car (list (list 1 2) (list 3 4)))   ; (1 3)
//! ```
//!
//! ## Error Handling
//!
//! - **Type Safety**: Primitives reject incorrect types (e.g. `(not 42)` errors)
//! - **No Coercion**: no "truthiness", numbers never become booleans
//! - **Arity Checking**: every primitive validates its argument count
//!
//! ## Adding New Primitives
//!
//! 1. **Implement the function** with typed parameters (`f64`, `bool`,
//!    `Expression`, `Procedure`, `ValueIter<'_>`) or, when it needs the call
//!    environment, the raw `fn(Vec<Expression>, &Environment)` signature
//! 2. **Add it to [`builtin_ops`]** with its identifier and arity
//! 3. **Add tests** covering edge cases and error conditions

use crate::Error;
use crate::ast::{Expression, NumberType, Procedure};
use crate::evaluator::intooperation::{
    IntoOperation, IntoVariadicOperation, PrimitiveFn, ValueIter, ValuesRest,
};
use crate::evaluator::{Environment, apply};
use std::rc::Rc;

/// Argument count accepted by an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many arguments
    Exact(usize),
    /// This many arguments or more
    AtLeast(usize),
    /// Any number of arguments
    Any,
}

impl Arity {
    /// Check an argument count, reporting the expected minimum on failure
    pub fn validate(&self, arg_count: usize) -> Result<(), Error> {
        match *self {
            Arity::Exact(expected) if arg_count != expected => {
                Err(Error::arity_error(expected, arg_count))
            }
            Arity::AtLeast(min) if arg_count < min => Err(Error::arity_error(min, arg_count)),
            _ => Ok(()),
        }
    }
}

/// The syntactic keywords recognized by the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialForm {
    Quote,
    If,
    Define,
    Set,
    Lambda,
    Begin,
}

impl SpecialForm {
    pub const ALL: [SpecialForm; 6] = [
        SpecialForm::Quote,
        SpecialForm::If,
        SpecialForm::Define,
        SpecialForm::Set,
        SpecialForm::Lambda,
        SpecialForm::Begin,
    ];

    /// Recognize a keyword symbol
    pub fn from_keyword(name: &str) -> Option<Self> {
        match name {
            "quote" => Some(SpecialForm::Quote),
            "if" => Some(SpecialForm::If),
            "define" => Some(SpecialForm::Define),
            "set!" => Some(SpecialForm::Set),
            "lambda" => Some(SpecialForm::Lambda),
            "begin" => Some(SpecialForm::Begin),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SpecialForm::Quote => "quote",
            SpecialForm::If => "if",
            SpecialForm::Define => "define",
            SpecialForm::Set => "set!",
            SpecialForm::Lambda => "lambda",
            SpecialForm::Begin => "begin",
        }
    }

    /// Number of sub-forms following the keyword
    pub fn arity(self) -> Arity {
        match self {
            SpecialForm::Quote => Arity::Exact(1),
            SpecialForm::If => Arity::Exact(3),
            SpecialForm::Define | SpecialForm::Set | SpecialForm::Lambda => Arity::Exact(2),
            SpecialForm::Begin => Arity::AtLeast(1),
        }
    }
}

/// Definition of a primitive procedure
#[derive(Clone)]
pub struct BuiltinOp {
    /// The identifier the primitive is bound to
    pub id: &'static str,
    /// Expected number of arguments
    pub arity: Arity,
    /// The implementation
    pub func: Rc<PrimitiveFn>,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("id", &self.id)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

//
// Primitive Implementations
//

// Binary arithmetic and comparison map straight onto the host f64 operators
macro_rules! numeric_binary {
    ($name:ident, $op:tt, $out:ty) => {
        fn $name(a: NumberType, b: NumberType) -> $out {
            a $op b
        }
    };
}

numeric_binary!(builtin_add, +, NumberType);
numeric_binary!(builtin_sub, -, NumberType);
numeric_binary!(builtin_mul, *, NumberType);
numeric_binary!(builtin_div, /, NumberType);
numeric_binary!(builtin_rem, %, NumberType);
numeric_binary!(builtin_lt, <, bool);
numeric_binary!(builtin_le, <=, bool);
numeric_binary!(builtin_eq, ==, bool);
numeric_binary!(builtin_gt, >, bool);
numeric_binary!(builtin_ge, >=, bool);

fn builtin_car(mut list: ValueIter<'_>) -> Result<Expression, Error> {
    match list.next() {
        Some(first) => Ok(first.clone()),
        None => Err(Error::EvalError("car of empty list".into())),
    }
}

fn builtin_cdr(mut list: ValueIter<'_>) -> Result<Expression, Error> {
    let Some(_) = list.next() else {
        return Err(Error::EvalError("cdr of empty list".into()));
    };

    Ok(Expression::List(list.as_slice().to_vec()))
}

fn builtin_cons(first: Expression, rest: Expression) -> Result<Expression, Error> {
    match rest {
        Expression::List(mut tail) => {
            tail.insert(0, first);
            Ok(Expression::List(tail))
        }
        other => Err(Error::TypeError(format!(
            "expected list as second argument, got {}",
            other.type_name()
        ))),
    }
}

fn builtin_append(first: ValueIter<'_>, second: ValueIter<'_>) -> Expression {
    Expression::List(first.chain(second).cloned().collect())
}

fn builtin_list(args: ValueIter<'_>) -> Expression {
    Expression::List(args.cloned().collect())
}

fn builtin_length(list: ValueIter<'_>) -> NumberType {
    list.len() as NumberType
}

fn builtin_is_list(value: Expression) -> bool {
    matches!(value, Expression::List(_))
}

fn builtin_is_null(value: Expression) -> bool {
    value.is_nil()
}

fn builtin_is_number(value: Expression) -> bool {
    matches!(value, Expression::Number(_))
}

fn builtin_is_procedure(value: Expression) -> bool {
    matches!(value, Expression::Procedure(_))
}

fn builtin_is_symbol(value: Expression) -> bool {
    matches!(value, Expression::Symbol(_))
}

fn builtin_not(b: bool) -> bool {
    !b
}

fn builtin_equal(first: Expression, second: Expression) -> Result<bool, Error> {
    // Structural equality; procedures have no observable structure to compare,
    // whether given directly or nested inside a list
    if contains_procedure(&first) || contains_procedure(&second) {
        return Err(Error::TypeError("cannot compare procedures".to_owned()));
    }
    Ok(first == second)
}

fn contains_procedure(expr: &Expression) -> bool {
    match expr {
        Expression::Procedure(_) => true,
        Expression::List(items) => items.iter().any(contains_procedure),
        _ => false,
    }
}

/// Split `(f list)` arguments shared by `map` and `apply`
fn procedure_and_list(args: Vec<Expression>) -> Result<(Procedure, Vec<Expression>), Error> {
    let [procedure, list]: [Expression; 2] = args
        .try_into()
        .map_err(|args: Vec<Expression>| Error::arity_error(2, args.len()))?;
    let procedure: Procedure = procedure.try_into()?;
    match list {
        Expression::List(items) => Ok((procedure, items)),
        other => Err(Error::TypeError(format!(
            "expected list, got {}",
            other.type_name()
        ))),
    }
}

// `map` and `apply` call back into the evaluator, so they take the raw
// argument vector together with the caller's environment.
fn builtin_map(args: Vec<Expression>, env: &Environment) -> Result<Expression, Error> {
    let (procedure, items) = procedure_and_list(args)?;
    items
        .into_iter()
        .map(|item| apply(&procedure, vec![item], env))
        .collect::<Result<Vec<_>, _>>()
        .map(Expression::List)
}

fn builtin_apply(args: Vec<Expression>, env: &Environment) -> Result<Expression, Error> {
    let (procedure, items) = procedure_and_list(args)?;
    apply(&procedure, items, env)
}

/// Build the primitive library.
///
/// A fresh table is built for every global environment; nothing here is
/// process-global.
pub fn builtin_ops() -> Vec<BuiltinOp> {
    fn fixed<Args, F>(f: F) -> Rc<PrimitiveFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn variadic<Args, F>(f: F) -> Rc<PrimitiveFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    fn raw(f: fn(Vec<Expression>, &Environment) -> Result<Expression, Error>) -> Rc<PrimitiveFn> {
        Rc::new(f)
    }

    type Num = NumberType;
    let op = |id, arity, func| BuiltinOp { id, arity, func };

    vec![
        // Arithmetic
        op("+", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_add)),
        op("-", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_sub)),
        op("*", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_mul)),
        op("/", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_div)),
        op("%", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_rem)),
        // Comparison
        op("<", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_lt)),
        op("<=", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_le)),
        op("=", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_eq)),
        op(">", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_gt)),
        op(">=", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_ge)),
        // Lists
        op("car", Arity::Exact(1), fixed::<(ValueIter<'static>,), _>(builtin_car)),
        op("cdr", Arity::Exact(1), fixed::<(ValueIter<'static>,), _>(builtin_cdr)),
        op("cons", Arity::Exact(2), fixed::<(Expression, Expression), _>(builtin_cons)),
        op(
            "append",
            Arity::Exact(2),
            fixed::<(ValueIter<'static>, ValueIter<'static>), _>(builtin_append),
        ),
        op("list", Arity::Any, variadic::<(ValuesRest,), _>(builtin_list)),
        op("length", Arity::Exact(1), fixed::<(ValueIter<'static>,), _>(builtin_length)),
        // Predicates
        op("list?", Arity::Exact(1), fixed::<(Expression,), _>(builtin_is_list)),
        op("null?", Arity::Exact(1), fixed::<(Expression,), _>(builtin_is_null)),
        op("number?", Arity::Exact(1), fixed::<(Expression,), _>(builtin_is_number)),
        op("procedure?", Arity::Exact(1), fixed::<(Expression,), _>(builtin_is_procedure)),
        op("symbol?", Arity::Exact(1), fixed::<(Expression,), _>(builtin_is_symbol)),
        op("not", Arity::Exact(1), fixed::<(bool,), _>(builtin_not)),
        op("equal?", Arity::Exact(2), fixed::<(Expression, Expression), _>(builtin_equal)),
        // Numeric identity, an alias of `=`
        op("eq?", Arity::Exact(2), fixed::<(Num, Num), _>(builtin_eq)),
        // Higher-order
        op("map", Arity::Exact(2), raw(builtin_map)),
        op("apply", Arity::Exact(2), raw(builtin_apply)),
    ]
}

/// Register every primitive into `env`.
///
/// Type errors are prefixed with the primitive's name so that
/// `(+ 1 #t)` reports which operation rejected the argument.
pub(crate) fn install_builtins(env: &Environment) {
    for BuiltinOp { id, arity, func } in builtin_ops() {
        let wrapped: Rc<PrimitiveFn> = Rc::new(move |args: Vec<Expression>, env: &Environment| {
            arity.validate(args.len())?;
            func(args, env).map_err(|err| match err {
                Error::TypeError(msg) => Error::TypeError(format!("{id}: {msg}")),
                other => other,
            })
        });
        env.define_primitive(id, wrapped);
    }
}
