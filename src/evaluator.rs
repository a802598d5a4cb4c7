use crate::{Error, MAX_EVAL_DEPTH, ParseErrorKind};
use crate::ast::{Closure, Expression, Procedure};
use crate::builtinops::{SpecialForm, install_builtins};
use std::cell::Cell;
use std::rc::Rc;

mod environment;
pub mod intooperation;

pub use environment::Environment;

thread_local! {
    /// Procedure applications currently in progress on this thread
    static CALL_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks one procedure application as active; dropping it pops the level.
///
/// Every application goes through [`apply`], including calls made from
/// primitives such as `map`, so the count cannot be reset by re-entering
/// the evaluator.
struct CallDepthGuard;

impl CallDepthGuard {
    fn enter() -> Result<Self, Error> {
        CALL_DEPTH.with(|depth| {
            let current = depth.get();
            if current >= MAX_EVAL_DEPTH {
                return Err(Error::EvalError(format!(
                    "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
                )));
            }
            depth.set(current + 1);
            Ok(CallDepthGuard)
        })
    }
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        CALL_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Create a global environment populated with the primitive library
pub fn create_global_env() -> Environment {
    let env = Environment::new();
    install_builtins(&env);
    env
}

/// Evaluate an expression (public API)
pub fn eval(expr: &Expression, env: &Environment) -> Result<Expression, Error> {
    match expr {
        // Variable lookup
        Expression::Symbol(name) => env.get(name),

        // Self-evaluating forms, including the empty list
        Expression::Number(_) | Expression::Boolean(_) | Expression::Procedure(_) => {
            Ok(expr.clone())
        }
        Expression::List(elements) if elements.is_empty() => Ok(expr.clone()),

        // Special forms or procedure application
        Expression::List(elements) => {
            eval_list(elements, env).map_err(|err| add_context(err, expr))
        }
    }
}

/// Apply a procedure to already-evaluated arguments.
///
/// `env` is the caller's environment; primitives receive it, closures
/// ignore it and run in a frame whose parent is their defining environment.
/// Nesting of applications is limited to [`MAX_EVAL_DEPTH`].
pub fn apply(
    procedure: &Procedure,
    args: Vec<Expression>,
    env: &Environment,
) -> Result<Expression, Error> {
    let _level = CallDepthGuard::enter()?;
    match procedure {
        Procedure::Primitive { id, func } => {
            log::trace!("apply primitive {id} to {} argument(s)", args.len());
            func(args, env)
        }
        Procedure::Closure(closure) => {
            let frame = Environment::bind_frame(&closure.params, args, &closure.env)?;
            eval(&closure.body, &frame).map_err(|err| match err {
                Error::EvalError(msg) if !msg.contains("In lambda:") => {
                    Error::EvalError(format!("{msg}\n  In lambda: {}", closure.body))
                }
                other => other,
            })
        }
    }
}

/// Helper function to add expression context to errors
fn add_context(error: Error, expr: &Expression) -> Error {
    let context = format!("while evaluating: {expr}");
    match error {
        Error::EvalError(msg) if !msg.contains("Context:") => {
            Error::EvalError(format!("{msg}\n  Context: {context}"))
        }
        Error::TypeError(msg) if !msg.contains("Context:") => {
            Error::TypeError(format!("{msg}\n  Context: {context}"))
        }
        Error::ArityError {
            expected,
            got,
            expression: None,
        } => Error::arity_error_with_expr(expected, got, expr.to_string()),
        // Syntax and unbound-symbol errors carry their own context
        other => other,
    }
}

/// Evaluate a non-empty list: a special form if the head is one of the
/// keywords, otherwise procedure application.
fn eval_list(elements: &[Expression], env: &Environment) -> Result<Expression, Error> {
    let [head, args @ ..] = elements else {
        return Ok(Expression::List(Vec::new()));
    };

    // Keywords are recognized before the head is looked up as a variable
    if let Expression::Symbol(name) = head
        && let Some(form) = SpecialForm::from_keyword(name)
    {
        form.arity().validate(args.len())?;
        return match form {
            SpecialForm::Quote => eval_quote(args),
            SpecialForm::If => eval_if(args, env),
            SpecialForm::Define => eval_define(args, env),
            SpecialForm::Set => eval_set(args, env),
            SpecialForm::Lambda => eval_lambda(args, env),
            SpecialForm::Begin => eval_begin(args, env),
        };
    }

    let func = eval(head, env)?;
    // Arguments are evaluated left to right
    let args = args
        .iter()
        .map(|arg| eval(arg, env))
        .collect::<Result<Vec<_>, _>>()?;

    match &func {
        Expression::Procedure(procedure) => apply(procedure, args, env),
        _ => Err(Error::TypeError(format!(
            "cannot apply non-procedure {}: {func}",
            func.type_name()
        ))),
    }
}

/// `(quote datum)`
fn eval_quote(args: &[Expression]) -> Result<Expression, Error> {
    match args {
        [datum] => Ok(datum.clone()),
        _ => Err(Error::arity_error(1, args.len())),
    }
}

/// `(if test consequent alternative)`
fn eval_if(args: &[Expression], env: &Environment) -> Result<Expression, Error> {
    match args {
        [test, consequent, alternative] => match eval(test, env)? {
            Expression::Boolean(true) => eval(consequent, env),
            Expression::Boolean(false) => eval(alternative, env),
            other => Err(Error::TypeError(format!(
                "if condition must be a boolean, got {}",
                other.type_name()
            ))),
        },
        _ => Err(Error::arity_error(3, args.len())),
    }
}

/// `(define name value)`
fn eval_define(args: &[Expression], env: &Environment) -> Result<Expression, Error> {
    match args {
        [Expression::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            env.define(name.clone(), value);
            Ok(Expression::List(Vec::new()))
        }
        [_, _] => Err(Error::TypeError("define requires a symbol".to_owned())),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

/// `(set! name value)`
fn eval_set(args: &[Expression], env: &Environment) -> Result<Expression, Error> {
    match args {
        [Expression::Symbol(name), expr] => {
            let value = eval(expr, env)?;
            env.set(name, value)?;
            Ok(Expression::List(Vec::new()))
        }
        [_, _] => Err(Error::TypeError("set! requires a symbol".to_owned())),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

/// `(lambda (param ...) body)`
fn eval_lambda(args: &[Expression], env: &Environment) -> Result<Expression, Error> {
    match args {
        [Expression::List(param_list), body] => {
            let mut params = Vec::with_capacity(param_list.len());
            for param in param_list {
                match param {
                    Expression::Symbol(name) => {
                        if params.contains(name) {
                            return Err(Error::syntax(
                                ParseErrorKind::InvalidSyntax,
                                format!("duplicate parameter name: {name}"),
                            ));
                        }
                        params.push(name.clone());
                    }
                    other => {
                        return Err(Error::TypeError(format!(
                            "lambda parameters must be symbols, got {}",
                            other.type_name()
                        )));
                    }
                }
            }

            // Only fixed-arity parameter lists; no rest parameters
            Ok(Expression::Procedure(Procedure::Closure(Rc::new(Closure {
                params,
                body: body.clone(),
                env: env.clone(),
            }))))
        }
        [_, _] => Err(Error::TypeError(
            "lambda parameters must be a list".to_owned(),
        )),
        _ => Err(Error::arity_error(2, args.len())),
    }
}

/// `(begin form ...)`
fn eval_begin(args: &[Expression], env: &Environment) -> Result<Expression, Error> {
    let Some((last, init)) = args.split_last() else {
        return Err(Error::arity_error(1, 0));
    };
    for form in init {
        eval(form, env)?;
    }
    eval(last, env)
}
