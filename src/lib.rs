//! lispflat - a small tree-walking Lisp interpreter
//!
//! This crate evaluates a minimal Scheme dialect: double-precision numbers,
//! booleans, symbols, lists and procedures. Source text is tokenized, read into
//! an [`ast::Expression`] tree and evaluated against a chain of lexically scoped
//! environment frames.
//!
//! ```scheme
//! (define twice (lambda (x) (* 2 x)))
//! (twice 5)                          ; 10
//! (car (cdr (list 1 2 3)))           ; 2
//! (begin (define x 1) (set! x (+ x 1)) x)
//! ```
//!
//! ## Strictness
//!
//! The evaluator is stricter than classic Lisp interpreters:
//! - `if` and `not` require actual booleans (no "truthiness")
//! - Primitives reject arguments of the wrong type instead of coercing
//! - Closures and primitives check their argument count exactly
//!
//! ## Modules
//!
//! - `ast`: the [`ast::Expression`] value type and its printed form
//! - `scheme`: tokenizer and reader
//! - `evaluator`: environments, special forms and procedure application
//! - `builtinops`: special-form keywords and the primitive library
//! - `repl`: multi-line input collection for interactive use
//! - `suite`: the literal regression table exercised by `--self-test`

use std::fmt;

/// Maximum list nesting accepted by the reader.
/// Deeper input is reported as a syntax error instead of exhausting the stack.
pub const MAX_PARSE_DEPTH: usize = 128;

/// Maximum number of nested procedure applications per thread.
/// There is no tail-call elimination, so every nested call consumes host stack;
/// past this limit evaluation fails with an [`Error::EvalError`].
/// Calls made from primitives such as `map` and `apply` count as well.
pub const MAX_EVAL_DEPTH: usize = 10_000;

/// Stack size for threads that evaluate untrusted programs.
/// Large enough for [`MAX_EVAL_DEPTH`] nested calls in an unoptimized build;
/// the default main-thread stack is not.
pub const EVAL_STACK_SIZE: usize = 512 * 1024 * 1024;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (an unmatched closing parenthesis)
    InvalidSyntax,
    /// Input ended before the expression was complete
    Incomplete,
    /// No source text was supplied at all
    NoInput,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
}

/// A structured error providing detailed information about a parsing failure.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError whose context is the tokens surrounding the failure.
    ///
    /// `consumed` are the tokens read so far; only the last 100 characters are kept.
    pub fn with_token_context<'a>(
        kind: ParseErrorKind,
        message: impl Into<String>,
        consumed: impl IntoIterator<Item = &'a str>,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        let joined = consumed.into_iter().collect::<Vec<_>>().join(" ");
        let skip = joined.chars().count().saturating_sub(MAX_CONTEXT);

        let mut display_context = String::new();
        if skip > 0 {
            display_context.push_str("[...]");
        }
        display_context.extend(joined.chars().skip(skip));

        Self::new(kind, message, Some(display_context), found)
    }
}

/// Error types for the interpreter
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Malformed or absent source text
    SyntaxError(ParseError),
    /// A symbol that is not bound anywhere in the environment chain
    UnboundSymbol(String),
    /// Wrong number of sub-forms for a special form, or of arguments for a procedure
    ArityError {
        expected: usize,
        got: usize,
        expression: Option<String>, // Optional expression context
    },
    /// A value of the wrong variant reached a primitive or special form
    TypeError(String),
    /// Any other runtime failure (empty-list access, depth limit)
    EvalError(String),
}

impl Error {
    /// Create an ArityError without expression context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: None,
        }
    }

    /// Create an ArityError with expression context
    pub fn arity_error_with_expr(expected: usize, got: usize, expression: String) -> Self {
        Error::ArityError {
            expected,
            got,
            expression: Some(expression),
        }
    }

    /// Shorthand for a syntax error without context
    pub(crate) fn syntax(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Error::SyntaxError(ParseError::from_message(kind, message))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::SyntaxError(e) => {
                write!(f, "SyntaxError: {}", e.message)?;
                if let Some(found) = &e.found {
                    write!(f, "\nFound: {found}")?;
                }
                if let Some(context) = &e.context {
                    write!(f, "\nContext: {context}")?;
                }
                Ok(())
            }
            Error::UnboundSymbol(name) => write!(f, "Unbound symbol: {name}"),
            Error::ArityError {
                expected,
                got,
                expression,
            } => match expression {
                Some(expr) => write!(
                    f,
                    "ArityError: expression {expr}: expected {expected} arguments, got {got}"
                ),
                None => write!(
                    f,
                    "ArityError: procedure expected {expected} arguments but got {got}"
                ),
            },
            Error::TypeError(msg) => write!(f, "TypeError: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod repl;
pub mod scheme;
pub mod suite;
