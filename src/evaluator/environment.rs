use crate::Error;
use crate::ast::{Expression, Procedure};
use crate::builtinops::Arity;
use crate::evaluator::intooperation::{IntoOperation, IntoVariadicOperation, PrimitiveFn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A single scope: local bindings plus the enclosing frame.
#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Expression>,
    parent: Option<Environment>,
}

/// Handle to a chain of binding frames.
///
/// Cloning an `Environment` clones the handle, not the frame: every closure
/// created while a frame is innermost shares it, and a `define` or `set!`
/// through any handle is visible through all of them.
#[derive(Clone, Default)]
pub struct Environment(Rc<RefCell<Frame>>);

impl PartialEq for Environment {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let frame = self.0.borrow();
        let mut names: Vec<&String> = frame.bindings.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("bindings", &names)
            .field("has_parent", &frame.parent.is_some())
            .finish()
    }
}

impl Environment {
    /// Create an empty root frame
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty frame enclosed by `parent`
    pub fn with_parent(parent: &Environment) -> Self {
        Environment(Rc::new(RefCell::new(Frame {
            bindings: HashMap::new(),
            parent: Some(parent.clone()),
        })))
    }

    /// Create the frame for a procedure call, binding each parameter to the
    /// argument in the same position.
    ///
    /// Parameter and argument counts must match exactly.
    pub fn bind_frame(
        params: &[String],
        args: Vec<Expression>,
        parent: &Environment,
    ) -> Result<Self, Error> {
        if params.len() != args.len() {
            return Err(Error::arity_error(params.len(), args.len()));
        }

        let bindings = params.iter().cloned().zip(args).collect();
        log::debug!("new frame binding {params:?}");
        Ok(Environment(Rc::new(RefCell::new(Frame {
            bindings,
            parent: Some(parent.clone()),
        }))))
    }

    /// Find the innermost frame (this one or an ancestor) that binds `name`
    pub fn find(&self, name: &str) -> Result<Environment, Error> {
        let mut current = self.clone();
        loop {
            let parent = {
                let frame = current.0.borrow();
                if frame.bindings.contains_key(name) {
                    break;
                }
                frame.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => return Err(Error::UnboundSymbol(name.to_owned())),
            }
        }
        Ok(current)
    }

    /// Look up the value bound to `name` anywhere in the chain
    pub fn get(&self, name: &str) -> Result<Expression, Error> {
        let frame = self.find(name)?;
        let value = frame.0.borrow().bindings.get(name).cloned();
        value.ok_or_else(|| Error::UnboundSymbol(name.to_owned()))
    }

    /// Bind `name` in this frame, shadowing any outer binding
    pub fn define(&self, name: impl Into<String>, value: Expression) {
        let name = name.into();
        log::trace!("define {name} = {value}");
        self.0.borrow_mut().bindings.insert(name, value);
    }

    /// Overwrite an existing binding in the frame where it lives
    pub fn set(&self, name: &str, value: Expression) -> Result<(), Error> {
        let frame = self.find(name)?;
        log::trace!("set! {name} = {value}");
        frame.0.borrow_mut().bindings.insert(name.to_owned(), value);
        Ok(())
    }

    /// Register a custom primitive working directly on the argument slice.
    ///
    /// This is the low-level API. For most new code, prefer
    /// [`Environment::register_builtin_operation`], which converts
    /// arguments to Rust types and checks arity automatically.
    ///
    /// # Example
    /// ```
    /// use lispflat::evaluator::{create_global_env, eval};
    /// use lispflat::scheme::parse_scheme;
    /// use lispflat::ast::Expression;
    /// use lispflat::Error;
    ///
    /// fn count_args(args: &[Expression]) -> Result<Expression, Error> {
    ///     Ok(Expression::Number(args.len() as f64))
    /// }
    ///
    /// let env = create_global_env();
    /// env.register_builtin_function("count-args", count_args);
    /// let result = eval(&parse_scheme("(count-args 1 2 3)")?, &env)?;
    /// assert_eq!(result, Expression::Number(3.0));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn register_builtin_function(
        &self,
        name: &str,
        func: fn(&[Expression]) -> Result<Expression, Error>,
    ) {
        let wrapped: Rc<PrimitiveFn> =
            Rc::new(move |args: Vec<Expression>, _env: &Environment| func(&args));
        self.define_primitive(name, wrapped);
    }

    /// Register a strongly-typed Rust function as a primitive.
    ///
    /// ```rust,ignore
    /// fn hypot(a: f64, b: f64) -> f64 { (a * a + b * b).sqrt() }
    /// env.register_builtin_operation::<_, (f64, f64)>("hypot", hypot);
    /// ```
    ///
    /// Supported parameter types: `f64`, `bool`, `Procedure`, `Expression`
    /// and `ValueIter<'_>` / `NumIter<'_>` for list arguments. Return types
    /// may be anything `Into<Expression>` or `Result<R, Error>` of one.
    ///
    /// Arity is enforced exactly; conversion failures yield `TypeError`.
    pub fn register_builtin_operation<F, Args>(&self, name: &str, func: F)
    where
        F: IntoOperation<Args> + 'static,
    {
        self.define_primitive(name, func.into_operation());
    }

    /// Register a primitive whose last parameter collects the remaining
    /// arguments (`ValuesRest` or `NumRest`), validating the total
    /// argument count against `arity` first.
    pub fn register_variadic_builtin_operation<F, Args>(
        &self,
        name: &str,
        arity: Arity,
        func: F,
    ) where
        F: IntoVariadicOperation<Args> + 'static,
    {
        let inner = func.into_variadic_operation();
        let wrapped: Rc<PrimitiveFn> = Rc::new(move |args: Vec<Expression>, env: &Environment| {
            arity.validate(args.len())?;
            inner(args, env)
        });
        self.define_primitive(name, wrapped);
    }

    pub(crate) fn define_primitive(&self, name: &str, func: Rc<PrimitiveFn>) {
        self.define(
            name,
            Expression::Procedure(Procedure::Primitive {
                id: name.to_owned(),
                func,
            }),
        );
    }

    /// Get all bindings visible from this frame, inner bindings shadowing
    /// outer ones. Returns (name, value) pairs sorted by name.
    pub fn get_all_bindings(&self) -> Vec<(String, Expression)> {
        let mut bindings = HashMap::new();

        // Start with parent bindings so they can be overridden by local ones
        let frame = self.0.borrow();
        if let Some(parent) = &frame.parent {
            bindings.extend(parent.get_all_bindings());
        }
        for (name, value) in &frame.bindings {
            bindings.insert(name.clone(), value.clone());
        }

        let mut result: Vec<_> = bindings.into_iter().collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}
