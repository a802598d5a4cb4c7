use crate::Error;
use crate::ast::{Expression, NumberType};
use crate::evaluator::Environment;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::rc::Rc;

// NOTE: This module is internal plumbing for the evaluator.
// It defines the adapter layer that turns strongly-typed Rust
// functions into the erased `PrimitiveFn` stored in the environment.
//
// External users should interact with `Environment` and the
// registration APIs in `evaluator/environment.rs`.

/// Canonical erased primitive function type used by the evaluator.
///
/// Primitives receive ownership of their argument vector and the
/// environment of the call site.
pub type PrimitiveFn = dyn Fn(Vec<Expression>, &Environment) -> Result<Expression, Error>;

// =====================================================================
// Internal machinery for fixed-arity argument conversion
// =====================================================================

/// Core trait used by the fixed-arity adapters to turn `Expression`
/// arguments into strongly-typed parameters.
///
/// The associated `Param<'a>` type is the parameter type as seen by
/// the primitive for a given lifetime of the local argument slots.
pub trait FromParam {
    type Param<'a>;

    /// Convert a single argument into this parameter type, either
    /// borrowing from it (list iterators) or consuming it.
    fn from_arg<'a>(value: &'a mut Expression) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Expression {
    type Param<'a> = Expression;

    fn from_arg<'a>(value: &'a mut Expression) -> Result<Self::Param<'a>, Error> {
        // Move the argument out so primitives can consume owned lists without cloning.
        Ok(std::mem::replace(value, Expression::List(Vec::new())))
    }
}

// Blanket implementation for by-value parameters obtained through the
// `TryInto` impls in `ast.rs` (`f64`, `bool`, `Procedure`).
impl<T> FromParam for T
where
    Expression: std::convert::TryInto<T, Error = Error>,
{
    type Param<'a> = T;

    fn from_arg<'a>(value: &'a mut Expression) -> Result<Self::Param<'a>, Error> {
        let owned = std::mem::replace(value, Expression::List(Vec::new()));
        <Expression as std::convert::TryInto<T>>::try_into(owned)
    }
}

impl<'b, K> FromParam for TypedValueIter<'b, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_arg<'a>(value: &'a mut Expression) -> Result<Self::Param<'a>, Error> {
        if let Expression::List(items) = value {
            TypedValueIter::<K>::new(items.as_slice())
        } else {
            Err(Error::TypeError(format!(
                "expected list, got {}",
                value.type_name()
            )))
        }
    }
}

// =====================================================================
// Generic typed iterator built on top of the standard slice iterator
// =====================================================================

/// Marker trait describing how to view an `Expression` slice as a typed
/// iterator. Implementations validate the whole slice up front and then
/// project each element.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[Expression]) -> Result<(), Error>;
    fn project<'a>(v: &'a Expression) -> Self::Item<'a>;
}

/// Iterator over a list of expressions, parameterized by a
/// [`ValueElementKind`] that determines the element type.
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, Expression>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    pub(crate) fn new(values: &'a [Expression]) -> Result<Self, Error> {
        K::precheck(values)?;
        Ok(TypedValueIter {
            inner: values.iter(),
            _marker: PhantomData,
        })
    }

    /// The not-yet-consumed elements as a slice
    pub(crate) fn as_slice(&self) -> &'a [Expression] {
        self.inner.as_slice()
    }
}

impl<'a, K> Iterator for TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    type Item = K::Item<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let v = self.inner.next()?;
        Some(K::project(v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K> ExactSizeIterator for TypedValueIter<'_, K> where K: ValueElementKind {}
impl<K> FusedIterator for TypedValueIter<'_, K> where K: ValueElementKind {}

/// Element kind that views each element as a borrowed reference.
#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Expression;

    fn precheck(_slice: &[Expression]) -> Result<(), Error> {
        Ok(())
    }

    fn project<'a>(v: &'a Expression) -> Self::Item<'a> {
        v
    }
}

#[doc(hidden)]
pub struct NumberKind;

impl ValueElementKind for NumberKind {
    type Item<'a> = NumberType;

    fn precheck(slice: &[Expression]) -> Result<(), Error> {
        match slice.iter().find(|v| !matches!(v, Expression::Number(_))) {
            Some(v) => Err(Error::TypeError(format!(
                "expected number, got {}",
                v.type_name()
            ))),
            None => Ok(()),
        }
    }

    fn project<'a>(v: &'a Expression) -> Self::Item<'a> {
        if let Expression::Number(n) = v {
            *n
        } else {
            debug_assert!(false, "NumberKind::project saw non-number after precheck");
            unreachable!("NumberKind invariant violated")
        }
    }
}

/// Borrowed iterator over the elements of a list argument.
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Borrowed iterator over a list argument whose elements must all be numbers.
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

// =====================================================================
// Rest-parameter support for variadic operations
// =====================================================================

/// Core trait used to construct rest-parameter values from a slice of
/// arguments.
pub trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [Expression]) -> Result<Self::Param<'a>, Error>;
}

impl<K> FromRest for TypedValueIter<'static, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest<'a>(slice: &'a [Expression]) -> Result<Self::Param<'a>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

/// Marker for "all arguments as expressions" rest parameters.
pub type ValuesRest = ValueIter<'static>;

/// Marker for "all arguments as numbers" rest parameters.
pub type NumRest = NumIter<'static>;

// =====================================================================
// Return-type adaptation for primitive functions
// =====================================================================

/// Normalizes primitive return types to `Result<Expression, Error>`.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<Expression, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Expression>,
{
    fn into_value_result(self) -> Result<Expression, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<Expression>,
{
    fn into_value_result(self) -> Result<Expression, Error> {
        Ok(self.into())
    }
}

/// Converts a strongly-typed Rust function into the erased
/// [`PrimitiveFn`], parameterized by its argument tuple type.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Rc<PrimitiveFn>;
}

/// Converts a function whose last parameter is a rest iterator
/// ([`ValuesRest`], [`NumRest`]) into the erased [`PrimitiveFn`].
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Rc<PrimitiveFn>;
}

// =====================================================================
// Variadic adapters using iterator-based rest parameters
// =====================================================================

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Rc<PrimitiveFn> {
        Rc::new(move |args: Vec<Expression>, _env: &Environment| {
            let rest_param: <I as FromRest>::Param<'_> = <I as FromRest>::from_rest(&args[..])?;
            (self)(rest_param).into_value_result()
        })
    }
}

/// Implements `IntoVariadicOperation` for a fixed prefix of `FromParam`
/// parameters followed by a single rest parameter.
macro_rules! impl_into_variadic_operation_for_prefix_and_rest {
    ($prefix:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, I, R, $( $A ),+> IntoVariadicOperation<( $( $A, )+ I, )> for F
        where
            I: FromRest,
            $( $A: FromParam, )+
            F: for<'a> Fn(
                    $( <$A as FromParam>::Param<'a> ),+,
                    <I as FromRest>::Param<'a>,
                ) -> R
                + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Rc<PrimitiveFn> {
                Rc::new(move |mut args: Vec<Expression>, _env: &Environment| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+, ref mut rest @ .. ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let rest_param: <I as FromRest>::Param<'_> =
                                <I as FromRest>::from_rest(&*rest)?;

                            (self)( $( $p ),+, rest_param ).into_value_result()
                        }
                        _ => Err(Error::arity_error($prefix, len)),
                    }
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, v0, p0: A1);
impl_into_variadic_operation_for_prefix_and_rest!(2, v0, p0: A1, v1, p1: A2);

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Implements `IntoOperation` for functions of a given arity.
///
/// Arity is checked up front, then the owned `Vec<Expression>` is
/// destructured into local slots so that `FromParam` can either borrow
/// from or consume each argument before the primitive is invoked.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> R + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self) -> Rc<PrimitiveFn> {
                Rc::new(move |mut args: Vec<Expression>, _env: &Environment| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+ ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            (self)( $( $p ),+ ).into_value_result()
                        }
                        _ => Err(Error::arity_error($arity, len)),
                    }
                })
            }
        }
    };
}

// 0-arg functions / closures
impl<F, R> IntoOperation<()> for F
where
    F: Fn() -> R + 'static,
    R: IntoValueResult,
{
    fn into_operation(self) -> Rc<PrimitiveFn> {
        Rc::new(move |args: Vec<Expression>, _env: &Environment| {
            if !args.is_empty() {
                return Err(Error::arity_error(0, args.len()));
            }

            (self)().into_value_result()
        })
    }
}

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);
impl_into_operation_for_arity!(3, v0, p0: A1, v1, p1: A2, v2, p2: A3);
