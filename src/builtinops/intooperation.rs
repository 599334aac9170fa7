use crate::Error;
use crate::host::HostValue;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

// Typed Rust functions become erased `OperationFn`s here. Only the
// registration bounds on `Environment` and the builtin table name these traits.

/// Erased builtin as called by the reducer. Takes the already-converted
/// host arguments by value.
pub type OperationFn = dyn Fn(Vec<HostValue>) -> Result<HostValue, Error> + Send + Sync;

// ---------------------------------------------------------------------
// Single arguments
// ---------------------------------------------------------------------

/// A builtin parameter converted from one `HostValue` argument.
/// `Param<'a>` may borrow from the argument slot.
pub trait FromParam {
    type Param<'a>;

    fn from_arg<'a>(value: &'a mut HostValue) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for HostValue {
    type Param<'a> = HostValue;

    fn from_arg<'a>(value: &'a mut HostValue) -> Result<Self::Param<'a>, Error> {
        Ok(std::mem::replace(value, HostValue::Undefined))
    }
}

// f64 and bool, through the TryInto impls in host.rs
impl<T> FromParam for T
where
    HostValue: std::convert::TryInto<T, Error = Error>,
{
    type Param<'a> = T;

    fn from_arg<'a>(value: &'a mut HostValue) -> Result<Self::Param<'a>, Error> {
        let owned = std::mem::replace(value, HostValue::Undefined);
        <HostValue as std::convert::TryInto<T>>::try_into(owned)
    }
}

impl FromParam for &str {
    type Param<'a> = &'a str;

    fn from_arg<'a>(value: &'a mut HostValue) -> Result<Self::Param<'a>, Error> {
        let found = value.type_name();
        if let HostValue::String(s) = value {
            Ok(s.as_str())
        } else {
            Err(Error::TypeError(format!("expected string, got {found}")))
        }
    }
}

// A host array argument, e.g. the pair passed to head/tail
impl<'b, K> FromParam for TypedValueIter<'b, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_arg<'a>(value: &'a mut HostValue) -> Result<Self::Param<'a>, Error> {
        let found = value.type_name();
        if let HostValue::Array(items) = value {
            TypedValueIter::<K>::new(items.as_slice())
        } else {
            Err(Error::TypeError(format!("expected array, got {found}")))
        }
    }
}

// ---------------------------------------------------------------------
// Typed views over argument slices
// ---------------------------------------------------------------------

/// Element type of a [`TypedValueIter`]: `precheck` rejects the slice
/// before any element is projected.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[HostValue]) -> Result<(), Error>;
    fn project<'a>(v: &'a HostValue) -> Self::Item<'a>;
}

/// Slice iterator yielding `K::Item`s.
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, HostValue>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    pub(crate) fn new(values: &'a [HostValue]) -> Result<Self, Error> {
        K::precheck(values)?;
        Ok(TypedValueIter {
            inner: values.iter(),
            _marker: PhantomData,
        })
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

impl<'a, K> ExactSizeIterator for TypedValueIter<'a, K> where K: ValueElementKind {}
impl<'a, K> FusedIterator for TypedValueIter<'a, K> where K: ValueElementKind {}

#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a HostValue;

    fn precheck(_slice: &[HostValue]) -> Result<(), Error> {
        Ok(())
    }

    fn project<'a>(v: &'a HostValue) -> Self::Item<'a> {
        v
    }
}

#[doc(hidden)]
pub struct NumberKind;

impl ValueElementKind for NumberKind {
    type Item<'a> = f64;

    fn precheck(slice: &[HostValue]) -> Result<(), Error> {
        match slice.iter().find(|v| !matches!(v, HostValue::Number(_))) {
            Some(other) => Err(Error::TypeError(format!(
                "expected number, got {}",
                other.type_name()
            ))),
            None => Ok(()),
        }
    }

    fn project<'a>(v: &'a HostValue) -> Self::Item<'a> {
        match v {
            HostValue::Number(n) => *n,
            _ => f64::NAN,
        }
    }
}

/// Any host values.
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Numbers only, checked before the builtin runs.
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

// ---------------------------------------------------------------------
// Rest parameters and results
// ---------------------------------------------------------------------

/// Trailing parameter built from every remaining argument.
pub trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [HostValue]) -> Result<Self::Param<'a>, Error>;
}

impl<K> FromRest for TypedValueIter<'static, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest<'a>(slice: &'a [HostValue]) -> Result<Self::Param<'a>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

/// Builtins may return a plain value or a `Result`.
pub trait IntoValueResult {
    fn into_value_result(self) -> Result<HostValue, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<HostValue>,
{
    fn into_value_result(self) -> Result<HostValue, Error> {
        self.map(Into::into)
    }
}

impl<T> IntoValueResult for T
where
    T: Into<HostValue>,
{
    fn into_value_result(self) -> Result<HostValue, Error> {
        Ok(self.into())
    }
}

/// Fixed-arity builtin; `Args` is the tuple of parameter types.
pub trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Builtin whose last parameter is a `ValueIter` or `NumIter` over the
/// remaining arguments, optionally after one leading parameter.
pub trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<HostValue>| {
            let rest_param: <I as FromRest>::Param<'_> = <I as FromRest>::from_rest(&args[..])?;
            let result: R = (self)(rest_param);
            result.into_value_result()
        })
    }
}

// prefix parameters, then the rest
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
                + Send
                + Sync
                + 'static,
            R: IntoValueResult,
        {
            fn into_variadic_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<HostValue>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+, ref mut rest @ .. ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let rest_param: <I as FromRest>::Param<'_> =
                                <I as FromRest>::from_rest(&*rest)?;

                            let result: R = (self)( $( $p ),+, rest_param );
                            result.into_value_result()
                        }
                        _ => Err(Error::arity_error($prefix, len)),
                    }
                })
            }
        }
    };
}

impl_into_variadic_operation_for_prefix_and_rest!(1, v0, p0: A1);

// The argument vector is destructured into slots so each parameter can
// borrow from or take its own argument.
macro_rules! impl_into_operation_for_arity {
    ($arity:expr, $( $v:ident, $p:ident : $A:ident ),+ ) => {
        impl<F, R, $( $A ),+> IntoOperation<( $( $A, )+ )> for F
        where
            F: for<'a> Fn( $( <$A as FromParam>::Param<'a> ),+ ) -> R
                + Send
                + Sync
                + 'static,
            $( $A: FromParam, )+
            R: IntoValueResult,
        {
            fn into_operation(self) -> Arc<OperationFn> {
                Arc::new(move |mut args: Vec<HostValue>| {
                    let len = args.len();
                    match args.as_mut_slice() {
                        &mut [ $( ref mut $v ),+ ] => {
                            $(
                                let $p: <$A as FromParam>::Param<'_> =
                                    <$A as FromParam>::from_arg($v)?;
                            )+

                            let result: R = (self)( $( $p ),+ );
                            result.into_value_result()
                        }
                        _ => Err(Error::arity_error($arity, len)),
                    }
                })
            }
        }
    };
}

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);
