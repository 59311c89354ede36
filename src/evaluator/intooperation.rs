use crate::Error;
use crate::ast::{NumberType, PairRef, Value};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

// NOTE: This module is internal plumbing for the primitive registry.
// It defines the adapter layer that turns strongly-typed Rust
// functions into the erased `OperationFn` stored in `BuiltinOp`.

/// Canonical erased primitive function type.
///
/// Primitives receive ownership of their argument vector, enabling
/// implementations that consume arguments without cloning.
pub(crate) type OperationFn = dyn Fn(Vec<Value>) -> Result<Value, Error> + Send + Sync;

// =====================================================================
// Fixed-position argument conversion
// =====================================================================

/// Core trait used by the adapters to turn `Value` arguments into
/// strongly-typed parameters.
///
/// The associated `Param<'a>` type is the parameter type as seen by
/// the primitive for a given lifetime of the local `Value` slots used
/// during argument conversion.
pub(crate) trait FromParam {
    type Param<'a>;

    /// Convert a single argument into this parameter type, either
    /// borrowing from it or taking it by value.
    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error>;
}

impl FromParam for Value {
    type Param<'a> = Value;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        Ok(std::mem::replace(value, Value::Nil))
    }
}

impl FromParam for NumberType {
    type Param<'a> = NumberType;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match value {
            Value::Number(n) => Ok(*n),
            other => Err(Error::TypeError(format!("expected number, got {other}"))),
        }
    }
}

impl FromParam for &str {
    type Param<'a> = &'a str;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match value {
            Value::String(s) => Ok(&**s),
            other => Err(Error::TypeError(format!("expected string, got {other}"))),
        }
    }
}

impl FromParam for PairRef {
    type Param<'a> = PairRef;

    fn from_arg<'a>(value: &'a mut Value) -> Result<Self::Param<'a>, Error> {
        match value {
            Value::Pair(pair) => Ok(pair.clone()),
            other => Err(Error::TypeError(format!("expected pair, got {other}"))),
        }
    }
}

// =====================================================================
// Generic typed iterator over rest arguments
// =====================================================================

/// Marker trait describing how to view a `Value` slice as a typed
/// iterator. Implementations validate the whole slice up front and
/// then map each `Value` to the element type.
#[doc(hidden)]
pub trait ValueElementKind {
    type Item<'a>;

    fn precheck(slice: &[Value]) -> Result<(), Error>;
    fn project<'a>(v: &'a Value) -> Self::Item<'a>;
}

/// Iterator over rest arguments, parameterized by a
/// [`ValueElementKind`] that determines the element type and validation.
#[doc(hidden)]
pub struct TypedValueIter<'a, K: ValueElementKind> {
    inner: std::slice::Iter<'a, Value>,
    _marker: PhantomData<K>,
}

impl<'a, K> TypedValueIter<'a, K>
where
    K: ValueElementKind,
{
    pub(crate) fn new(values: &'a [Value]) -> Result<Self, Error> {
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

/// Element kind that yields each argument as a borrowed `Value`
#[doc(hidden)]
pub struct ValueKind;

impl ValueElementKind for ValueKind {
    type Item<'a> = &'a Value;

    fn precheck(_slice: &[Value]) -> Result<(), Error> {
        Ok(())
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        v
    }
}

#[doc(hidden)]
pub struct NumberKind;

impl ValueElementKind for NumberKind {
    type Item<'a> = NumberType;

    fn precheck(slice: &[Value]) -> Result<(), Error> {
        match slice.iter().find(|v| !matches!(v, Value::Number(_))) {
            Some(other) => Err(Error::TypeError(format!("expected number, got {other}"))),
            None => Ok(()),
        }
    }

    fn project<'a>(v: &'a Value) -> Self::Item<'a> {
        if let Value::Number(n) = v {
            *n
        } else {
            debug_assert!(false, "NumberKind::project saw non-number after precheck");
            NumberType::NAN
        }
    }
}

/// Borrowed iterator over rest arguments as `&Value`
pub type ValueIter<'a> = TypedValueIter<'a, ValueKind>;

/// Iterator over numeric rest arguments; every element is checked to be
/// a number before the primitive runs.
pub type NumIter<'a> = TypedValueIter<'a, NumberKind>;

/// Core trait used to construct rest-parameter values from the tail of
/// the argument vector.
pub(crate) trait FromRest {
    type Param<'a>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error>;
}

impl<K> FromRest for TypedValueIter<'static, K>
where
    K: ValueElementKind,
{
    type Param<'a> = TypedValueIter<'a, K>;

    fn from_rest<'a>(slice: &'a [Value]) -> Result<Self::Param<'a>, Error> {
        TypedValueIter::<K>::new(slice)
    }
}

// =====================================================================
// Return-type adaptation
// =====================================================================

/// Normalizes primitive return types to `Result<Value, Error>`.
pub(crate) trait IntoValueResult {
    fn into_value_result(self) -> Result<Value, Error>;
}

impl<T> IntoValueResult for Result<T, Error>
where
    T: Into<Value>,
{
    fn into_value_result(self) -> Result<Value, Error> {
        self.map(Into::into)
    }
}

macro_rules! impl_into_value_result_for_plain {
    ($($t:ty),+) => {
        $(
            impl IntoValueResult for $t {
                fn into_value_result(self) -> Result<Value, Error> {
                    Ok(self.into())
                }
            }
        )+
    };
}

impl_into_value_result_for_plain!(Value, NumberType, bool);

/// Converts a strongly-typed Rust function into the erased
/// [`OperationFn`], parameterized by its argument tuple type.
pub(crate) trait IntoOperation<Args> {
    fn into_operation(self) -> Arc<OperationFn>;
}

/// Like [`IntoOperation`] for functions whose last parameter is a rest
/// iterator (`ValueIter<'a>` or `NumIter<'a>`), optionally after a
/// fixed prefix of `FromParam` parameters.
pub(crate) trait IntoVariadicOperation<Args> {
    fn into_variadic_operation(self) -> Arc<OperationFn>;
}

// =====================================================================
// Variadic adapters
// =====================================================================

impl<F, I, R> IntoVariadicOperation<(I,)> for F
where
    I: FromRest,
    F: for<'a> Fn(<I as FromRest>::Param<'a>) -> R + Send + Sync + 'static,
    R: IntoValueResult,
{
    fn into_variadic_operation(self) -> Arc<OperationFn> {
        Arc::new(move |args: Vec<Value>| {
            let rest_param: <I as FromRest>::Param<'_> = <I as FromRest>::from_rest(&args[..])?;
            (self)(rest_param).into_value_result()
        })
    }
}

/// Implements `IntoVariadicOperation` for a fixed prefix of `FromParam`
/// parameters followed by one rest parameter.
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
                Arc::new(move |mut args: Vec<Value>| {
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

// =====================================================================
// Fixed-arity adapters
// =====================================================================

/// Implements `IntoOperation` for functions of a given arity.
///
/// Arity is checked up front, then the owned `Vec<Value>` is
/// destructured into local slots so that `FromParam` can either borrow
/// from or consume each argument before the primitive is invoked.
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
                Arc::new(move |mut args: Vec<Value>| {
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

impl_into_operation_for_arity!(1, v0, p0: A1);
impl_into_operation_for_arity!(2, v0, p0: A1, v1, p1: A2);

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{sym, val};

    fn fixed<Args, F: IntoOperation<Args>>(f: F) -> Arc<OperationFn> {
        f.into_operation()
    }

    fn variadic<Args, F: IntoVariadicOperation<Args>>(f: F) -> Arc<OperationFn> {
        f.into_variadic_operation()
    }

    #[test]
    fn test_fixed_adapters() {
        fn add(a: NumberType, b: NumberType) -> NumberType {
            a + b
        }
        fn first(pair: PairRef) -> Value {
            pair.borrow().first.clone()
        }
        fn shout(s: &str) -> Value {
            Value::string(&s.to_uppercase())
        }

        let add = fixed::<(NumberType, NumberType), _>(add);
        assert_eq!(add(vec![val(1), val(2)]).unwrap(), val(3));
        assert!(matches!(add(vec![val(1), val("x")]), Err(Error::TypeError(_))));
        assert!(add(vec![val(1)]).unwrap_err().is_too_few());
        assert!(add(vec![val(1), val(2), val(3)]).unwrap_err().is_too_many());

        let first = fixed::<(PairRef,), _>(first);
        assert_eq!(first(vec![val([7, 8])]).unwrap(), val(7));
        assert!(matches!(first(vec![Value::Nil]), Err(Error::TypeError(_))));

        let shout = fixed::<(&str,), _>(shout);
        assert_eq!(shout(vec![val("hey")]).unwrap(), val("HEY"));
        assert!(matches!(shout(vec![sym("hey")]), Err(Error::TypeError(_))));
    }

    #[test]
    fn test_variadic_adapters() {
        fn sum(nums: NumIter<'_>) -> NumberType {
            nums.sum()
        }
        fn count_after(first: Value, rest: ValueIter<'_>) -> Result<Value, Error> {
            if first.is_nil() {
                return Err(Error::TypeError("first must not be nil".into()));
            }
            Ok(val(rest.len() as u32))
        }

        let sum = variadic::<(NumIter<'static>,), _>(sum);
        assert_eq!(sum(vec![]).unwrap(), val(0));
        assert_eq!(sum(vec![val(1), val(2.5)]).unwrap(), val(3.5));
        assert!(matches!(sum(vec![val(1), sym("x")]), Err(Error::TypeError(_))));

        let count_after = variadic::<(Value, ValueIter<'static>), _>(count_after);
        assert_eq!(count_after(vec![val(1), val(2), val(3)]).unwrap(), val(2));
        assert_eq!(count_after(vec![val(1)]).unwrap(), val(0));
        assert!(count_after(vec![]).unwrap_err().is_too_few());
        assert!(count_after(vec![Value::Nil]).is_err());
    }
}
