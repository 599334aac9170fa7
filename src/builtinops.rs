//! Built-in operations registry.
//!
//! Builtins are the predeclared functions a program may call without defining them:
//!
//! ```text
//! math_abs(-3);        // 3
//! math_max(1, 5, 2);   // 5
//! head(pair(1, 2));    // 1
//! ```
//!
//! Each operation is defined once as an ordinary typed Rust function and wired into
//! the registry through the adapter layer in [`intooperation`], which converts the
//! erased `Vec<HostValue>` arguments into the function's parameter types.
//!
//! ## Chapters
//!
//! Every operation records the chapter that introduces it. An [`Environment`] for a
//! given chapter only binds the operations (and predeclared constants) available at
//! that chapter.
//!
//! ## Error Handling
//!
//! - **Type Safety**: operations reject arguments of the wrong type
//! - **Arity Checking**: argument counts are validated before the call
//!
//! ## Adding New Operations
//!
//! 1. **Implement the function** with typed parameters (`f64`, `bool`, `&str`,
//!    `HostValue`, or a trailing `NumIter`/`ValueIter` rest parameter)
//! 2. **Add to BUILTIN_OPS** with its name, chapter and arity
//! 3. **Add tests** covering edge cases and error conditions
//!
//! [`Environment`]: crate::context::Environment

pub mod intooperation;

use crate::Error;
use crate::context::Chapter;
use crate::host::HostValue;
use intooperation::{IntoOperation, IntoVariadicOperation, NumIter, OperationFn, ValueIter};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Accepted argument counts for a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    AtLeast(usize),
    Range(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::AtLeast(n) => count >= n,
            Arity::Range(lo, hi) => (lo..=hi).contains(&count),
            Arity::Any => true,
        }
    }

    /// Check if the given number of arguments is valid
    pub fn validate(&self, count: usize) -> Result<(), Error> {
        if self.accepts(count) {
            return Ok(());
        }
        let expected = match *self {
            Arity::Exact(n) | Arity::AtLeast(n) => n,
            Arity::Range(lo, hi) => {
                if count < lo {
                    lo
                } else {
                    hi
                }
            }
            Arity::Any => 0,
        };
        Err(Error::arity_error(expected, count))
    }
}

/// Definition of a built-in operation
#[derive(Clone)]
pub struct BuiltinOp {
    pub name: &'static str,
    /// First chapter in which the operation is predeclared
    pub chapter: Chapter,
    pub func: Arc<OperationFn>,
    pub arity: Arity,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinOp")
            .field("name", &self.name)
            .field("chapter", &self.chapter)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl BuiltinOp {
    /// Validate the argument count, then run the operation
    pub fn call(&self, args: Vec<HostValue>) -> Result<HostValue, Error> {
        self.arity.validate(args.len()).map_err(|e| match e {
            Error::ArityError { expected, got, .. } => {
                Error::arity_error_for(expected, got, self.name)
            }
            other => other,
        })?;
        (self.func)(args)
    }
}

//
// Builtin Function Implementations
//

macro_rules! math_unary {
    ($name:ident, $method:ident) => {
        fn $name(x: f64) -> f64 {
            x.$method()
        }
    };
}

math_unary!(builtin_abs, abs);
math_unary!(builtin_sqrt, sqrt);
math_unary!(builtin_floor, floor);
math_unary!(builtin_ceil, ceil);
math_unary!(builtin_trunc, trunc);
math_unary!(builtin_log, ln);
math_unary!(builtin_exp, exp);
math_unary!(builtin_sin, sin);
math_unary!(builtin_cos, cos);

// Rounds half up like the taught language, unlike `f64::round` which rounds half away from zero
fn builtin_round(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn builtin_pow(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

fn builtin_max(args: NumIter<'_>) -> f64 {
    args.fold(f64::NEG_INFINITY, |acc, n| {
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            acc.max(n)
        }
    })
}

fn builtin_min(args: NumIter<'_>) -> f64 {
    args.fold(f64::INFINITY, |acc, n| {
        if acc.is_nan() || n.is_nan() {
            f64::NAN
        } else {
            acc.min(n)
        }
    })
}

fn builtin_is_number(value: HostValue) -> bool {
    matches!(value, HostValue::Number(_))
}

fn builtin_is_string(value: HostValue) -> bool {
    matches!(value, HostValue::String(_))
}

fn builtin_is_boolean(value: HostValue) -> bool {
    matches!(value, HostValue::Boolean(_))
}

fn builtin_is_function(value: HostValue) -> bool {
    matches!(value, HostValue::Function(_))
}

fn builtin_is_undefined(value: HostValue) -> bool {
    matches!(value, HostValue::Undefined)
}

fn builtin_stringify(value: HostValue) -> String {
    value.to_string()
}

fn builtin_display(value: HostValue) -> HostValue {
    tracing::info!(target: "substep::display", "{value}");
    value
}

fn builtin_error(args: ValueIter<'_>) -> Result<HostValue, Error> {
    let parts: Vec<String> = args
        .map(|value| match value {
            HostValue::String(s) => s.clone(),
            _ => value.to_string(),
        })
        .collect();

    let message = if parts.is_empty() {
        "Error".to_string()
    } else {
        parts.join(" ")
    };

    Err(Error::EvalError(message))
}

fn builtin_parse_int(text: &str, radix: f64) -> Result<f64, Error> {
    if radix.fract() != 0.0 || !(2.0..=36.0).contains(&radix) {
        return Err(Error::EvalError(format!(
            "parse_int expects a radix between 2 and 36, got {radix}"
        )));
    }
    Ok(i64::from_str_radix(text.trim(), radix as u32)
        .map(|n| n as f64)
        .unwrap_or(f64::NAN))
}

fn builtin_pair(head: HostValue, tail: HostValue) -> HostValue {
    HostValue::Array(vec![head, tail])
}

fn builtin_head(mut pair: ValueIter<'_>) -> Result<HostValue, Error> {
    match (pair.len(), pair.next()) {
        (2, Some(head)) => Ok(head.clone()),
        _ => Err(Error::EvalError("head(xs) expects a pair as argument xs".into())),
    }
}

fn builtin_tail(mut pair: ValueIter<'_>) -> Result<HostValue, Error> {
    match (pair.len(), pair.nth(1)) {
        (2, Some(tail)) => Ok(tail.clone()),
        _ => Err(Error::EvalError("tail(xs) expects a pair as argument xs".into())),
    }
}

fn builtin_is_pair(value: HostValue) -> bool {
    matches!(&value, HostValue::Array(items) if items.len() == 2)
}

fn builtin_is_null(value: HostValue) -> bool {
    matches!(value, HostValue::Null)
}

fn builtin_list(args: ValueIter<'_>) -> HostValue {
    let items: Vec<HostValue> = args.cloned().collect();
    items
        .into_iter()
        .rev()
        .fold(HostValue::Null, |tail, head| HostValue::Array(vec![head, tail]))
}

/// Global registry of all built-in operations.
///
/// The registry is a single contiguous collection of `BuiltinOp` values
/// for ease of auditing; each implementation is wired through the same
/// adapter layer used for custom builtin registration.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn fixed<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoOperation<Args>,
    {
        <F as IntoOperation<Args>>::into_operation(f)
    }

    fn variadic<Args, F>(f: F) -> Arc<OperationFn>
    where
        F: IntoVariadicOperation<Args>,
    {
        <F as IntoVariadicOperation<Args>>::into_variadic_operation(f)
    }

    fn op(name: &'static str, chapter: Chapter, arity: Arity, func: Arc<OperationFn>) -> BuiltinOp {
        BuiltinOp {
            name,
            chapter,
            func,
            arity,
        }
    }

    use Chapter::{One, Two};

    vec![
        // Math
        op("math_abs", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_abs)),
        op("math_sqrt", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_sqrt)),
        op("math_floor", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_floor)),
        op("math_ceil", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_ceil)),
        op("math_round", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_round)),
        op("math_trunc", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_trunc)),
        op("math_log", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_log)),
        op("math_exp", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_exp)),
        op("math_sin", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_sin)),
        op("math_cos", One, Arity::Exact(1), fixed::<(f64,), _>(builtin_cos)),
        op("math_pow", One, Arity::Exact(2), fixed::<(f64, f64), _>(builtin_pow)),
        op("math_max", One, Arity::Any, variadic::<(NumIter<'static>,), _>(builtin_max)),
        op("math_min", One, Arity::Any, variadic::<(NumIter<'static>,), _>(builtin_min)),
        // Predicates
        op("is_number", One, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_is_number)),
        op("is_string", One, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_is_string)),
        op("is_boolean", One, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_is_boolean)),
        op("is_function", One, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_is_function)),
        op("is_undefined", One, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_is_undefined)),
        // Utilities
        op("stringify", One, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_stringify)),
        op("display", One, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_display)),
        op("error", One, Arity::Any, variadic::<(ValueIter<'static>,), _>(builtin_error)),
        op("parse_int", One, Arity::Exact(2), fixed::<(&str, f64), _>(builtin_parse_int)),
        // Pairs and lists
        op("pair", Two, Arity::Exact(2), fixed::<(HostValue, HostValue), _>(builtin_pair)),
        op("head", Two, Arity::Exact(1), fixed::<(ValueIter<'static>,), _>(builtin_head)),
        op("tail", Two, Arity::Exact(1), fixed::<(ValueIter<'static>,), _>(builtin_tail)),
        op("is_pair", Two, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_is_pair)),
        op("is_null", Two, Arity::Exact(1), fixed::<(HostValue,), _>(builtin_is_null)),
        op("list", Two, Arity::Any, variadic::<(ValueIter<'static>,), _>(builtin_list)),
    ]
});

/// Lazy static map from name to BuiltinOp (private - use find_builtin_op)
static BUILTIN_BY_NAME: LazyLock<HashMap<&'static str, &'static BuiltinOp>> =
    LazyLock::new(|| {
        let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
        ops.iter().map(|op| (op.name, op)).collect()
    });

/// All builtin operations, in registry order
pub fn get_builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by name
pub fn find_builtin_op(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_BY_NAME.get(name).copied()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::Error;

    fn num(n: f64) -> HostValue {
        HostValue::Number(n)
    }

    fn call_builtin(name: &str, args: Vec<HostValue>) -> Result<HostValue, Error> {
        find_builtin_op(name).unwrap().call(args)
    }

    #[test]
    fn test_builtin_ops_registry() {
        let abs = find_builtin_op("math_abs").unwrap();
        assert_eq!(abs.arity, Arity::Exact(1));
        assert_eq!(abs.chapter, Chapter::One);

        let pair = find_builtin_op("pair").unwrap();
        assert_eq!(pair.chapter, Chapter::Two);

        assert!(find_builtin_op("unknown").is_none());
        assert_eq!(get_builtin_ops().len(), BUILTIN_BY_NAME.len()); // names are unique
    }

    /// Expected outcome of a builtin call
    #[derive(Debug)]
    enum Expect {
        Value(HostValue),
        Nan,
        SpecificError(&'static str),
        Error,
    }
    use Expect::*;

    #[test]
    fn test_builtin_function_implementations() {
        let list_of_two = HostValue::Array(vec![
            num(1.0),
            HostValue::Array(vec![num(2.0), HostValue::Null]),
        ]);

        let test_cases: Vec<(&str, Vec<HostValue>, Expect)> = vec![
            // Math
            ("math_abs", vec![num(-3.0)], Value(num(3.0))),
            ("math_sqrt", vec![num(16.0)], Value(num(4.0))),
            ("math_sqrt", vec![num(-1.0)], Nan),
            ("math_floor", vec![num(2.7)], Value(num(2.0))),
            ("math_ceil", vec![num(2.1)], Value(num(3.0))),
            ("math_round", vec![num(2.5)], Value(num(3.0))),
            ("math_round", vec![num(-2.5)], Value(num(-2.0))),
            ("math_trunc", vec![num(-2.7)], Value(num(-2.0))),
            ("math_pow", vec![num(2.0), num(10.0)], Value(num(1024.0))),
            ("math_max", vec![num(1.0), num(5.0), num(2.0)], Value(num(5.0))),
            ("math_max", vec![], Value(num(f64::NEG_INFINITY))),
            ("math_min", vec![num(1.0), num(-5.0)], Value(num(-5.0))),
            ("math_max", vec![num(1.0), num(f64::NAN)], Nan),
            ("math_abs", vec!["x".into()], SpecificError("expected number")),
            ("math_abs", vec![], SpecificError("math_abs expects 1")),
            ("math_max", vec![num(1.0), true.into()], Error),
            // Predicates
            ("is_number", vec![num(1.0)], Value(true.into())),
            ("is_number", vec!["1".into()], Value(false.into())),
            ("is_string", vec!["1".into()], Value(true.into())),
            ("is_boolean", vec![false.into()], Value(true.into())),
            ("is_undefined", vec![HostValue::Undefined], Value(true.into())),
            ("is_undefined", vec![HostValue::Null], Value(false.into())),
            // Utilities
            ("stringify", vec![num(21.0)], Value("21".into())),
            ("stringify", vec![list_of_two.clone()], Value("[1, [2, null]]".into())),
            ("display", vec!["hi".into()], Value("hi".into())),
            ("error", vec!["bad".into(), num(1.0)], SpecificError("bad 1")),
            ("parse_int", vec!["ff".into(), num(16.0)], Value(num(255.0))),
            ("parse_int", vec!["zz".into(), num(10.0)], Nan),
            ("parse_int", vec!["1".into(), num(1.0)], SpecificError("radix")),
            // Pairs and lists
            ("pair", vec![num(1.0), num(2.0)], Value(HostValue::Array(vec![num(1.0), num(2.0)]))),
            ("head", vec![HostValue::Array(vec![num(1.0), num(2.0)])], Value(num(1.0))),
            ("tail", vec![HostValue::Array(vec![num(1.0), num(2.0)])], Value(num(2.0))),
            ("head", vec![HostValue::Array(vec![])], SpecificError("expects a pair")),
            ("head", vec![num(1.0)], SpecificError("expected array")),
            ("is_pair", vec![list_of_two.clone()], Value(true.into())),
            ("is_null", vec![HostValue::Null], Value(true.into())),
            ("list", vec![num(1.0), num(2.0)], Value(list_of_two)),
            ("list", vec![], Value(HostValue::Null)),
        ];

        for (i, (name, args, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("#{} {name}", i + 1);
            let result = call_builtin(name, args);
            match (result, expected) {
                (Ok(actual), Value(value)) => assert_eq!(actual, value, "{test_id}"),
                (Ok(HostValue::Number(n)), Nan) => assert!(n.is_nan(), "{test_id}"),
                (Err(err), SpecificError(text)) => {
                    let msg = err.to_string();
                    assert!(msg.contains(text), "{test_id}: '{msg}' should contain '{text}'");
                }
                (Err(_), Error) => {}
                (actual, expected) => {
                    panic!("{test_id}: expected {expected:?}, got {actual:?}")
                }
            }
        }
    }

    #[test]
    fn test_arity_validation() {
        let test_cases = vec![
            (Arity::Exact(2), 2, true),
            (Arity::Exact(2), 3, false),
            (Arity::AtLeast(1), 0, false),
            (Arity::AtLeast(1), 5, true),
            (Arity::Range(1, 2), 0, false),
            (Arity::Range(1, 2), 2, true),
            (Arity::Range(1, 2), 3, false),
            (Arity::Any, 0, true),
        ];

        for (i, (arity, count, ok)) in test_cases.into_iter().enumerate() {
            assert_eq!(arity.validate(count).is_ok(), ok, "#{}", i + 1);
        }

        assert_eq!(
            Arity::Range(1, 2).validate(3),
            Err(Error::arity_error(2, 3))
        );
    }
}
