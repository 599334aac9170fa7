//! Chapters, environments and the per-run context.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::Error;
use crate::ast::Literal;
use crate::builtinops::intooperation::{IntoOperation, IntoVariadicOperation, OperationFn};
use crate::builtinops::{Arity, BuiltinOp, get_builtin_ops};
use crate::host::HostValue;

/// Language stage. Later chapters predeclare more builtins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Chapter {
    #[default]
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
}

impl TryFrom<u8> for Chapter {
    type Error = Error;

    fn try_from(n: u8) -> Result<Self, Error> {
        match n {
            1 => Ok(Chapter::One),
            2 => Ok(Chapter::Two),
            3 => Ok(Chapter::Three),
            4 => Ok(Chapter::Four),
            _ => Err(Error::EvalError(format!("unknown chapter {n}, expected 1-4"))),
        }
    }
}

impl std::fmt::Display for Chapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", *self as u8)
    }
}

/// A callable builtin bound in an environment
#[derive(Clone)]
struct Builtin {
    arity: Arity,
    func: Arc<OperationFn>,
}

/// Predeclared names visible to a program: constants that are substituted before
/// stepping starts, and builtins that are values in their own right.
#[derive(Clone)]
pub struct Environment {
    constants: BTreeMap<String, Literal>,
    builtins: HashMap<String, Builtin>,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builtins: Vec<_> = self.builtins.keys().collect();
        builtins.sort();
        f.debug_struct("Environment")
            .field("constants", &self.constants)
            .field("builtins", &builtins)
            .finish()
    }
}

impl Environment {
    /// An environment with no predeclared names
    pub fn empty() -> Self {
        Environment {
            constants: BTreeMap::new(),
            builtins: HashMap::new(),
        }
    }

    /// The standard environment for `chapter`
    pub fn for_chapter(chapter: Chapter) -> Self {
        let mut env = Environment::empty();
        env.define_constant("math_PI", Literal::Number(std::f64::consts::PI));
        env.define_constant("math_E", Literal::Number(std::f64::consts::E));
        env.define_constant("Infinity", Literal::Number(f64::INFINITY));
        env.define_constant("NaN", Literal::Number(f64::NAN));
        env.define_constant("undefined", Literal::Undefined);

        for op in get_builtin_ops().iter().filter(|op| op.chapter <= chapter) {
            env.insert_builtin_op(op);
        }
        env
    }

    fn insert_builtin_op(&mut self, op: &BuiltinOp) {
        self.builtins.insert(
            op.name.to_owned(),
            Builtin {
                arity: op.arity,
                func: Arc::clone(&op.func),
            },
        );
    }

    pub fn define_constant(&mut self, name: &str, value: Literal) {
        self.constants.insert(name.to_owned(), value);
    }

    pub fn constant(&self, name: &str) -> Option<&Literal> {
        self.constants.get(name)
    }

    /// Predeclared constants in name order
    pub fn constants(&self) -> impl Iterator<Item = (&str, &Literal)> {
        self.constants.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    /// Whether `name` is predeclared at all
    pub fn is_bound(&self, name: &str) -> bool {
        self.is_builtin(name) || self.constants.contains_key(name)
    }

    /// Validate the argument count, then run the builtin bound to `name`
    pub fn call_builtin(&self, name: &str, args: Vec<HostValue>) -> Result<HostValue, Error> {
        let builtin = self
            .builtins
            .get(name)
            .ok_or_else(|| Error::UnboundName(name.to_owned()))?;
        builtin
            .arity
            .validate(args.len())
            .and_then(|()| (builtin.func)(args))
            .map_err(|e| match e {
                Error::ArityError { expected, got, .. } => {
                    Error::arity_error_for(expected, got, name)
                }
                other => other,
            })
    }

    /// Register a fixed-arity builtin from a strongly-typed Rust function.
    ///
    /// ```rust
    /// let mut env = substep::Environment::for_chapter(substep::Chapter::One);
    /// env.register_builtin_operation::<_, (f64, f64)>("hypot", |a: f64, b: f64| a.hypot(b));
    /// assert!(env.is_builtin("hypot"));
    /// ```
    ///
    /// Supported parameter types are `f64`, `bool`, `&str`, `HostValue` and the array
    /// iterators from [`crate::builtinops::intooperation`]. Return types are anything
    /// convertible into a `HostValue`, or a `Result` of one. Arity is derived from the
    /// signature.
    pub fn register_builtin_operation<F, Args>(&mut self, name: &str, func: F)
    where
        F: IntoOperation<Args>,
    {
        let func = func.into_operation();
        self.builtins.insert(
            name.to_owned(),
            Builtin {
                arity: Arity::Any, // the adapter checks the exact count itself
                func,
            },
        );
    }

    /// Register a builtin whose last parameter is a rest iterator, with explicit
    /// arity metadata since the minimum and maximum argument counts are not always
    /// derivable from the Rust signature alone.
    pub fn register_variadic_builtin_operation<F, Args>(
        &mut self,
        name: &str,
        arity: Arity,
        func: F,
    ) where
        F: IntoVariadicOperation<Args>,
    {
        self.builtins.insert(
            name.to_owned(),
            Builtin {
                arity,
                func: func.into_variadic_operation(),
            },
        );
    }

    /// All predeclared names, sorted
    pub fn get_all_bindings(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .constants
            .keys()
            .chain(self.builtins.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::for_chapter(Chapter::default())
    }
}

/// Execution context for one trace: the active chapter, its predeclared
/// bindings, and the sink runtime errors are reported to.
#[derive(Debug, Clone)]
pub struct Context {
    pub chapter: Chapter,
    pub environment: Environment,
    pub errors: Vec<Error>,
}

impl Context {
    pub fn new(chapter: Chapter) -> Self {
        Context {
            chapter,
            environment: Environment::for_chapter(chapter),
            errors: Vec::new(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(Chapter::default())
    }
}
