//! Substep - substitution-model stepper for a small chaptered teaching language
//!
//! This crate turns a program written in a restricted, purely functional subset of
//! JavaScript into the ordered list of intermediate programs a learner would write down
//! if every reduction were carried out by hand:
//!
//! ```text
//! (1 + 2) * (3 + 4);
//! 3 * (3 + 4);
//! 3 * 7;
//! 21;
//! ```
//!
//! Each step records *where* in the tree the rewrite happened, so a caller can highlight
//! the redex before the step and the contracted result after it.
//!
//! ## Strict Semantics
//!
//! The stepper implements call-by-value, left-to-right reduction with stricter typing
//! than JavaScript:
//! - Conditionals and logical operators require actual booleans (no "truthiness")
//! - `+` accepts two numbers or two strings, never a mix
//! - Calls check arity exactly
//! - Mutable bindings (`let`) are rejected
//!
//! ## Modules
//!
//! - `ast`: arena-based syntax tree shared by every other component
//! - `path`: field-access paths into the tree
//! - `classify`: value and redex classification
//! - `substitute`: capture-avoiding substitution
//! - `apply`: beta reduction of function calls
//! - `reducer`: the one-step rewrite relation
//! - `pathify`: redex markers for display
//! - `treeify`: conversion back into printable, re-parseable source
//! - `stepper`: the step driver producing the trace
//! - `builtinops` / `host`: predeclared builtins and host values
//! - `context`: chapters, environments and the error sink
//! - `source`: text front end (feature `source`)
//! - `estree`: ESTree JSON import and export (feature `estree`)

use std::fmt;

/// Maximum parsing depth to prevent stack overflow attacks
/// This limits deeply nested structures in both the source and ESTree front ends
pub const MAX_PARSE_DEPTH: usize = 128;

/// Default ceiling on the number of trace entries produced by the step driver
pub const DEFAULT_MAX_STEPS: usize = 1000;

/// Nesting depth up to which anonymous function values are expanded when printing.
/// Deeper bodies are elided as `...`.
pub const MAX_FUNCTION_UNFOLD_DEPTH: usize = 5;

/// Error types for the stepper
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    ParseError(String),
    EvalError(String),
    TypeError(String),
    UnboundName(String),
    DisallowedDeclaration(String),
    ArityError {
        expected: usize,
        got: usize,
        callee: Option<String>, // Optional name of the function being called
    },
}

impl Error {
    /// Create an ArityError without callee context
    pub fn arity_error(expected: usize, got: usize) -> Self {
        Error::ArityError {
            expected,
            got,
            callee: None,
        }
    }

    /// Create an ArityError naming the called function
    pub fn arity_error_for(expected: usize, got: usize, callee: impl Into<String>) -> Self {
        Error::ArityError {
            expected,
            got,
            callee: Some(callee.into()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::ParseError(msg) => write!(f, "ParseError: {msg}"),
            Error::EvalError(msg) => write!(f, "EvaluationError: {msg}"),
            Error::TypeError(msg) => write!(f, "Type error: {msg}"),
            Error::UnboundName(name) => write!(f, "Name {name} not declared."),
            Error::DisallowedDeclaration(msg) => write!(f, "Disallowed declaration: {msg}"),
            Error::ArityError {
                expected,
                got,
                callee,
            } => match callee {
                Some(name) => write!(
                    f,
                    "ArityError: {name} expects {expected} argument(s), but got {got}."
                ),
                None => write!(
                    f,
                    "ArityError: function expected {expected} arguments but got {got}"
                ),
            },
        }
    }
}

impl std::error::Error for Error {}

pub mod apply;
pub mod ast;
pub mod builtinops;
pub mod classify;
pub mod context;
pub mod host;
pub mod path;
pub mod pathify;
pub mod reducer;
pub mod stepper;
pub mod substitute;
pub mod treeify;

#[cfg(feature = "estree")]
pub mod estree;

#[cfg(feature = "source")]
pub mod source;

pub use context::{Chapter, Context, Environment};
pub use stepper::{Step, StepKind, StepperConfig, get_evaluation_steps};
