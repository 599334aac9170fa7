//! Host-side values exchanged with builtin operations.
//!
//! Builtins never see syntax nodes directly: call arguments that are values are
//! converted to [`HostValue`]s, the builtin runs as an ordinary Rust function, and its
//! result is converted back into a node. Function values cross the boundary as opaque
//! node handles so that `pair(f, 1)` keeps `f` intact.

use crate::Error;
use crate::ast::{Ast, Literal, Node, NodeId};

#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Number(f64),
    Boolean(bool),
    String(String),
    Null,
    Undefined,
    Array(Vec<HostValue>),
    /// Opaque handle to a function value (or builtin identifier) node
    Function(NodeId),
}

impl HostValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Number(_) => "number",
            HostValue::Boolean(_) => "boolean",
            HostValue::String(_) => "string",
            HostValue::Null => "null",
            HostValue::Undefined => "undefined",
            HostValue::Array(_) => "array",
            HostValue::Function(_) => "function",
        }
    }

    /// Convert a value node into a host value
    pub fn from_node(ast: &Ast, id: NodeId) -> Result<HostValue, Error> {
        if let Some(n) = ast.number_value(id) {
            return Ok(HostValue::Number(n));
        }
        match ast.get(id) {
            Node::Literal(literal) => Ok(literal.clone().into()),
            Node::Array { elements } => elements
                .iter()
                .map(|e| HostValue::from_node(ast, *e))
                .collect::<Result<Vec<_>, _>>()
                .map(HostValue::Array),
            Node::Function { .. } | Node::Arrow { .. } | Node::Identifier(_) => {
                Ok(HostValue::Function(id))
            }
            other => Err(Error::EvalError(format!(
                "cannot pass unevaluated {other:?} to a builtin"
            ))),
        }
    }

    /// Convert a host value back into a node
    pub fn into_node(self, ast: &mut Ast) -> NodeId {
        match self {
            HostValue::Number(n) => ast.number(n),
            HostValue::Boolean(b) => ast.boolean(b),
            HostValue::String(s) => ast.string(s),
            HostValue::Null => ast.literal(Literal::Null),
            HostValue::Undefined => ast.undefined(),
            HostValue::Array(items) => {
                let elements = items.into_iter().map(|v| v.into_node(ast)).collect();
                ast.add(Node::Array { elements })
            }
            HostValue::Function(id) => id,
        }
    }
}

impl std::fmt::Display for HostValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostValue::Number(n) => write!(f, "{}", format_number(*n)),
            HostValue::Boolean(b) => write!(f, "{b}"),
            HostValue::String(s) => write!(f, "\"{}\"", escape_string(s)),
            HostValue::Null => write!(f, "null"),
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            HostValue::Function(_) => write!(f, "<function>"),
        }
    }
}

/// Render a number the way the taught language prints it
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".into()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else {
        format!("{n}")
    }
}

pub(crate) fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

impl From<Literal> for HostValue {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Number(n) => HostValue::Number(n),
            Literal::Boolean(b) => HostValue::Boolean(b),
            Literal::String(s) => HostValue::String(s),
            Literal::Null => HostValue::Null,
            Literal::Undefined => HostValue::Undefined,
        }
    }
}

impl From<f64> for HostValue {
    fn from(n: f64) -> Self {
        HostValue::Number(n)
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Boolean(b)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::String(s.to_owned())
    }
}

impl From<String> for HostValue {
    fn from(s: String) -> Self {
        HostValue::String(s)
    }
}

impl<T: Into<HostValue>> From<Vec<T>> for HostValue {
    fn from(v: Vec<T>) -> Self {
        HostValue::Array(v.into_iter().map(Into::into).collect())
    }
}

// Fallible conversions from `HostValue` back into primitive Rust types.

impl std::convert::TryInto<f64> for HostValue {
    type Error = Error;

    fn try_into(self) -> Result<f64, Error> {
        if let HostValue::Number(n) = self {
            Ok(n)
        } else {
            Err(Error::TypeError(format!(
                "expected number, got {}",
                self.type_name()
            )))
        }
    }
}

impl std::convert::TryInto<bool> for HostValue {
    type Error = Error;

    fn try_into(self) -> Result<bool, Error> {
        if let HostValue::Boolean(b) = self {
            Ok(b)
        } else {
            Err(Error::TypeError(format!(
                "expected boolean, got {}",
                self.type_name()
            )))
        }
    }
}
