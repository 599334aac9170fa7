//! The one-step rewrite relation.
//!
//! [`reduce`] performs exactly one reduction on a tree: call-by-value, left to right,
//! innermost first. It reports where the redex was in the tree before the step and
//! where its replacement (or every substitution site) is in the tree after it.
//!
//! ## Expressions
//!
//! Operands are reduced to values left to right, then the operator is evaluated with
//! strict typing: `+` takes two numbers or two strings, arithmetic takes numbers,
//! comparisons take two numbers or two strings, and conditions must be booleans.
//! `a && b` and `a || b` reduce in a single step once `a` is a boolean.
//!
//! ## Statement lists
//!
//! Programs, blocks and block expressions advance one leading statement at a time:
//! - a leading `return` collapses a block expression to the returned expression;
//! - a leading value statement is dropped, unless a declaration follows it, in which
//!   case it is kept while the declaration is eliminated;
//! - a `const` or function declaration whose value is ready is eliminated in one
//!   step, its value substituted into every following statement of the block;
//! - an `if` whose test is a boolean is replaced by the chosen branch, spliced into
//!   the surrounding list when the branch declares nothing.

use crate::Error;
use crate::apply::apply;
use crate::ast::{
    Ast, BinaryOperator, DeclarationKind, Literal, LogicalOperator, Node, NodeId, UnaryOperator,
};
use crate::classify::{has_redex, is_value, is_value_statement};
use crate::context::Environment;
use crate::host::HostValue;
use crate::path::{Path, PathToken, prefixed, shift_statements, with_child};
use crate::substitute::substitute_statements;
use crate::treeify::to_source;

/// Outcome of a single reduction
#[derive(Debug, Clone, PartialEq)]
pub struct Contraction {
    /// The rewritten tree
    pub node: NodeId,
    /// Location of the redex in the tree before the step
    pub redex: Vec<Path>,
    /// Location of the rewritten node, or of every substitution site, after the step
    pub contracted: Vec<Path>,
    pub explanation: String,
}

/// Why reduction stopped short of producing a contraction
enum Stop {
    Error(Error),
    /// A declaration form that cannot be stepped; the trace ends on an empty program
    Placeholder(String),
}

impl From<Error> for Stop {
    fn from(e: Error) -> Self {
        Stop::Error(e)
    }
}

type Reduced<T> = Result<T, Stop>;

/// Perform one reduction step on `tree`.
///
/// A tree without a redex is returned unchanged with empty path sets.
pub fn reduce(ast: &mut Ast, tree: NodeId, env: &Environment) -> Result<Contraction, Error> {
    if !has_redex(ast, tree, env) {
        return Ok(Contraction {
            node: tree,
            redex: Vec::new(),
            contracted: Vec::new(),
            explanation: "Evaluation complete".to_string(),
        });
    }

    let mut reducer = Reducer { ast, env };
    match reducer.reduce_node(tree) {
        Ok(contraction) => Ok(contraction),
        Err(Stop::Error(e)) => Err(e),
        Err(Stop::Placeholder(explanation)) => Ok(Contraction {
            node: reducer.ast.program(Vec::new()),
            redex: vec![Vec::new()],
            contracted: Vec::new(),
            explanation,
        }),
    }
}

/// One step on a statement list, with paths relative to the list node
struct ListStep {
    statements: Vec<NodeId>,
    redex: Vec<Path>,
    contracted: Vec<Path>,
    explanation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Program,
    Block,
    BlockExpression,
}

impl ListKind {
    fn build(self, body: Vec<NodeId>) -> Node {
        match self {
            ListKind::Program => Node::Program { body },
            ListKind::Block => Node::Block { body },
            ListKind::BlockExpression => Node::BlockExpression { body },
        }
    }
}

struct Reducer<'a> {
    ast: &'a mut Ast,
    env: &'a Environment,
}

impl Reducer<'_> {
    fn is_value(&self, id: NodeId) -> bool {
        is_value(self.ast, id, self.env)
    }

    fn source(&self, id: NodeId) -> String {
        to_source(self.ast, id)
    }

    fn reduce_node(&mut self, id: NodeId) -> Reduced<Contraction> {
        match self.ast.get(id).clone() {
            Node::Program { body } => self.reduce_statements(ListKind::Program, &body),
            Node::Block { body } => self.reduce_statements(ListKind::Block, &body),
            Node::BlockExpression { body } => {
                self.reduce_statements(ListKind::BlockExpression, &body)
            }
            node => self.reduce_expression(id, node),
        }
    }

    /// Reduce the child of `id` at `token`, rebuilding `id` around the result
    fn descend(&mut self, id: NodeId, token: PathToken, child: NodeId) -> Reduced<Contraction> {
        let inner = self.reduce_node(child)?;
        let node = with_child(self.ast, id, token, inner.node).ok_or_else(|| {
            Error::EvalError(format!("no {token} to reduce in {}", self.source(id)))
        })?;
        Ok(Contraction {
            node,
            redex: prefixed(&[token], inner.redex),
            contracted: prefixed(&[token], inner.contracted),
            explanation: inner.explanation,
        })
    }

    fn replaced(node: NodeId, explanation: String) -> Reduced<Contraction> {
        Ok(Contraction {
            node,
            redex: vec![Vec::new()],
            contracted: vec![Vec::new()],
            explanation,
        })
    }

    fn type_of(&self, id: NodeId) -> &'static str {
        if self.ast.number_value(id).is_some() {
            return "number";
        }
        match self.ast.get(id) {
            Node::Literal(literal) => literal.type_name(),
            Node::Function { .. } | Node::Arrow { .. } => "function",
            Node::Identifier(name) if self.env.is_builtin(name) => "function",
            Node::Array { .. } => "array",
            _ => "expression",
        }
    }

    fn literal_of(&self, id: NodeId) -> Option<Literal> {
        if let Some(n) = self.ast.number_value(id) {
            return Some(Literal::Number(n));
        }
        match self.ast.get(id) {
            Node::Literal(literal) => Some(literal.clone()),
            _ => None,
        }
    }

    fn operand_error(&self, expected: &str, side: &str, symbol: &str, found: NodeId) -> Error {
        Error::TypeError(format!(
            "expected {expected} on {side} hand side of operation {symbol}, got {}",
            self.type_of(found)
        ))
    }

    fn condition_error(&self, found: NodeId) -> Error {
        Error::TypeError(format!(
            "expected boolean as condition, got {}",
            self.type_of(found)
        ))
    }

    fn reduce_expression(&mut self, id: NodeId, node: Node) -> Reduced<Contraction> {
        match node {
            Node::Identifier(name) => Err(Error::UnboundName(name).into()),
            Node::Unary { operator, argument } => {
                if !self.is_value(argument) {
                    return self.descend(id, PathToken::Argument, argument);
                }
                let result = match operator {
                    UnaryOperator::Not => match self.ast.boolean_value(argument) {
                        Some(b) => self.ast.boolean(!b),
                        None => {
                            return Err(Error::TypeError(format!(
                                "expected boolean for operation !, got {}",
                                self.type_of(argument)
                            ))
                            .into());
                        }
                    },
                    UnaryOperator::Minus => match self.ast.number_value(argument) {
                        Some(n) => self.ast.number(-n),
                        None => {
                            return Err(Error::TypeError(format!(
                                "expected number for operation -, got {}",
                                self.type_of(argument)
                            ))
                            .into());
                        }
                    },
                };
                Self::replaced(result, format!("Unary expression {} evaluated", self.source(id)))
            }
            Node::Binary {
                operator,
                left,
                right,
            } => {
                if !self.is_value(left) {
                    return self.descend(id, PathToken::Left, left);
                }
                if !self.is_value(right) {
                    return self.descend(id, PathToken::Right, right);
                }
                let result = self.evaluate_binary(operator, left, right)?;
                Self::replaced(result, format!("Binary expression {} evaluated", self.source(id)))
            }
            Node::Logical {
                operator,
                left,
                right,
            } => {
                if !self.is_value(left) {
                    return self.descend(id, PathToken::Left, left);
                }
                let Some(b) = self.ast.boolean_value(left) else {
                    return Err(self
                        .operand_error("boolean", "left", operator.symbol(), left)
                        .into());
                };
                let result = match (operator, b) {
                    (LogicalOperator::And, true) | (LogicalOperator::Or, false) => right,
                    (LogicalOperator::And, false) => self.ast.boolean(false),
                    (LogicalOperator::Or, true) => self.ast.boolean(true),
                };
                Self::replaced(result, format!("Logical expression {} evaluated", self.source(id)))
            }
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if !self.is_value(test) {
                    return self.descend(id, PathToken::Test, test);
                }
                let Some(b) = self.ast.boolean_value(test) else {
                    return Err(self.condition_error(test).into());
                };
                let (result, branch) = if b {
                    (consequent, "consequent")
                } else {
                    (alternate, "alternative")
                };
                Self::replaced(
                    result,
                    format!("Conditional expression evaluated, condition is {b}, {branch} evaluated"),
                )
            }
            Node::Array { elements } => {
                match elements.iter().position(|e| !self.is_value(*e)) {
                    Some(i) => self.descend(id, PathToken::Elements(i), elements[i]),
                    None => Err(Error::EvalError(format!(
                        "array {} is already a value",
                        self.source(id)
                    ))
                    .into()),
                }
            }
            Node::Call { callee, arguments } => {
                if !self.is_value(callee) {
                    return self.descend(id, PathToken::Callee, callee);
                }
                if let Some(i) = arguments.iter().position(|a| !self.is_value(*a)) {
                    return self.descend(id, PathToken::Arguments(i), arguments[i]);
                }
                self.call(callee, &arguments)
            }
            Node::Literal(_) | Node::Function { .. } | Node::Arrow { .. } => Err(Error::EvalError(
                format!("{} is already a value", self.source(id)),
            )
            .into()),
            other => Err(Error::EvalError(format!(
                "cannot reduce {} in expression position",
                node_kind(&other)
            ))
            .into()),
        }
    }

    fn call(&mut self, callee: NodeId, arguments: &[NodeId]) -> Reduced<Contraction> {
        let rendered: Vec<String> = arguments.iter().map(|a| self.source(*a)).collect();
        let rendered = rendered.join(", ");

        match self.ast.get(callee).clone() {
            Node::Function { name, .. } | Node::Arrow { name, .. } => {
                let result = apply(self.ast, callee, arguments)?;
                let name = name.unwrap_or_else(|| "anonymous function".to_string());
                Self::replaced(result, format!("Function {name} applied to ({rendered})"))
            }
            Node::Identifier(name) if self.env.is_builtin(&name) => {
                let values = arguments
                    .iter()
                    .map(|a| HostValue::from_node(self.ast, *a))
                    .collect::<Result<Vec<_>, _>>()?;
                tracing::trace!(target: "substep::step", builtin = %name, "calling builtin");
                let result = self.env.call_builtin(&name, values)?.into_node(self.ast);
                Self::replaced(result, format!("Builtin {name} applied to ({rendered})"))
            }
            _ => Err(Error::TypeError(format!(
                "calling non-function value {}",
                self.source(callee)
            ))
            .into()),
        }
    }

    fn evaluate_binary(
        &mut self,
        operator: BinaryOperator,
        left: NodeId,
        right: NodeId,
    ) -> Result<NodeId, Error> {
        use BinaryOperator::*;
        use std::cmp::Ordering;

        let symbol = operator.symbol();
        let (l, r) = (self.literal_of(left), self.literal_of(right));
        let result = match operator {
            StrictEq | StrictNe => {
                let equal = match (&l, &r) {
                    (Some(a), Some(b)) => a == b,
                    (None, None) => left == right || self.same_builtin(left, right),
                    _ => false,
                };
                Literal::Boolean(equal == (operator == StrictEq))
            }
            Add => match (l, r) {
                (Some(Literal::Number(a)), Some(Literal::Number(b))) => Literal::Number(a + b),
                (Some(Literal::String(a)), Some(Literal::String(b))) => Literal::String(a + &b),
                (Some(Literal::Number(_)), _) => {
                    return Err(self.operand_error("number", "right", symbol, right));
                }
                (Some(Literal::String(_)), _) => {
                    return Err(self.operand_error("string", "right", symbol, right));
                }
                _ => return Err(self.operand_error("string or number", "left", symbol, left)),
            },
            Sub | Mul | Div | Mod => {
                let (Some(Literal::Number(a)), Some(Literal::Number(b))) = (&l, &r) else {
                    return Err(match l {
                        Some(Literal::Number(_)) => self.operand_error("number", "right", symbol, right),
                        _ => self.operand_error("number", "left", symbol, left),
                    });
                };
                Literal::Number(match operator {
                    Sub => a - b,
                    Mul => a * b,
                    Div => a / b,
                    _ => a % b,
                })
            }
            Lt | Le | Gt | Ge => {
                let ordering = match (l, r) {
                    (Some(Literal::Number(a)), Some(Literal::Number(b))) => a.partial_cmp(&b),
                    (Some(Literal::String(a)), Some(Literal::String(b))) => Some(a.cmp(&b)),
                    (Some(Literal::Number(_)), _) => {
                        return Err(self.operand_error("number", "right", symbol, right));
                    }
                    (Some(Literal::String(_)), _) => {
                        return Err(self.operand_error("string", "right", symbol, right));
                    }
                    _ => return Err(self.operand_error("string or number", "left", symbol, left)),
                };
                Literal::Boolean(match operator {
                    Lt => ordering == Some(Ordering::Less),
                    Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
                    Gt => ordering == Some(Ordering::Greater),
                    _ => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
                })
            }
        };
        Ok(self.ast.literal(result))
    }

    fn same_builtin(&self, left: NodeId, right: NodeId) -> bool {
        matches!(
            (self.ast.get(left), self.ast.get(right)),
            (Node::Identifier(a), Node::Identifier(b)) if a == b
        )
    }

    fn reduce_statements(&mut self, kind: ListKind, statements: &[NodeId]) -> Reduced<Contraction> {
        if kind == ListKind::BlockExpression {
            match statements {
                [] => {
                    let undefined = self.ast.undefined();
                    return Self::replaced(
                        undefined,
                        "Block expression without return evaluated to undefined".to_string(),
                    );
                }
                [only] if is_value_statement(self.ast, *only, self.env) => {
                    let undefined = self.ast.undefined();
                    return Self::replaced(
                        undefined,
                        "Block expression without return evaluated to undefined".to_string(),
                    );
                }
                [first, ..] => {
                    if let Node::Return { argument } = self.ast.get(*first).clone() {
                        let result = match argument {
                            Some(argument) => argument,
                            None => self.ast.undefined(),
                        };
                        let explanation = format!("{} returned", self.source(result));
                        return Self::replaced(result, explanation);
                    }
                }
            }
        }

        let step = self.reduce_list(kind, statements)?;
        let node = self.ast.add(kind.build(step.statements));
        Ok(Contraction {
            node,
            redex: step.redex,
            contracted: step.contracted,
            explanation: step.explanation,
        })
    }

    /// Reduce the leading statement of a list
    fn reduce_list(&mut self, kind: ListKind, statements: &[NodeId]) -> Reduced<ListStep> {
        let Some((&first, rest)) = statements.split_first() else {
            return Err(Error::EvalError("nothing left to evaluate in an empty block".into()).into());
        };

        if is_value_statement(self.ast, first, self.env) {
            if rest.is_empty() {
                return Err(Error::EvalError(format!(
                    "{} is already fully evaluated",
                    self.source(first)
                ))
                .into());
            }
            let next_declares = self.ast.get(rest[0]).declared_name().is_some();
            if next_declares {
                let tail = self.reduce_list(kind, rest)?;
                let mut kept = vec![first];
                kept.extend(tail.statements);
                return Ok(ListStep {
                    statements: kept,
                    redex: shift_statements(tail.redex, 1),
                    contracted: shift_statements(tail.contracted, 1),
                    explanation: tail.explanation,
                });
            }
            return Ok(ListStep {
                statements: rest.to_vec(),
                redex: vec![vec![PathToken::Statement(0)]],
                contracted: Vec::new(),
                explanation: format!("{} finished evaluating", self.source(first)),
            });
        }

        match self.ast.get(first).clone() {
            Node::ExpressionStatement { expression } => {
                let inner = self.descend(first, PathToken::Expression, expression)?;
                Ok(in_place(statements, inner))
            }
            Node::VariableDeclaration { kind: decl, name, init } => {
                if decl == DeclarationKind::Let {
                    return Err(Error::DisallowedDeclaration(format!(
                        "let {name}: mutable bindings are not supported, use const"
                    ))
                    .into());
                }
                let Some(init) = init else {
                    return Err(Stop::Placeholder(format!(
                        "Missing initializer in const declaration of {name}"
                    )));
                };
                if !self.is_value(init) {
                    let inner = self.descend(first, PathToken::Init, init)?;
                    return Ok(in_place(statements, inner));
                }
                let value = self.named_value(init, &name);
                let explanation = format!("Constant {name} declared and substituted into rest of block");
                Ok(self.eliminate(&name, value, rest, explanation))
            }
            Node::FunctionDeclaration { name, params, body } => {
                let explanation = if params.is_empty() {
                    format!("Function {name} declared, no parameters required")
                } else {
                    format!(
                        "Function {name} declared, parameter(s) {} required",
                        params.join(", ")
                    )
                };
                let value = self.ast.add(Node::Function {
                    name: Some(name.clone()),
                    params,
                    body,
                });
                Ok(self.eliminate(&name, value, rest, explanation))
            }
            Node::If {
                test,
                consequent,
                alternate,
            } => {
                if !self.is_value(test) {
                    let inner = self.descend(first, PathToken::Test, test)?;
                    return Ok(in_place(statements, inner));
                }
                let Some(b) = self.ast.boolean_value(test) else {
                    return Err(self.condition_error(test).into());
                };
                let chosen = if b { Some(consequent) } else { alternate };
                let explanation = format!(
                    "If statement evaluated, condition is {b}, proceed to {} block",
                    if b { "if" } else { "else" }
                );
                Ok(self.enter_branch(chosen, rest, explanation))
            }
            Node::Block { body } => self.reduce_nested_block(&body, rest),
            Node::Return { .. } => Err(Error::EvalError(
                "return statement outside of a function body".to_string(),
            )
            .into()),
            Node::Debugger => Ok(ListStep {
                statements: rest.to_vec(),
                redex: vec![vec![PathToken::Statement(0)]],
                contracted: Vec::new(),
                explanation: "debugger statement skipped".to_string(),
            }),
            other => Err(Error::EvalError(format!(
                "cannot reduce {} in statement position",
                node_kind(&other)
            ))
            .into()),
        }
    }

    /// A constant bound to an anonymous function value takes the constant's name
    fn named_value(&mut self, value: NodeId, name: &str) -> NodeId {
        match self.ast.get(value).clone() {
            Node::Function {
                name: None,
                params,
                body,
            } => self.ast.add(Node::Function {
                name: Some(name.to_owned()),
                params,
                body,
            }),
            Node::Arrow {
                name: None,
                params,
                body,
            } => self.ast.add(Node::Arrow {
                name: Some(name.to_owned()),
                params,
                body,
            }),
            _ => value,
        }
    }

    /// Remove a declaration and substitute its value into the statements after it.
    ///
    /// Later declarations of the same list are in the value's scope, so a name free in
    /// `value` that one of them declares keeps referring to it.
    fn eliminate(
        &mut self,
        name: &str,
        value: NodeId,
        rest: &[NodeId],
        explanation: String,
    ) -> ListStep {
        let (statements, contracted) = substitute_statements(self.ast, name, value, rest);
        ListStep {
            statements,
            redex: vec![vec![PathToken::Statement(0)]],
            contracted,
            explanation,
        }
    }

    fn enter_branch(&mut self, chosen: Option<NodeId>, rest: &[NodeId], explanation: String) -> ListStep {
        let redex = vec![vec![PathToken::Statement(0)]];
        let Some(branch) = chosen else {
            return ListStep {
                statements: rest.to_vec(),
                redex,
                contracted: Vec::new(),
                explanation,
            };
        };

        let spliced = match self.ast.get(branch) {
            Node::Block { body } if body.iter().all(|s| self.ast.get(*s).declared_name().is_none()) => {
                Some(body.clone())
            }
            _ => None,
        };
        let (statements, contracted) = match spliced {
            Some(body) => {
                let contracted = (0..body.len()).map(|i| vec![PathToken::Statement(i)]).collect();
                let mut statements = body;
                statements.extend_from_slice(rest);
                (statements, contracted)
            }
            None => {
                let mut statements = vec![branch];
                statements.extend_from_slice(rest);
                (statements, vec![vec![PathToken::Statement(0)]])
            }
        };
        ListStep {
            statements,
            redex,
            contracted,
            explanation,
        }
    }

    fn reduce_nested_block(&mut self, body: &[NodeId], rest: &[NodeId]) -> Reduced<ListStep> {
        let replace_with = |statement: Option<NodeId>, explanation: &str| {
            let mut statements: Vec<NodeId> = statement.into_iter().collect();
            let contracted = if statements.is_empty() {
                Vec::new()
            } else {
                vec![vec![PathToken::Statement(0)]]
            };
            statements.extend_from_slice(rest);
            ListStep {
                statements,
                redex: vec![vec![PathToken::Statement(0)]],
                contracted,
                explanation: explanation.to_string(),
            }
        };

        match body {
            [] => Ok(replace_with(None, "Empty block removed")),
            [first, ..] if matches!(self.ast.get(*first), Node::Return { .. }) => {
                Ok(replace_with(Some(*first), "Return statement leaves the enclosing block"))
            }
            [only] if is_value_statement(self.ast, *only, self.env) => {
                Ok(replace_with(Some(*only), "Block evaluated"))
            }
            _ => {
                let inner = self.reduce_list(ListKind::Block, body)?;
                let node = self.ast.add(Node::Block {
                    body: inner.statements,
                });
                let mut statements = vec![node];
                statements.extend_from_slice(rest);
                let head = [PathToken::Statement(0)];
                Ok(ListStep {
                    statements,
                    redex: prefixed(&head, inner.redex),
                    contracted: prefixed(&head, inner.contracted),
                    explanation: inner.explanation,
                })
            }
        }
    }
}

/// Replace the leading statement with the result of reducing inside it
fn in_place(statements: &[NodeId], inner: Contraction) -> ListStep {
    let mut rebuilt = statements.to_vec();
    rebuilt[0] = inner.node;
    let head = [PathToken::Statement(0)];
    ListStep {
        statements: rebuilt,
        redex: prefixed(&head, inner.redex),
        contracted: prefixed(&head, inner.contracted),
        explanation: inner.explanation,
    }
}

fn node_kind(node: &Node) -> &'static str {
    match node {
        Node::Literal(_) => "literal",
        Node::Identifier(_) => "identifier",
        Node::Unary { .. } => "unary expression",
        Node::Binary { .. } => "binary expression",
        Node::Logical { .. } => "logical expression",
        Node::Conditional { .. } => "conditional expression",
        Node::Call { .. } => "call expression",
        Node::Array { .. } => "array expression",
        Node::Function { .. } => "function",
        Node::Arrow { .. } => "arrow function",
        Node::BlockExpression { .. } => "block expression",
        Node::Program { .. } => "program",
        Node::Block { .. } => "block",
        Node::ExpressionStatement { .. } => "expression statement",
        Node::VariableDeclaration { .. } => "variable declaration",
        Node::FunctionDeclaration { .. } => "function declaration",
        Node::If { .. } => "if statement",
        Node::Return { .. } => "return statement",
        Node::Debugger => "debugger statement",
        Node::RedexMarker { .. } => "redex marker",
        Node::Elided => "elided body",
    }
}
