//! Arena-based syntax tree for the stepper.
//!
//! Every node lives in an append-only [`Ast`] arena and is addressed by a [`NodeId`].
//! Nodes are never mutated after they are added: a rewrite appends the nodes it changes
//! and shares every untouched subtree by id. Node identity (for memoization) is
//! therefore simply the arena index.
//!
//! Small builder helpers such as [`Ast::number`], [`Ast::identifier`] and
//! [`Ast::binary`] keep tree construction in code and tests readable.

use std::fmt;

/// Index of a node inside an [`Ast`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Literal values. Numbers are IEEE doubles as in the taught language.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Boolean(bool),
    String(String),
    Null,
    Undefined,
}

impl Literal {
    /// Name of the literal's type as reported in type errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Number(_) => "number",
            Literal::Boolean(_) => "boolean",
            Literal::String(_) => "string",
            Literal::Null => "null",
            Literal::Undefined => "undefined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Minus,
}

impl UnaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Not => "!",
            UnaryOperator::Minus => "-",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    StrictEq,
    StrictNe,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::StrictEq => "===",
            BinaryOperator::StrictNe => "!==",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
        }
    }

    /// Operator lookup used by both front ends
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => BinaryOperator::Add,
            "-" => BinaryOperator::Sub,
            "*" => BinaryOperator::Mul,
            "/" => BinaryOperator::Div,
            "%" => BinaryOperator::Mod,
            "===" => BinaryOperator::StrictEq,
            "!==" => BinaryOperator::StrictNe,
            "<" => BinaryOperator::Lt,
            "<=" => BinaryOperator::Le,
            ">" => BinaryOperator::Gt,
            ">=" => BinaryOperator::Ge,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

impl LogicalOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Const,
    Let,
}

impl DeclarationKind {
    pub fn keyword(self) -> &'static str {
        match self {
            DeclarationKind::Const => "const",
            DeclarationKind::Let => "let",
        }
    }
}

/// Core node type.
///
/// Function and arrow values carry an optional name: a declared function, or a
/// constant bound to an anonymous arrow, becomes a *named* value that refers to itself
/// by that name and prints as the name.
///
/// The body of a `Function` or `FunctionDeclaration` is always a `Block`; the body of
/// an `Arrow` is either a `Block` or an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Literal),
    Identifier(String),
    Unary {
        operator: UnaryOperator,
        argument: NodeId,
    },
    Binary {
        operator: BinaryOperator,
        left: NodeId,
        right: NodeId,
    },
    Logical {
        operator: LogicalOperator,
        left: NodeId,
        right: NodeId,
    },
    Conditional {
        test: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    },
    Call {
        callee: NodeId,
        arguments: Vec<NodeId>,
    },
    Array {
        elements: Vec<NodeId>,
    },
    Function {
        name: Option<String>,
        params: Vec<String>,
        body: NodeId,
    },
    Arrow {
        name: Option<String>,
        params: Vec<String>,
        body: NodeId,
    },
    /// A function body under evaluation in expression position
    BlockExpression {
        body: Vec<NodeId>,
    },
    Program {
        body: Vec<NodeId>,
    },
    Block {
        body: Vec<NodeId>,
    },
    ExpressionStatement {
        expression: NodeId,
    },
    VariableDeclaration {
        kind: DeclarationKind,
        name: String,
        init: Option<NodeId>,
    },
    FunctionDeclaration {
        name: String,
        params: Vec<String>,
        body: NodeId,
    },
    If {
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },
    Return {
        argument: Option<NodeId>,
    },
    Debugger,
    /// Display-only placeholder standing in for an extracted redex
    RedexMarker {
        parenthesized: bool,
    },
    /// Display-only placeholder for a function body that was not unfolded
    Elided,
}

impl Node {
    /// Statements of a statement-list node (program, block or block expression)
    pub fn statements(&self) -> Option<&[NodeId]> {
        match self {
            Node::Program { body } | Node::Block { body } | Node::BlockExpression { body } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// Name introduced into the enclosing block by a declaration statement
    pub fn declared_name(&self) -> Option<&str> {
        match self {
            Node::VariableDeclaration { name, .. } | Node::FunctionDeclaration { name, .. } => {
                Some(name)
            }
            _ => None,
        }
    }

    pub fn is_function_value(&self) -> bool {
        matches!(self, Node::Function { .. } | Node::Arrow { .. })
    }

    /// Direct children in evaluation order
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Literal(_)
            | Node::Identifier(_)
            | Node::Debugger
            | Node::RedexMarker { .. }
            | Node::Elided => Vec::new(),
            Node::Unary { argument, .. } => vec![*argument],
            Node::Binary { left, right, .. } | Node::Logical { left, right, .. } => {
                vec![*left, *right]
            }
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => vec![*test, *consequent, *alternate],
            Node::Call { callee, arguments } => {
                let mut children = vec![*callee];
                children.extend(arguments);
                children
            }
            Node::Array { elements } => elements.clone(),
            Node::Function { body, .. }
            | Node::Arrow { body, .. }
            | Node::FunctionDeclaration { body, .. } => vec![*body],
            Node::BlockExpression { body } | Node::Program { body } | Node::Block { body } => {
                body.clone()
            }
            Node::ExpressionStatement { expression } => vec![*expression],
            Node::VariableDeclaration { init, .. } => init.iter().copied().collect(),
            Node::If {
                test,
                consequent,
                alternate,
            } => {
                let mut children = vec![*test, *consequent];
                children.extend(alternate);
                children
            }
            Node::Return { argument } => argument.iter().copied().collect(),
        }
    }

    /// Copy of this node with every child id passed through `f`, in evaluation order
    pub fn map_children(&self, mut f: impl FnMut(NodeId) -> NodeId) -> Node {
        let mut node = self.clone();
        match &mut node {
            Node::Literal(_)
            | Node::Identifier(_)
            | Node::Debugger
            | Node::RedexMarker { .. }
            | Node::Elided => {}
            Node::Unary { argument, .. } => *argument = f(*argument),
            Node::Binary { left, right, .. } | Node::Logical { left, right, .. } => {
                *left = f(*left);
                *right = f(*right);
            }
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => {
                *test = f(*test);
                *consequent = f(*consequent);
                *alternate = f(*alternate);
            }
            Node::Call { callee, arguments } => {
                *callee = f(*callee);
                arguments.iter_mut().for_each(|a| *a = f(*a));
            }
            Node::Array { elements: list }
            | Node::BlockExpression { body: list }
            | Node::Program { body: list }
            | Node::Block { body: list } => list.iter_mut().for_each(|c| *c = f(*c)),
            Node::Function { body, .. }
            | Node::Arrow { body, .. }
            | Node::FunctionDeclaration { body, .. } => *body = f(*body),
            Node::ExpressionStatement { expression } => *expression = f(*expression),
            Node::VariableDeclaration { init: slot, .. } | Node::Return { argument: slot } => {
                if let Some(c) = slot {
                    *c = f(*c);
                }
            }
            Node::If {
                test,
                consequent,
                alternate,
            } => {
                *test = f(*test);
                *consequent = f(*consequent);
                if let Some(a) = alternate {
                    *a = f(*a);
                }
            }
        }
        node
    }
}

/// Append-only node arena
#[derive(Debug, Clone, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Ast {
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(256),
        }
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Look up a node. Ids are only ever minted by [`Ast::add`], so lookups of ids
    /// from this arena cannot fail.
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn literal(&mut self, literal: Literal) -> NodeId {
        self.add(Node::Literal(literal))
    }

    pub fn number(&mut self, n: f64) -> NodeId {
        self.literal(Literal::Number(n))
    }

    pub fn boolean(&mut self, b: bool) -> NodeId {
        self.literal(Literal::Boolean(b))
    }

    pub fn string(&mut self, s: impl Into<String>) -> NodeId {
        self.literal(Literal::String(s.into()))
    }

    pub fn undefined(&mut self) -> NodeId {
        self.literal(Literal::Undefined)
    }

    pub fn identifier(&mut self, name: impl Into<String>) -> NodeId {
        self.add(Node::Identifier(name.into()))
    }

    pub fn unary(&mut self, operator: UnaryOperator, argument: NodeId) -> NodeId {
        self.add(Node::Unary { operator, argument })
    }

    pub fn binary(&mut self, operator: BinaryOperator, left: NodeId, right: NodeId) -> NodeId {
        self.add(Node::Binary {
            operator,
            left,
            right,
        })
    }

    pub fn call(&mut self, callee: NodeId, arguments: Vec<NodeId>) -> NodeId {
        self.add(Node::Call { callee, arguments })
    }

    pub fn arrow(&mut self, params: &[&str], body: NodeId) -> NodeId {
        self.add(Node::Arrow {
            name: None,
            params: params.iter().map(|p| (*p).to_owned()).collect(),
            body,
        })
    }

    pub fn expression_statement(&mut self, expression: NodeId) -> NodeId {
        self.add(Node::ExpressionStatement { expression })
    }

    pub fn program(&mut self, body: Vec<NodeId>) -> NodeId {
        self.add(Node::Program { body })
    }

    /// Numeric value of a number literal or a negated number literal
    pub fn number_value(&self, id: NodeId) -> Option<f64> {
        match self.get(id) {
            Node::Literal(Literal::Number(n)) => Some(*n),
            Node::Unary {
                operator: UnaryOperator::Minus,
                argument,
            } => match self.get(*argument) {
                Node::Literal(Literal::Number(n)) => Some(-n),
                _ => None,
            },
            _ => None,
        }
    }

    /// Boolean value of a boolean literal
    pub fn boolean_value(&self, id: NodeId) -> Option<bool> {
        match self.get(id) {
            Node::Literal(Literal::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Structural equality between a subtree of this arena and a subtree of `other`.
    ///
    /// Numbers compare by bit pattern so that `NaN` equals itself.
    pub fn structurally_equal(&self, a: NodeId, other: &Ast, b: NodeId) -> bool {
        let (left, right) = (self.get(a), other.get(b));
        let same_shell = match (left, right) {
            (Node::Literal(Literal::Number(x)), Node::Literal(Literal::Number(y))) => {
                return x.to_bits() == y.to_bits();
            }
            (Node::Literal(x), Node::Literal(y)) => return x == y,
            (Node::Identifier(x), Node::Identifier(y)) => return x == y,
            (Node::Unary { operator: x, .. }, Node::Unary { operator: y, .. }) => x == y,
            (Node::Binary { operator: x, .. }, Node::Binary { operator: y, .. }) => x == y,
            (Node::Logical { operator: x, .. }, Node::Logical { operator: y, .. }) => x == y,
            (
                Node::Function {
                    name: n1,
                    params: p1,
                    ..
                },
                Node::Function {
                    name: n2,
                    params: p2,
                    ..
                },
            )
            | (
                Node::Arrow {
                    name: n1,
                    params: p1,
                    ..
                },
                Node::Arrow {
                    name: n2,
                    params: p2,
                    ..
                },
            ) => n1 == n2 && p1 == p2,
            (
                Node::FunctionDeclaration {
                    name: n1,
                    params: p1,
                    ..
                },
                Node::FunctionDeclaration {
                    name: n2,
                    params: p2,
                    ..
                },
            ) => n1 == n2 && p1 == p2,
            (
                Node::VariableDeclaration {
                    kind: k1, name: n1, ..
                },
                Node::VariableDeclaration {
                    kind: k2, name: n2, ..
                },
            ) => k1 == k2 && n1 == n2,
            (Node::If { alternate: a1, .. }, Node::If { alternate: a2, .. }) => {
                a1.is_some() == a2.is_some()
            }
            (Node::RedexMarker { parenthesized: x }, Node::RedexMarker { parenthesized: y }) => {
                x == y
            }
            (l, r) => std::mem::discriminant(l) == std::mem::discriminant(r),
        };
        if !same_shell {
            return false;
        }

        let (lc, rc) = (left.children(), right.children());
        lc.len() == rc.len()
            && lc
                .iter()
                .zip(&rc)
                .all(|(x, y)| self.structurally_equal(*x, other, *y))
    }
}

impl std::ops::Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_sharing_and_lookup() {
        let mut ast = Ast::new();
        let one = ast.number(1.0);
        let two = ast.number(2.0);
        let sum = ast.binary(BinaryOperator::Add, one, two);
        let doubled = ast.binary(BinaryOperator::Mul, sum, sum);

        assert_eq!(ast.len(), 4);
        assert_eq!(ast[doubled].children(), vec![sum, sum]);
        assert_eq!(ast.number_value(one), Some(1.0));
        assert_eq!(ast.number_value(sum), None);

        let negated = ast.unary(UnaryOperator::Minus, two);
        assert_eq!(ast.number_value(negated), Some(-2.0));
    }

    #[test]
    fn test_structural_equality_across_arenas() {
        let build = |ast: &mut Ast, right: f64| {
            let x = ast.identifier("x");
            let n = ast.number(right);
            let body = ast.binary(BinaryOperator::Add, x, n);
            ast.arrow(&["x"], body)
        };

        let mut a = Ast::new();
        let mut b = Ast::new();
        b.number(99.0); // offset ids so equality cannot rely on indices
        let left = build(&mut a, 1.0);
        let right = build(&mut b, 1.0);
        let different = build(&mut b, 2.0);

        assert!(a.structurally_equal(left, &b, right));
        assert!(!a.structurally_equal(left, &b, different));

        let nan_a = a.number(f64::NAN);
        let nan_b = b.number(f64::NAN);
        assert!(a.structurally_equal(nan_a, &b, nan_b));
    }

    #[test]
    fn test_statement_helpers() {
        let mut ast = Ast::new();
        let one = ast.number(1.0);
        let decl = ast.add(Node::VariableDeclaration {
            kind: DeclarationKind::Const,
            name: "x".into(),
            init: Some(one),
        });
        let program = ast.program(vec![decl]);

        assert_eq!(ast[decl].declared_name(), Some("x"));
        assert_eq!(ast[program].statements(), Some(&[decl][..]));
        assert_eq!(ast[one].declared_name(), None);
        assert_eq!(BinaryOperator::from_symbol("==="), Some(BinaryOperator::StrictEq));
        assert_eq!(BinaryOperator::from_symbol("=="), None);
    }
}
