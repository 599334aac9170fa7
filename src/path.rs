//! Access paths into the syntax tree.
//!
//! A [`Path`] identifies one node by the sequence of field accesses leading to it from
//! a root, so a step can point at a single occurrence even when the same subtree is
//! shared in several places.
//!
//! Example: in the program `(1 + 2) * 3;` the path to `2` is
//! `body[0].expression.left.right`.

use std::fmt;

use crate::ast::{Ast, Node, NodeId};

/// One field access on the way from a root to a target node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathToken {
    /// `body[i]` of a program, block or block expression
    Statement(usize),
    /// `body` of a function, arrow or function declaration
    Body,
    Expression,
    Init,
    Argument,
    Left,
    Right,
    Test,
    Consequent,
    Alternate,
    Callee,
    Arguments(usize),
    Elements(usize),
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathToken::Statement(i) => write!(f, "body[{i}]"),
            PathToken::Body => write!(f, "body"),
            PathToken::Expression => write!(f, "expression"),
            PathToken::Init => write!(f, "init"),
            PathToken::Argument => write!(f, "argument"),
            PathToken::Left => write!(f, "left"),
            PathToken::Right => write!(f, "right"),
            PathToken::Test => write!(f, "test"),
            PathToken::Consequent => write!(f, "consequent"),
            PathToken::Alternate => write!(f, "alternate"),
            PathToken::Callee => write!(f, "callee"),
            PathToken::Arguments(i) => write!(f, "arguments[{i}]"),
            PathToken::Elements(i) => write!(f, "elements[{i}]"),
        }
    }
}

/// A path from a root to a specific node
pub type Path = Vec<PathToken>;

/// Convert a path to a human-readable string
pub fn path_to_string(path: &[PathToken]) -> String {
    if path.is_empty() {
        return "root".to_string();
    }
    path.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Check if `prefix` is a prefix of `path` (or equal)
pub fn is_prefix_of(prefix: &[PathToken], path: &[PathToken]) -> bool {
    prefix.len() <= path.len() && prefix.iter().zip(path).all(|(a, b)| a == b)
}

/// Prepend `tokens` to every path in `paths`
pub fn prefixed(tokens: &[PathToken], paths: Vec<Path>) -> Vec<Path> {
    paths
        .into_iter()
        .map(|path| tokens.iter().copied().chain(path).collect())
        .collect()
}

/// Shift the leading statement index of every path by `offset`
pub(crate) fn shift_statements(paths: Vec<Path>, offset: usize) -> Vec<Path> {
    paths
        .into_iter()
        .map(|mut path| {
            if let Some(PathToken::Statement(i)) = path.first_mut() {
                *i += offset;
            }
            path
        })
        .collect()
}

/// The child reached from `id` by one field access
pub fn child(ast: &Ast, id: NodeId, token: PathToken) -> Option<NodeId> {
    match (ast.get(id), token) {
        (
            Node::Program { body } | Node::Block { body } | Node::BlockExpression { body },
            PathToken::Statement(i),
        ) => body.get(i).copied(),
        (
            Node::Function { body, .. }
            | Node::Arrow { body, .. }
            | Node::FunctionDeclaration { body, .. },
            PathToken::Body,
        ) => Some(*body),
        (Node::ExpressionStatement { expression }, PathToken::Expression) => Some(*expression),
        (Node::VariableDeclaration { init, .. }, PathToken::Init) => *init,
        (Node::Unary { argument, .. }, PathToken::Argument) => Some(*argument),
        (Node::Return { argument }, PathToken::Argument) => *argument,
        (Node::Binary { left, .. } | Node::Logical { left, .. }, PathToken::Left) => Some(*left),
        (Node::Binary { right, .. } | Node::Logical { right, .. }, PathToken::Right) => {
            Some(*right)
        }
        (Node::Conditional { test, .. } | Node::If { test, .. }, PathToken::Test) => Some(*test),
        (
            Node::Conditional { consequent, .. } | Node::If { consequent, .. },
            PathToken::Consequent,
        ) => Some(*consequent),
        (Node::Conditional { alternate, .. }, PathToken::Alternate) => Some(*alternate),
        (Node::If { alternate, .. }, PathToken::Alternate) => *alternate,
        (Node::Call { callee, .. }, PathToken::Callee) => Some(*callee),
        (Node::Call { arguments, .. }, PathToken::Arguments(i)) => arguments.get(i).copied(),
        (Node::Array { elements }, PathToken::Elements(i)) => elements.get(i).copied(),
        _ => None,
    }
}

/// Follow `path` from `root`, returning the node it reaches
pub fn get_at(ast: &Ast, root: NodeId, path: &[PathToken]) -> Option<NodeId> {
    path.iter()
        .try_fold(root, |current, token| child(ast, current, *token))
}

/// Field accesses leading to each direct child of `node`, in evaluation order
pub fn child_tokens(node: &Node) -> Vec<PathToken> {
    match node {
        Node::Literal(_)
        | Node::Identifier(_)
        | Node::Debugger
        | Node::RedexMarker { .. }
        | Node::Elided => Vec::new(),
        Node::Program { body } | Node::Block { body } | Node::BlockExpression { body } => {
            (0..body.len()).map(PathToken::Statement).collect()
        }
        Node::Function { .. } | Node::Arrow { .. } | Node::FunctionDeclaration { .. } => {
            vec![PathToken::Body]
        }
        Node::ExpressionStatement { .. } => vec![PathToken::Expression],
        Node::VariableDeclaration { init, .. } => init.map(|_| PathToken::Init).into_iter().collect(),
        Node::Unary { .. } => vec![PathToken::Argument],
        Node::Return { argument } => argument.map(|_| PathToken::Argument).into_iter().collect(),
        Node::Binary { .. } | Node::Logical { .. } => vec![PathToken::Left, PathToken::Right],
        Node::Conditional { .. } => {
            vec![PathToken::Test, PathToken::Consequent, PathToken::Alternate]
        }
        Node::If { alternate, .. } => {
            let mut tokens = vec![PathToken::Test, PathToken::Consequent];
            tokens.extend(alternate.map(|_| PathToken::Alternate));
            tokens
        }
        Node::Call { arguments, .. } => std::iter::once(PathToken::Callee)
            .chain((0..arguments.len()).map(PathToken::Arguments))
            .collect(),
        Node::Array { elements } => (0..elements.len()).map(PathToken::Elements).collect(),
    }
}

/// Rebuild `id` with the child at `token` replaced by `new_child`
pub fn with_child(ast: &mut Ast, id: NodeId, token: PathToken, new_child: NodeId) -> Option<NodeId> {
    with_children(ast, id, &[(token, new_child)])
}

/// Rebuild `id` with several children replaced at once, adding a single node
pub fn with_children(
    ast: &mut Ast,
    id: NodeId,
    replacements: &[(PathToken, NodeId)],
) -> Option<NodeId> {
    let mut node = ast.get(id).clone();
    for (token, new_child) in replacements {
        *child_slot(&mut node, *token)? = *new_child;
    }
    Some(ast.add(node))
}

fn child_slot(node: &mut Node, token: PathToken) -> Option<&mut NodeId> {
    let slot = match (node, token) {
        (
            Node::Program { body } | Node::Block { body } | Node::BlockExpression { body },
            PathToken::Statement(i),
        ) => body.get_mut(i)?,
        (
            Node::Function { body, .. }
            | Node::Arrow { body, .. }
            | Node::FunctionDeclaration { body, .. },
            PathToken::Body,
        ) => body,
        (Node::ExpressionStatement { expression }, PathToken::Expression) => expression,
        (Node::VariableDeclaration { init, .. }, PathToken::Init) => init.as_mut()?,
        (Node::Unary { argument, .. }, PathToken::Argument) => argument,
        (Node::Return { argument }, PathToken::Argument) => argument.as_mut()?,
        (Node::Binary { left, .. } | Node::Logical { left, .. }, PathToken::Left) => left,
        (Node::Binary { right, .. } | Node::Logical { right, .. }, PathToken::Right) => right,
        (Node::Conditional { test, .. } | Node::If { test, .. }, PathToken::Test) => test,
        (
            Node::Conditional { consequent, .. } | Node::If { consequent, .. },
            PathToken::Consequent,
        ) => consequent,
        (Node::Conditional { alternate, .. }, PathToken::Alternate) => alternate,
        (Node::If { alternate, .. }, PathToken::Alternate) => alternate.as_mut()?,
        (Node::Call { callee, .. }, PathToken::Callee) => callee,
        (Node::Call { arguments, .. }, PathToken::Arguments(i)) => arguments.get_mut(i)?,
        (Node::Array { elements }, PathToken::Elements(i)) => elements.get_mut(i)?,
        _ => return None,
    };
    Some(slot)
}

/// Replace the node at `path` under `root` with `replacement`, rebuilding the spine.
/// Returns `None` if the path does not lead to a node.
pub fn replace_at(
    ast: &mut Ast,
    root: NodeId,
    path: &[PathToken],
    replacement: NodeId,
) -> Option<NodeId> {
    match path.split_first() {
        None => Some(replacement),
        Some((token, rest)) => {
            let next = child(ast, root, *token)?;
            let rebuilt = replace_at(ast, next, rest, replacement)?;
            with_child(ast, root, *token, rebuilt)
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;

    /// `(1 + 2) * 3;` as a program
    fn sample(ast: &mut Ast) -> (NodeId, NodeId) {
        let one = ast.number(1.0);
        let two = ast.number(2.0);
        let three = ast.number(3.0);
        let sum = ast.binary(BinaryOperator::Add, one, two);
        let product = ast.binary(BinaryOperator::Mul, sum, three);
        let statement = ast.expression_statement(product);
        (ast.program(vec![statement]), two)
    }

    #[test]
    fn test_path_to_string() {
        assert_eq!(path_to_string(&[]), "root");

        let path = vec![
            PathToken::Statement(0),
            PathToken::Expression,
            PathToken::Left,
            PathToken::Right,
        ];
        assert_eq!(path_to_string(&path), "body[0].expression.left.right");
        assert_eq!(
            path_to_string(&[PathToken::Callee, PathToken::Arguments(2)]),
            "callee.arguments[2]"
        );
    }

    #[test]
    fn test_is_prefix() {
        let path = vec![PathToken::Statement(0), PathToken::Expression, PathToken::Left];
        let prefix = vec![PathToken::Statement(0), PathToken::Expression];
        let not_prefix = vec![PathToken::Statement(1)];

        assert!(is_prefix_of(&prefix, &path));
        assert!(is_prefix_of(&path, &path)); // Equal is prefix
        assert!(!is_prefix_of(&not_prefix, &path));
        assert!(!is_prefix_of(&path, &prefix)); // Longer can't be prefix
    }

    #[test]
    fn test_get_and_replace() {
        let mut ast = Ast::new();
        let (program, two) = sample(&mut ast);
        let path = vec![
            PathToken::Statement(0),
            PathToken::Expression,
            PathToken::Left,
            PathToken::Right,
        ];

        assert_eq!(get_at(&ast, program, &path), Some(two));
        assert_eq!(get_at(&ast, program, &[PathToken::Statement(3)]), None);
        assert_eq!(get_at(&ast, program, &[PathToken::Callee]), None);

        let five = ast.number(5.0);
        let replaced = replace_at(&mut ast, program, &path, five).unwrap();
        assert_ne!(replaced, program);
        assert_eq!(get_at(&ast, replaced, &path), Some(five));
        // The original tree is untouched
        assert_eq!(get_at(&ast, program, &path), Some(two));

        // The untouched right operand is shared between both trees
        let right = [PathToken::Statement(0), PathToken::Expression, PathToken::Right];
        assert_eq!(get_at(&ast, program, &right), get_at(&ast, replaced, &right));
    }

    #[test]
    fn test_prefix_and_shift() {
        let paths = vec![vec![PathToken::Statement(0), PathToken::Init], vec![]];
        let shifted = shift_statements(paths.clone(), 2);
        assert_eq!(shifted[0], vec![PathToken::Statement(2), PathToken::Init]);
        assert!(shifted[1].is_empty());

        let nested = prefixed(&[PathToken::Statement(1), PathToken::Expression], paths);
        assert_eq!(
            nested[1],
            vec![PathToken::Statement(1), PathToken::Expression]
        );
    }
}
