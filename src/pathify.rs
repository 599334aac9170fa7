//! Redex markers for display.
//!
//! [`pathify`] replaces the node at each path of a step with a [`Node::RedexMarker`],
//! keeping the first node it replaced as the step's redex. A marker is flagged for
//! parentheses whenever the node it stands in for would need them in that position,
//! so `(1 + 2) * 3` highlights as `(@redex) * 3`.
//!
//! A named function value prints as its name, so a path leading into one is cut
//! short and the whole value is marked.

use crate::ast::{Ast, Node, NodeId};
use crate::path::{Path, PathToken, child, get_at, replace_at};
use crate::stepper::Step;
use crate::treeify::{needs_parens, to_source};

/// A tree with markers in place of the highlighted nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pathified {
    pub tree: NodeId,
    /// The node reached by the first path that led anywhere
    pub redex: Option<NodeId>,
}

pub fn pathify(ast: &mut Ast, tree: NodeId, paths: &[Path]) -> Pathified {
    let mut current = tree;
    let mut redex = None;
    let mut visible: Vec<&[PathToken]> = Vec::new();
    for path in paths {
        let path = visible_prefix(ast, tree, path);
        if !visible.contains(&path) {
            visible.push(path);
        }
    }
    for path in visible {
        let Some(target) = get_at(ast, current, path) else {
            continue;
        };
        let parenthesized = match path.split_last() {
            Some((token, parent_path)) => get_at(ast, current, parent_path)
                .is_some_and(|parent| needs_parens(ast.get(parent), *token, ast.get(target))),
            None => false,
        };
        let marker = ast.add(Node::RedexMarker { parenthesized });
        if let Some(marked) = replace_at(ast, current, path, marker) {
            current = marked;
            if redex.is_none() {
                redex = Some(target);
            }
        }
    }
    Pathified {
        tree: current,
        redex,
    }
}

/// The part of `path` that stays visible once `tree` is printed
fn visible_prefix<'p>(ast: &Ast, tree: NodeId, path: &'p [PathToken]) -> &'p [PathToken] {
    let mut current = tree;
    for (i, token) in path.iter().enumerate() {
        if matches!(
            ast.get(current),
            Node::Function { name: Some(_), .. } | Node::Arrow { name: Some(_), .. }
        ) {
            return &path[..i];
        }
        match child(ast, current, *token) {
            Some(next) => current = next,
            None => break,
        }
    }
    path
}

/// Rendered form of a step with its highlighted part cut out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    /// The step's tree with `@redex` wherever a path pointed
    pub text: String,
    /// The highlighted node itself
    pub redex: Option<String>,
}

pub fn highlight(ast: &mut Ast, step: &Step) -> Highlight {
    let pathified = pathify(ast, step.tree, &step.paths);
    Highlight {
        text: to_source(ast, pathified.tree),
        redex: pathified.redex.map(|redex| to_source(ast, redex)),
    }
}
