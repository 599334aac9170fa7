//! Capture-avoiding substitution.
//!
//! [`substitute`] rebuilds a target subtree with every free occurrence of a name
//! replaced by a value, and reports the path to each replaced occurrence. Untouched
//! subtrees keep their node ids, so a substitution that finds nothing to replace
//! returns the target itself.
//!
//! Hygiene is maintained in two places:
//! - before entering a function or arrow whose parameter (or own name) is free in the
//!   replacement, that binder is alpha-renamed to a fresh name;
//! - before entering a block that declares a name free in the replacement, the
//!   declaration and all its uses in the block are renamed.
//!
//! [`substitute_statements`] substitutes into the rest of the statement list the
//! replacement was declared in. Declarations there share the replacement's scope, so
//! a free name of the replacement that one of them declares refers to that binding
//! and nothing is renamed at the top level of the list.
//!
//! Fresh names append an increasing numeric suffix (`x_1`, `x_2`, ...) until the
//! candidate collides with nothing in scope.

use std::collections::BTreeSet;

use crate::ast::{Ast, Node, NodeId};
use crate::path::{Path, PathToken, child, child_tokens, with_children};

/// Result of a substitution: the rebuilt target and the path to every replaced site
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub node: NodeId,
    pub paths: Vec<Path>,
}

/// Replace every free occurrence of `name` in `target` by `replacement`
pub fn substitute(ast: &mut Ast, name: &str, replacement: NodeId, target: NodeId) -> Substitution {
    let mut substituter = Substituter::new(ast, name, replacement, Some(target));
    let node = substituter.visit(target);
    Substitution {
        node,
        paths: substituter.paths,
    }
}

/// Replace `name` by `replacement` in statements of the list that declared `name`.
///
/// Paths start with the statement index. A list that declares `name` again is left
/// unchanged.
pub fn substitute_statements(
    ast: &mut Ast,
    name: &str,
    replacement: NodeId,
    statements: &[NodeId],
) -> (Vec<NodeId>, Vec<Path>) {
    let redeclared = statements
        .iter()
        .any(|s| ast.get(*s).declared_name() == Some(name));
    if redeclared {
        return (statements.to_vec(), Vec::new());
    }

    let mut substituter = Substituter::new(ast, name, replacement, None);
    for s in statements {
        let free = free_names(substituter.ast, *s);
        substituter.target_free.extend(free);
    }
    let rebuilt = statements
        .iter()
        .enumerate()
        .map(|(i, s)| substituter.descend(PathToken::Statement(i), *s))
        .collect();
    (rebuilt, substituter.paths)
}

/// Consistently rename free occurrences of `old` in `target` to `new`
pub fn rename(ast: &mut Ast, old: &str, new: &str, target: NodeId) -> NodeId {
    let replacement = ast.identifier(new);
    substitute(ast, old, replacement, target).node
}

/// Names occurring free in `id`
pub fn free_names(ast: &Ast, id: NodeId) -> BTreeSet<String> {
    let mut free = BTreeSet::new();
    collect_free(ast, id, &mut Vec::new(), &mut free);
    free
}

fn collect_free(ast: &Ast, id: NodeId, bound: &mut Vec<String>, free: &mut BTreeSet<String>) {
    let mark = bound.len();
    match ast.get(id) {
        Node::Identifier(name) => {
            if !bound.contains(name) {
                free.insert(name.clone());
            }
            return;
        }
        Node::Function { name, params, .. } | Node::Arrow { name, params, .. } => {
            bound.extend(name.iter().cloned());
            bound.extend(params.iter().cloned());
        }
        Node::FunctionDeclaration { name, params, .. } => {
            bound.push(name.clone());
            bound.extend(params.iter().cloned());
        }
        node => {
            if let Some(statements) = node.statements() {
                bound.extend(
                    statements
                        .iter()
                        .filter_map(|s| ast.get(*s).declared_name().map(str::to_owned)),
                );
            }
        }
    }
    for c in ast.get(id).children() {
        collect_free(ast, c, bound, free);
    }
    bound.truncate(mark);
}

/// Every name bound anywhere in `id`: parameters, function names and declarations
pub fn bound_names(ast: &Ast, id: NodeId) -> BTreeSet<String> {
    let mut bound = BTreeSet::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        let node = ast.get(current);
        match node {
            Node::Function { name, params, .. } | Node::Arrow { name, params, .. } => {
                bound.extend(name.iter().cloned());
                bound.extend(params.iter().cloned());
            }
            Node::FunctionDeclaration { name, params, .. } => {
                bound.insert(name.clone());
                bound.extend(params.iter().cloned());
            }
            Node::VariableDeclaration { name, .. } => {
                bound.insert(name.clone());
            }
            _ => {}
        }
        stack.extend(node.children());
    }
    bound
}

/// `{base}_{n}` for the smallest `n >= 1` not in `avoid`
pub fn fresh_name(base: &str, avoid: &BTreeSet<String>) -> String {
    let mut n: usize = 1;
    loop {
        let candidate = format!("{base}_{n}");
        if !avoid.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Function,
    Arrow,
    Declaration,
}

struct Substituter<'a> {
    ast: &'a mut Ast,
    name: &'a str,
    replacement: NodeId,
    replacement_free: BTreeSet<String>,
    replacement_bound: BTreeSet<String>,
    target_free: BTreeSet<String>,
    /// Fresh names introduced during this substitution
    renamed: BTreeSet<String>,
    /// Current position relative to the target root
    path: Path,
    paths: Vec<Path>,
}

impl<'a> Substituter<'a> {
    fn new(ast: &'a mut Ast, name: &'a str, replacement: NodeId, target: Option<NodeId>) -> Self {
        let replacement_free = free_names(ast, replacement);
        let replacement_bound = bound_names(ast, replacement);
        let target_free = target.map(|t| free_names(ast, t)).unwrap_or_default();
        Substituter {
            ast,
            name,
            replacement,
            replacement_free,
            replacement_bound,
            target_free,
            renamed: BTreeSet::new(),
            path: Vec::new(),
            paths: Vec::new(),
        }
    }

    fn visit(&mut self, id: NodeId) -> NodeId {
        match self.ast.get(id).clone() {
            Node::Identifier(n) if n == self.name => {
                self.paths.push(self.path.clone());
                self.replacement
            }
            Node::Function { name, params, body } => {
                self.visit_function(id, FunctionKind::Function, name, params, body)
            }
            Node::Arrow { name, params, body } => {
                self.visit_function(id, FunctionKind::Arrow, name, params, body)
            }
            Node::FunctionDeclaration { name, params, body } => {
                self.visit_function(id, FunctionKind::Declaration, Some(name), params, body)
            }
            Node::Program { body } | Node::Block { body } | Node::BlockExpression { body } => {
                self.visit_block(id, &body)
            }
            _ => self.visit_children(id),
        }
    }

    fn descend(&mut self, token: PathToken, id: NodeId) -> NodeId {
        self.path.push(token);
        let result = self.visit(id);
        self.path.pop();
        result
    }

    fn visit_children(&mut self, id: NodeId) -> NodeId {
        let mut changes = Vec::new();
        for token in child_tokens(self.ast.get(id)) {
            let Some(c) = child(self.ast, id, token) else {
                continue;
            };
            let rebuilt = self.descend(token, c);
            if rebuilt != c {
                changes.push((token, rebuilt));
            }
        }
        if changes.is_empty() {
            id
        } else {
            with_children(self.ast, id, &changes).unwrap_or(id)
        }
    }

    /// Pick a fresh replacement for `base`, a binder inside `scope`
    fn fresh_for(&mut self, scope: NodeId, base: &str) -> String {
        let mut avoid = free_names(self.ast, scope);
        avoid.extend(bound_names(self.ast, scope));
        avoid.extend(self.replacement_free.iter().cloned());
        avoid.extend(self.replacement_bound.iter().cloned());
        avoid.extend(self.target_free.iter().cloned());
        avoid.extend(self.renamed.iter().cloned());
        avoid.insert(self.name.to_owned());

        let fresh = fresh_name(base, &avoid);
        tracing::trace!(
            target: "substep::substitute",
            from = base,
            to = %fresh,
            "renamed binder to avoid capture"
        );
        self.renamed.insert(fresh.clone());
        fresh
    }

    fn visit_function(
        &mut self,
        id: NodeId,
        kind: FunctionKind,
        mut name: Option<String>,
        mut params: Vec<String>,
        mut body: NodeId,
    ) -> NodeId {
        let shadowed =
            params.iter().any(|p| p == self.name) || name.as_deref() == Some(self.name);
        if shadowed || !free_names(self.ast, body).contains(self.name) {
            return id;
        }

        for k in 0..params.len() {
            if self.replacement_free.contains(&params[k]) {
                let fresh = self.fresh_for(id, &params[k]);
                body = rename(self.ast, &params[k], &fresh, body);
                params[k] = fresh;
            }
        }
        // A declaration's name belongs to the enclosing block, which renames it there
        if kind != FunctionKind::Declaration
            && let Some(own) = name.as_deref()
            && self.replacement_free.contains(own)
        {
            let fresh = self.fresh_for(id, own);
            body = rename(self.ast, own, &fresh, body);
            name = Some(fresh);
        }

        let body = self.descend(PathToken::Body, body);
        match kind {
            FunctionKind::Function => self.ast.add(Node::Function { name, params, body }),
            FunctionKind::Arrow => self.ast.add(Node::Arrow { name, params, body }),
            FunctionKind::Declaration => self.ast.add(Node::FunctionDeclaration {
                name: name.unwrap_or_default(),
                params,
                body,
            }),
        }
    }

    fn visit_block(&mut self, id: NodeId, statements: &[NodeId]) -> NodeId {
        let declared: Vec<String> = statements
            .iter()
            .filter_map(|s| self.ast.get(*s).declared_name().map(str::to_owned))
            .collect();
        if declared.iter().any(|d| d == self.name) || !free_names(self.ast, id).contains(self.name)
        {
            return id;
        }

        let mut current = id;
        for declared_name in declared {
            if self.replacement_free.contains(&declared_name) {
                let fresh = self.fresh_for(current, &declared_name);
                current = rename_declaration(self.ast, current, &declared_name, &fresh);
            }
        }
        self.visit_children(current)
    }
}

/// Rename a name declared by one of `block`'s statements, together with every use
/// of it in the block
fn rename_declaration(ast: &mut Ast, block: NodeId, old: &str, new: &str) -> NodeId {
    let Some(statements) = ast.get(block).statements().map(<[NodeId]>::to_vec) else {
        return block;
    };

    let renamed: Vec<NodeId> = statements
        .into_iter()
        .map(|statement| match ast.get(statement).clone() {
            Node::VariableDeclaration { kind, name, init } if name == old => {
                let init = init.map(|i| rename(ast, old, new, i));
                ast.add(Node::VariableDeclaration {
                    kind,
                    name: new.to_owned(),
                    init,
                })
            }
            Node::FunctionDeclaration { name, params, body } if name == old => {
                let body = if params.iter().any(|p| p == old) {
                    body
                } else {
                    rename(ast, old, new, body)
                };
                ast.add(Node::FunctionDeclaration {
                    name: new.to_owned(),
                    params,
                    body,
                })
            }
            _ => rename(ast, old, new, statement),
        })
        .collect();

    let node = match ast.get(block) {
        Node::Program { .. } => Node::Program { body: renamed },
        Node::BlockExpression { .. } => Node::BlockExpression { body: renamed },
        _ => Node::Block { body: renamed },
    };
    ast.add(node)
}

#[cfg(all(test, feature = "source"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::source::{parse_expression, parse_program_into};
    use crate::treeify::to_source;

    /// Parse `target` and `replacement`, substitute, and print the result
    fn run(target: &str, name: &str, replacement: &str, program: bool) -> (String, Vec<Path>) {
        let mut ast = Ast::new();
        let target = if program {
            parse_program_into(&mut ast, target).unwrap()
        } else {
            parse_expression(&mut ast, target).unwrap()
        };
        let replacement = parse_expression(&mut ast, replacement).unwrap();
        let result = substitute(&mut ast, name, replacement, target);
        (to_source(&ast, result.node), result.paths)
    }

    #[test]
    fn test_substitution_results() {
        let test_cases = vec![
            // (target, name, replacement, is_program, expected)
            ("x * (x + 1)", "x", "2", false, "2 * (2 + 1)"),
            ("f(x, y)", "y", "true", false, "f(x, true)"),
            ("x => x + y", "x", "1", false, "x => x + y"),
            ("x => x + y", "y", "1", false, "x => x + 1"),
            ("function (x) { return x; }", "x", "1", false, "function (x) {\n  return x;\n}"),
            // capture: the binder is renamed before substituting
            ("y => x + y", "x", "z => y", false, "y_1 => (z => y) + y_1"),
            ("y => x + y + y_1", "x", "z => y", false, "y_2 => (z => y) + y_2 + y_1"),
            ("(a, b) => x(a, b)", "x", "c => a", false, "(a_1, b) => (c => a)(a_1, b)"),
            // no free occurrence: no renaming either
            ("y => y", "x", "z => y", false, "y => y"),
            // blocks that declare the name shadow it entirely
            ("const x = 2;\nx + y;", "x", "5", true, "const x = 2;\nx + y;"),
            ("const z = 2;\nx + z;", "x", "5", true, "const z = 2;\n5 + z;"),
            // declarations colliding with the replacement's free names are pre-renamed
            ("const y = 1;\nx + y;", "x", "z => y", true, "const y_1 = 1;\n(z => y) + y_1;"),
        ];

        for (i, (target, name, replacement, program, expected)) in test_cases.into_iter().enumerate()
        {
            let (actual, _) = run(target, name, replacement, program);
            assert_eq!(actual, expected, "#{}: substituting {name} in {target}", i + 1);
        }
    }

    #[test]
    fn test_substitution_paths() {
        let (_, paths) = run("x * (x + 1)", "x", "2", false);
        assert_eq!(
            paths,
            vec![
                vec![PathToken::Left],
                vec![PathToken::Right, PathToken::Left]
            ]
        );

        let (_, paths) = run("const z = 2;\nx + z;\nf(y => x);", "x", "5", true);
        assert_eq!(
            paths,
            vec![
                vec![PathToken::Statement(1), PathToken::Expression, PathToken::Left],
                vec![
                    PathToken::Statement(2),
                    PathToken::Expression,
                    PathToken::Arguments(0),
                    PathToken::Body
                ],
            ]
        );

        let (_, paths) = run("x => x", "x", "1", false);
        assert!(paths.is_empty());
    }

    #[test]
    fn test_untouched_subtrees_are_shared() {
        let mut ast = Ast::new();
        let target = parse_expression(&mut ast, "(1 + 2) * x").unwrap();
        let replacement = ast.number(3.0);
        let Node::Binary { left, .. } = ast.get(target).clone() else {
            panic!("expected binary expression");
        };

        let result = substitute(&mut ast, "x", replacement, target);
        let Node::Binary { left: new_left, .. } = ast.get(result.node).clone() else {
            panic!("expected binary expression");
        };
        assert_eq!(left, new_left);

        let unchanged = substitute(&mut ast, "y", replacement, target);
        assert_eq!(unchanged.node, target);
        assert!(unchanged.paths.is_empty());
    }

    #[test]
    fn test_scope_analysis() {
        let mut ast = Ast::new();
        let id = parse_expression(&mut ast, "(a, b) => f(a, c, d => d + b)").unwrap();

        let free: Vec<String> = free_names(&ast, id).into_iter().collect();
        assert_eq!(free, vec!["c", "f"]);

        let bound: Vec<String> = bound_names(&ast, id).into_iter().collect();
        assert_eq!(bound, vec!["a", "b", "d"]);

        let avoid: BTreeSet<String> = ["x_1".to_string(), "x_2".to_string()].into();
        assert_eq!(fresh_name("x", &avoid), "x_3");
        assert_eq!(fresh_name("y", &avoid), "y_1");
    }
}
