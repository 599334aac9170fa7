//! Beta reduction.

use std::collections::BTreeSet;

use crate::Error;
use crate::ast::{Ast, Node, NodeId};
use crate::substitute::{bound_names, free_names, fresh_name, rename, substitute};
use crate::treeify::to_source;

/// Bind `arguments` into the body of the function value `callee`.
///
/// Parameters are substituted left to right. Before argument `i` goes in, every
/// later parameter that occurs free in it is renamed, so a later substitution can
/// never reach into an earlier argument. A named function first has its own name
/// substituted into its body, which makes recursive calls refer to the function value.
///
/// The result is:
/// - the body expression, for an arrow with an expression body;
/// - the returned expression (or `undefined`), when the body starts with `return`;
/// - otherwise a block expression holding the body statements.
pub fn apply(ast: &mut Ast, callee: NodeId, arguments: &[NodeId]) -> Result<NodeId, Error> {
    let (name, mut params, mut body) = match ast.get(callee) {
        Node::Function { name, params, body } | Node::Arrow { name, params, body } => {
            (name.clone(), params.clone(), *body)
        }
        _ => {
            return Err(Error::TypeError(format!(
                "calling non-function value {}",
                to_source(ast, callee)
            )));
        }
    };

    if params.len() != arguments.len() {
        return Err(Error::arity_error_for(
            params.len(),
            arguments.len(),
            name.as_deref().unwrap_or("anonymous function"),
        ));
    }

    if let Some(own) = name.as_deref()
        && !params.iter().any(|p| p == own)
    {
        body = substitute(ast, own, callee, body).node;
    }

    for i in 0..params.len() {
        let argument_free = free_names(ast, arguments[i]);
        for j in i + 1..params.len() {
            if argument_free.contains(&params[j]) {
                let mut avoid: BTreeSet<String> = free_names(ast, body);
                avoid.extend(bound_names(ast, body));
                avoid.extend(params.iter().cloned());
                for argument in arguments {
                    avoid.extend(free_names(ast, *argument));
                }
                let fresh = fresh_name(&params[j], &avoid);
                tracing::trace!(
                    target: "substep::substitute",
                    from = %params[j],
                    to = %fresh,
                    "renamed parameter ahead of argument substitution"
                );
                body = rename(ast, &params[j], &fresh, body);
                params[j] = fresh;
            }
        }
        body = substitute(ast, &params[i], arguments[i], body).node;
    }

    let Node::Block { body: statements } = ast.get(body).clone() else {
        return Ok(body);
    };
    match statements.first().map(|s| ast.get(*s)) {
        Some(Node::Return {
            argument: Some(argument),
        }) => Ok(*argument),
        Some(Node::Return { argument: None }) => Ok(ast.undefined()),
        _ => Ok(ast.add(Node::BlockExpression { body: statements })),
    }
}

#[cfg(all(test, feature = "source"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::source::parse_expression;

    fn run(callee: &str, arguments: &[&str]) -> Result<String, Error> {
        let mut ast = Ast::new();
        let callee = parse_expression(&mut ast, callee).unwrap();
        let arguments: Vec<NodeId> = arguments
            .iter()
            .map(|a| parse_expression(&mut ast, a).unwrap())
            .collect();
        apply(&mut ast, callee, &arguments).map(|result| to_source(&ast, result))
    }

    #[test]
    fn test_apply_results() {
        let test_cases = vec![
            ("x => x + 1", vec!["2"], "2 + 1"),
            ("(x, y) => x * y", vec!["3", "4"], "3 * 4"),
            ("() => 7", vec![], "7"),
            ("function (n) { return n; }", vec!["-29"], "-29"),
            ("function (n) { }", vec!["1"], "(() => {})()"),
            ("x => { return; }", vec!["1"], "undefined"),
            (
                "x => { const y = x; return y; }",
                vec!["5"],
                "(() => {\n  const y = 5;\n  return y;\n})()",
            ),
            // later parameters free in an earlier argument are renamed first
            ("(a, b) => a(b)", vec!["z => b", "1"], "(z => b)(1)"),
            ("(f, x) => f(x)", vec!["y => x", "2"], "(y => x)(2)"),
            // inner binders are renamed away from the argument's free names
            ("x => y => x", vec!["y"], "y_1 => y"),
        ];

        for (i, (callee, arguments, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(run(callee, &arguments).unwrap(), expected, "#{}", i + 1);
        }
    }

    #[test]
    fn test_named_function_refers_to_itself() {
        let mut ast = Ast::new();
        let body = parse_expression(&mut ast, "n === 0 ? 1 : n * fact(n - 1)").unwrap();
        let callee = ast.add(Node::Arrow {
            name: Some("fact".into()),
            params: vec!["n".into()],
            body,
        });
        let five = ast.number(5.0);

        let result = apply(&mut ast, callee, &[five]).unwrap();
        let Node::Conditional { alternate, .. } = ast.get(result).clone() else {
            panic!("expected conditional");
        };
        let Node::Binary { right, .. } = ast.get(alternate).clone() else {
            panic!("expected product");
        };
        let Node::Call { callee: inner, .. } = ast.get(right).clone() else {
            panic!("expected recursive call");
        };
        assert_eq!(inner, callee);
    }

    #[test]
    fn test_apply_errors() {
        let test_cases = vec![
            ("x => x", vec![], "ArityError: anonymous function expects 1 argument(s), but got 0."),
            ("(a, b) => a", vec!["1"], "ArityError: anonymous function expects 2 argument(s), but got 1."),
            ("1", vec![], "Type error: calling non-function value 1"),
        ];

        for (i, (callee, arguments, expected)) in test_cases.into_iter().enumerate() {
            let err = run(callee, &arguments).unwrap_err();
            assert_eq!(err.to_string(), expected, "#{}", i + 1);
        }
    }
}
