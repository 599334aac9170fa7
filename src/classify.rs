//! Value and redex classification.

use crate::ast::{Ast, Literal, Node, NodeId, UnaryOperator};
use crate::context::Environment;

/// Whether `id` is irreducible.
///
/// Values are literals, function and arrow values, negated number literals,
/// identifiers bound to predeclared builtins or constants, and arrays whose elements
/// are all values.
pub fn is_value(ast: &Ast, id: NodeId, env: &Environment) -> bool {
    match ast.get(id) {
        Node::Literal(_) | Node::Function { .. } | Node::Arrow { .. } => true,
        Node::Unary {
            operator: UnaryOperator::Minus,
            argument,
        } => matches!(ast.get(*argument), Node::Literal(Literal::Number(_))),
        Node::Identifier(name) => env.is_bound(name),
        Node::Array { elements } => elements.iter().all(|e| is_value(ast, *e, env)),
        _ => false,
    }
}

/// Whether `id` is an expression statement whose expression is a value
pub fn is_value_statement(ast: &Ast, id: NodeId, env: &Environment) -> bool {
    matches!(ast.get(id), Node::ExpressionStatement { expression } if is_value(ast, *expression, env))
}

/// Whether a statement-list node (or a bare expression) still has a step to take.
///
/// A statement list is fully reduced iff it is empty or consists of a single
/// expression statement whose expression is a value.
pub fn has_redex(ast: &Ast, id: NodeId, env: &Environment) -> bool {
    match ast.get(id).statements() {
        Some([]) => false,
        Some([only]) => !is_value_statement(ast, *only, env),
        Some(_) => true,
        None => !is_value(ast, id, env),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::BinaryOperator;
    use crate::context::Chapter;

    #[test]
    fn test_is_value() {
        let env = Environment::for_chapter(Chapter::One);
        let mut ast = Ast::new();

        let one = ast.number(1.0);
        let two = ast.number(2.0);
        let flag = ast.boolean(true);
        let text = ast.string("hi");
        let sum = ast.binary(BinaryOperator::Add, one, two);
        let negative = ast.unary(UnaryOperator::Minus, one);
        let negated_sum = ast.unary(UnaryOperator::Minus, sum);
        let not = ast.unary(UnaryOperator::Not, flag);
        let x = ast.identifier("x");
        let builtin = ast.identifier("math_abs");
        let arrow = ast.arrow(&["y"], sum);
        let values = ast.add(Node::Array {
            elements: vec![one, arrow],
        });
        let pending = ast.add(Node::Array {
            elements: vec![one, sum],
        });
        let call = ast.call(builtin, vec![one]);

        let test_cases = vec![
            (one, true),
            (flag, true),
            (text, true),
            (sum, false),
            (negative, true),
            (negated_sum, false),
            (not, false),
            (x, false),
            (builtin, true),
            (arrow, true), // function values never reduce under the binder
            (values, true),
            (pending, false),
            (call, false),
        ];

        for (i, (id, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(is_value(&ast, id, &env), expected, "#{}", i + 1);
        }
    }

    #[test]
    fn test_has_redex() {
        let env = Environment::for_chapter(Chapter::One);
        let mut ast = Ast::new();

        let one = ast.number(1.0);
        let two = ast.number(2.0);
        let sum = ast.binary(BinaryOperator::Add, one, two);
        let value_statement = ast.expression_statement(one);
        let sum_statement = ast.expression_statement(sum);

        let empty = ast.program(vec![]);
        let done = ast.program(vec![value_statement]);
        let pending = ast.program(vec![sum_statement]);
        let sequence = ast.program(vec![value_statement, value_statement]);

        assert!(!has_redex(&ast, empty, &env));
        assert!(!has_redex(&ast, done, &env));
        assert!(has_redex(&ast, pending, &env));
        assert!(has_redex(&ast, sequence, &env));
        assert!(has_redex(&ast, sum, &env));
        assert!(!has_redex(&ast, one, &env));
    }
}
