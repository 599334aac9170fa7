//! Conversion of internal trees back into printable, re-parseable source.
//!
//! [`treeify`] copies a tree into a fresh display arena, rewriting the forms that
//! only exist during stepping:
//! - named function values become their name;
//! - anonymous function values are expanded up to [`MAX_FUNCTION_UNFOLD_DEPTH`]
//!   nested levels, deeper bodies become `...`;
//! - a block expression becomes an immediately invoked arrow `(() => { ... })()`;
//! - negative numbers, `NaN`, `Infinity` and `undefined` become the expressions
//!   that parse back to them.
//!
//! A function value met a second time at the same depth during one pass is not
//! expanded again; the display node produced the first time is shared.
//!
//! [`to_source`] treeifies and prints with precedence-aware parenthesization.

use std::collections::HashMap;

use crate::MAX_FUNCTION_UNFOLD_DEPTH;
use crate::ast::{Ast, BinaryOperator, Literal, LogicalOperator, Node, NodeId, UnaryOperator};
use crate::host::{escape_string, format_number};
use crate::path::PathToken;

/// A treeified copy of a tree in its own arena
#[derive(Debug, Clone)]
pub struct Treeified {
    pub ast: Ast,
    pub root: NodeId,
}

pub fn treeify(ast: &Ast, root: NodeId) -> Treeified {
    let mut treeifier = Treeifier {
        source: ast,
        out: Ast::new(),
        memo: HashMap::new(),
    };
    let root = treeifier.visit(root, 0);
    Treeified {
        ast: treeifier.out,
        root,
    }
}

/// Render `id` as source text
pub fn to_source(ast: &Ast, id: NodeId) -> String {
    let treeified = treeify(ast, id);
    let mut printer = Printer {
        ast: &treeified.ast,
        out: String::new(),
    };
    printer.top_level(treeified.root);
    printer.out
}

struct Treeifier<'a> {
    source: &'a Ast,
    out: Ast,
    /// (source function value, depth) -> display node
    memo: HashMap<(NodeId, usize), NodeId>,
}

impl Treeifier<'_> {
    fn visit(&mut self, id: NodeId, depth: usize) -> NodeId {
        let node = self.source.get(id).clone();
        match &node {
            Node::Literal(Literal::Number(n)) => self.number(*n),
            Node::Literal(Literal::Undefined) => self.out.identifier("undefined"),
            Node::Function {
                name: Some(name), ..
            }
            | Node::Arrow {
                name: Some(name), ..
            } => self.out.identifier(name.clone()),
            Node::Function { body, .. } | Node::Arrow { body, .. } => {
                if let Some(seen) = self.memo.get(&(id, depth)) {
                    return *seen;
                }
                let body = if depth >= MAX_FUNCTION_UNFOLD_DEPTH {
                    self.out.add(Node::Elided)
                } else {
                    self.visit(*body, depth + 1)
                };
                let display = self.out.add(node.map_children(|_| body));
                self.memo.insert((id, depth), display);
                display
            }
            Node::FunctionDeclaration { .. } => {
                let mapped = node.map_children(|c| self.visit(c, depth + 1));
                self.out.add(mapped)
            }
            Node::BlockExpression { body } => {
                let statements = body.iter().map(|s| self.visit(*s, depth)).collect();
                let block = self.out.add(Node::Block { body: statements });
                let callee = self.out.add(Node::Arrow {
                    name: None,
                    params: Vec::new(),
                    body: block,
                });
                self.out.call(callee, Vec::new())
            }
            _ => {
                let mapped = node.map_children(|c| self.visit(c, depth));
                self.out.add(mapped)
            }
        }
    }

    fn number(&mut self, n: f64) -> NodeId {
        let magnitude = if n.is_nan() {
            return self.out.identifier("NaN");
        } else if n.is_infinite() {
            self.out.identifier("Infinity")
        } else {
            self.out.number(n.abs())
        };
        if n < 0.0 || (n == 0.0 && n.is_sign_negative()) {
            self.out.unary(UnaryOperator::Minus, magnitude)
        } else {
            magnitude
        }
    }
}

const PREC_ARROW: u8 = 2;
const PREC_CONDITIONAL: u8 = 3;
const PREC_UNARY: u8 = 15;
const PREC_CALL: u8 = 18;
const PREC_PRIMARY: u8 = 20;

fn binary_precedence(operator: BinaryOperator) -> u8 {
    match operator {
        BinaryOperator::StrictEq | BinaryOperator::StrictNe => 9,
        BinaryOperator::Lt | BinaryOperator::Le | BinaryOperator::Gt | BinaryOperator::Ge => 10,
        BinaryOperator::Add | BinaryOperator::Sub => 12,
        BinaryOperator::Mul | BinaryOperator::Div | BinaryOperator::Mod => 13,
    }
}

fn logical_precedence(operator: LogicalOperator) -> u8 {
    match operator {
        LogicalOperator::Or => 4,
        LogicalOperator::And => 5,
    }
}

fn precedence(node: &Node) -> u8 {
    match node {
        Node::Arrow { name: None, .. } => PREC_ARROW,
        Node::Conditional { .. } => PREC_CONDITIONAL,
        Node::Logical { operator, .. } => logical_precedence(*operator),
        Node::Binary { operator, .. } => binary_precedence(*operator),
        Node::Unary { .. } => PREC_UNARY,
        Node::Call { .. } => PREC_CALL,
        Node::Literal(Literal::Number(n)) if *n < 0.0 => PREC_UNARY,
        _ => PREC_PRIMARY,
    }
}

/// Whether `child`, printed in the `token` slot of `parent`, must be parenthesized
pub(crate) fn needs_parens(parent: &Node, token: PathToken, child: &Node) -> bool {
    let p = precedence(child);
    match (parent, token) {
        (Node::Binary { operator, .. }, PathToken::Left) => p < binary_precedence(*operator),
        (Node::Binary { operator, .. }, PathToken::Right) => p <= binary_precedence(*operator),
        (Node::Logical { operator, .. }, PathToken::Left) => p < logical_precedence(*operator),
        (Node::Logical { operator, .. }, PathToken::Right) => p <= logical_precedence(*operator),
        (Node::Unary { operator, .. }, PathToken::Argument) => {
            let nested_minus = *operator == UnaryOperator::Minus
                && match child {
                    Node::Unary { operator, .. } => *operator == UnaryOperator::Minus,
                    Node::Literal(Literal::Number(n)) => *n < 0.0,
                    _ => false,
                };
            p < PREC_UNARY || nested_minus
        }
        (Node::Conditional { .. }, PathToken::Test) => p <= PREC_CONDITIONAL,
        (Node::Call { .. }, PathToken::Callee) => {
            p < PREC_CALL || matches!(child, Node::Function { name: None, .. })
        }
        _ => false,
    }
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
}

impl Printer<'_> {
    fn top_level(&mut self, id: NodeId) {
        match self.ast.get(id) {
            Node::Program { body } => {
                for (i, statement) in body.iter().enumerate() {
                    if i > 0 {
                        self.out.push('\n');
                    }
                    self.statement(*statement, 0);
                }
            }
            Node::Block { .. }
            | Node::ExpressionStatement { .. }
            | Node::VariableDeclaration { .. }
            | Node::FunctionDeclaration { .. }
            | Node::If { .. }
            | Node::Return { .. }
            | Node::Debugger => self.statement(id, 0),
            _ => self.expression(id, 0),
        }
    }

    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str("  ");
        }
    }

    fn block(&mut self, id: NodeId, level: usize) {
        let statements = self.ast.get(id).statements().unwrap_or_default();
        if statements.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push_str("{\n");
        for statement in statements {
            self.indent(level + 1);
            self.statement(*statement, level + 1);
            self.out.push('\n');
        }
        self.indent(level);
        self.out.push('}');
    }

    fn statement(&mut self, id: NodeId, level: usize) {
        match self.ast.get(id) {
            Node::ExpressionStatement { expression } => {
                if matches!(self.ast.get(*expression), Node::Function { .. }) {
                    self.out.push('(');
                    self.expression(*expression, level);
                    self.out.push(')');
                } else {
                    self.expression(*expression, level);
                }
                self.out.push(';');
            }
            Node::VariableDeclaration { kind, name, init } => {
                self.out.push_str(kind.keyword());
                self.out.push(' ');
                self.out.push_str(name);
                if let Some(init) = init {
                    self.out.push_str(" = ");
                    self.expression(*init, level);
                }
                self.out.push(';');
            }
            Node::FunctionDeclaration { name, params, body } => {
                self.out.push_str("function ");
                self.out.push_str(name);
                self.params_list(params);
                self.out.push(' ');
                self.function_body(*body, level);
            }
            Node::If {
                test,
                consequent,
                alternate,
            } => {
                self.out.push_str("if (");
                self.expression(*test, level);
                self.out.push_str(") ");
                self.block(*consequent, level);
                if let Some(alternate) = alternate {
                    self.out.push_str(" else ");
                    if matches!(self.ast.get(*alternate), Node::If { .. }) {
                        self.statement(*alternate, level);
                    } else {
                        self.block(*alternate, level);
                    }
                }
            }
            Node::Return { argument } => {
                self.out.push_str("return");
                if let Some(argument) = argument {
                    self.out.push(' ');
                    self.expression(*argument, level);
                }
                self.out.push(';');
            }
            Node::Debugger => self.out.push_str("debugger;"),
            Node::Block { .. } | Node::Program { .. } | Node::BlockExpression { .. } => {
                self.block(id, level)
            }
            _ => {
                self.expression(id, level);
                self.out.push(';');
            }
        }
    }

    fn params_list(&mut self, params: &[String]) {
        self.out.push('(');
        self.out.push_str(&params.join(", "));
        self.out.push(')');
    }

    fn function_body(&mut self, body: NodeId, level: usize) {
        match self.ast.get(body) {
            Node::Elided => self.out.push_str("{ ... }"),
            _ => self.block(body, level),
        }
    }

    /// Print the `token` child of `parent`, parenthesized if its slot requires it
    fn operand(&mut self, parent: NodeId, token: PathToken, child: NodeId, level: usize) {
        if needs_parens(self.ast.get(parent), token, self.ast.get(child)) {
            self.out.push('(');
            self.expression(child, level);
            self.out.push(')');
        } else {
            self.expression(child, level);
        }
    }

    fn expression(&mut self, id: NodeId, level: usize) {
        match self.ast.get(id) {
            Node::Literal(literal) => match literal {
                Literal::Number(n) => self.out.push_str(&format_number(*n)),
                Literal::Boolean(b) => self.out.push_str(if *b { "true" } else { "false" }),
                Literal::String(s) => {
                    self.out.push('"');
                    self.out.push_str(&escape_string(s));
                    self.out.push('"');
                }
                Literal::Null => self.out.push_str("null"),
                Literal::Undefined => self.out.push_str("undefined"),
            },
            Node::Identifier(name) => self.out.push_str(name),
            Node::Unary { operator, argument } => {
                self.out.push_str(operator.symbol());
                self.operand(id, PathToken::Argument, *argument, level);
            }
            Node::Binary {
                operator,
                left,
                right,
            } => {
                let symbol = operator.symbol();
                self.operand(id, PathToken::Left, *left, level);
                self.out.push(' ');
                self.out.push_str(symbol);
                self.out.push(' ');
                self.operand(id, PathToken::Right, *right, level);
            }
            Node::Logical {
                operator,
                left,
                right,
            } => {
                let symbol = operator.symbol();
                self.operand(id, PathToken::Left, *left, level);
                self.out.push(' ');
                self.out.push_str(symbol);
                self.out.push(' ');
                self.operand(id, PathToken::Right, *right, level);
            }
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => {
                self.operand(id, PathToken::Test, *test, level);
                self.out.push_str(" ? ");
                self.expression(*consequent, level);
                self.out.push_str(" : ");
                self.expression(*alternate, level);
            }
            Node::Call { callee, arguments } => {
                self.operand(id, PathToken::Callee, *callee, level);
                self.out.push('(');
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expression(*argument, level);
                }
                self.out.push(')');
            }
            Node::Array { elements } => {
                self.out.push('[');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expression(*element, level);
                }
                self.out.push(']');
            }
            Node::Function { name, params, body } => {
                self.out.push_str("function ");
                if let Some(name) = name {
                    self.out.push_str(name);
                }
                self.params_list(params);
                self.out.push(' ');
                self.function_body(*body, level);
            }
            Node::Arrow { params, body, .. } => {
                match params.as_slice() {
                    [single] => self.out.push_str(single),
                    _ => self.params_list(params),
                }
                self.out.push_str(" => ");
                match self.ast.get(*body) {
                    Node::Block { .. } => self.block(*body, level),
                    _ => self.expression(*body, level),
                }
            }
            Node::RedexMarker { parenthesized } => {
                self.out
                    .push_str(if *parenthesized { "(@redex)" } else { "@redex" });
            }
            Node::Elided => self.out.push_str("..."),
            // statement kinds only reach here through malformed trees
            _ => self.statement(id, level),
        }
    }
}

#[cfg(all(test, feature = "source"))]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::source::{parse_expression, parse_program};

    #[test]
    fn test_expression_printing() {
        let test_cases = vec![
            ("1 + 2 * 3", "1 + 2 * 3"),
            ("(1 + 2) * 3", "(1 + 2) * 3"),
            ("1 - (2 - 3)", "1 - (2 - 3)"),
            ("(1 - 2) - 3", "1 - 2 - 3"),
            ("-(-5)", "-(-5)"),
            ("!(a && b)", "!(a && b)"),
            ("a || b && c", "a || b && c"),
            ("(a || b) && c", "(a || b) && c"),
            ("(a ? b : c) ? d : e", "(a ? b : c) ? d : e"),
            ("a ? b : c ? d : e", "a ? b : c ? d : e"),
            ("(x => x)(1)", "(x => x)(1)"),
            ("(a, b) => a", "(a, b) => a"),
            ("() => f(1)(2)", "() => f(1)(2)"),
            ("[1, \"two\", null, [true]]", "[1, \"two\", null, [true]]"),
            ("\"a\\\"b\"", "\"a\\\"b\""),
            ("x => { return x; }", "x => {\n  return x;\n}"),
            ("function (a) { }", "function (a) {}"),
        ];

        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let mut ast = Ast::new();
            let id = parse_expression(&mut ast, input).unwrap();
            assert_eq!(to_source(&ast, id), expected, "#{}: {input}", i + 1);
        }
    }

    #[test]
    fn test_statement_printing() {
        let test_cases = vec![
            ("1;", "1;"),
            ("const x = 1;\nx;", "const x = 1;\nx;"),
            (
                "function f(n) { return n; }",
                "function f(n) {\n  return n;\n}",
            ),
            (
                "if (a) { 1; } else if (b) { 2; } else { }",
                "if (a) {\n  1;\n} else if (b) {\n  2;\n} else {}",
            ),
            ("(function () { return 1; });", "(function () {\n  return 1;\n});"),
            ("debugger;", "debugger;"),
        ];

        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let (ast, program) = parse_program(input).unwrap();
            assert_eq!(to_source(&ast, program), expected, "#{}: {input}", i + 1);
        }
    }

    #[test]
    fn test_internal_forms() {
        let mut ast = Ast::new();

        let negative = ast.number(-29.0);
        let nan = ast.number(f64::NAN);
        let minus_infinity = ast.number(f64::NEG_INFINITY);
        let undefined = ast.undefined();
        let three = ast.number(3.0);
        let difference = ast.binary(BinaryOperator::Sub, three, negative);
        let negated = ast.unary(UnaryOperator::Minus, negative);

        let body = ast.binary(BinaryOperator::Mul, three, three);
        let named = ast.add(Node::Function {
            name: Some("square".into()),
            params: vec!["n".into()],
            body,
        });
        let call = ast.call(named, vec![three]);

        let statement = ast.expression_statement(three);
        let block = ast.add(Node::BlockExpression {
            body: vec![statement],
        });

        let test_cases = vec![
            (negative, "-29"),
            (nan, "NaN"),
            (minus_infinity, "-Infinity"),
            (undefined, "undefined"),
            (difference, "3 - -29"),
            (negated, "-(-29)"),
            (call, "square(3)"),
            (block, "(() => {\n  3;\n})()"),
        ];

        for (i, (id, expected)) in test_cases.into_iter().enumerate() {
            assert_eq!(to_source(&ast, id), expected, "#{}", i + 1);
        }
    }

    #[test]
    fn test_unfolding_is_bounded() {
        let mut ast = Ast::new();
        let mut current = ast.identifier("x");
        for _ in 0..8 {
            current = ast.arrow(&["x"], current);
        }

        let printed = to_source(&ast, current);
        assert_eq!(printed, "x => x => x => x => x => x => ...");
    }

    #[test]
    fn test_shared_function_values_are_memoized() {
        let mut ast = Ast::new();
        let x = ast.identifier("x");
        let identity = ast.arrow(&["x"], x);
        let pair = ast.add(Node::Array {
            elements: vec![identity, identity],
        });

        let treeified = treeify(&ast, pair);
        let Node::Array { elements } = treeified.ast.get(treeified.root) else {
            panic!("expected array");
        };
        assert_eq!(elements[0], elements[1]);
        assert_eq!(to_source(&ast, pair), "[x => x, x => x]");
    }

    #[test]
    fn test_memo_respects_depth() {
        let mut ast = Ast::new();
        let x = ast.identifier("x");
        let identity = ast.arrow(&["x"], x);
        let mut deep = identity;
        for _ in 0..MAX_FUNCTION_UNFOLD_DEPTH {
            deep = ast.arrow(&["y"], deep);
        }
        let pair = ast.add(Node::Array {
            elements: vec![deep, identity],
        });

        assert_eq!(
            to_source(&ast, pair),
            "[y => y => y => y => y => x => ..., x => x]"
        );
    }
}
