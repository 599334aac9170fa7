//! Source text front end.
//!
//! Parses the taught language subset into the arena AST:
//!
//! ```text
//! const square = x => x * x;
//! function fact(n) { return n === 0 ? 1 : n * fact(n - 1); }
//! if (fact(3) > 5) { square(2); } else { "small"; }
//! ```
//!
//! Statements: `const`/`let` declarations with a single binding, function
//! declarations, `return`, `if`/`else`, blocks, `debugger` and expression statements.
//! A missing `;` is accepted before `}` and at the end of input.
//!
//! Expressions, loosest first: arrow functions, `?:`, `||`, `&&`, `=== !==`,
//! `< <= > >=`, `+ -`, `* / %`, prefix `! -`, calls, then literals, identifiers,
//! arrays, function expressions and parenthesized expressions.

use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{opt, recognize},
    error::ErrorKind,
    multi::separated_list0,
};

use crate::Error;
use crate::MAX_PARSE_DEPTH;
use crate::ast::{
    Ast, BinaryOperator, DeclarationKind, Literal, LogicalOperator, Node, NodeId, UnaryOperator,
};

const KEYWORDS: &[&str] = &[
    "const", "let", "function", "return", "if", "else", "true", "false", "null", "debugger",
];

/// Binary operator levels, loosest first. Longer operators precede their prefixes.
const BINARY_LEVELS: &[&[&str]] = &[
    &["||"],
    &["&&"],
    &["===", "!=="],
    &["<=", ">=", "<", ">"],
    &["+", "-"],
    &["*", "/", "%"],
];

fn fail<T>(input: &str, kind: ErrorKind) -> IResult<&str, T> {
    Err(nom::Err::Error(nom::error::Error::new(input, kind)))
}

/// Convert nom parsing errors to user-friendly messages
fn parse_error_to_message(input: &str, error: nom::Err<nom::error::Error<&str>>) -> String {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::TooLarge => {
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})")
                }
                ErrorKind::Char => format!("Unterminated string at position {position}"),
                _ => {
                    if position < input.len() {
                        let remaining_chars: String =
                            input.chars().skip(position).take(10).collect();
                        format!("Invalid syntax near '{remaining_chars}' at position {position}")
                    } else {
                        "Unexpected end of input".into()
                    }
                }
            }
        }
        nom::Err::Incomplete(_) => "Incomplete input".into(),
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Skip whitespace and comments
fn ws(input: &str) -> IResult<&str, ()> {
    let mut input = input;
    loop {
        let (rest, _) = multispace0.parse(input)?;
        if let Some(after) = rest.strip_prefix("//") {
            input = after.find('\n').map_or("", |i| &after[i..]);
        } else if rest.starts_with("/*") {
            let (after, _) = (tag("/*"), take_until("*/"), tag("*/")).parse(rest)?;
            input = after;
        } else {
            return Ok((rest, ()));
        }
    }
}

/// Punctuation or operator, after optional whitespace
fn symbol<'a>(input: &'a str, s: &'static str) -> IResult<&'a str, &'a str> {
    let (input, _) = ws(input)?;
    tag(s).parse(input)
}

/// A reserved word that is not the prefix of a longer identifier
fn keyword<'a>(input: &'a str, word: &'static str) -> IResult<&'a str, ()> {
    let (input, _) = ws(input)?;
    let (rest, _) = tag(word).parse(input)?;
    if rest.starts_with(is_ident_char) {
        fail(input, ErrorKind::Tag)
    } else {
        Ok((rest, ()))
    }
}

fn identifier(input: &str) -> IResult<&str, String> {
    let (input, _) = ws(input)?;
    let (rest, name) = recognize((satisfy(is_ident_start), take_while(is_ident_char))).parse(input)?;
    if KEYWORDS.contains(&name) {
        fail(input, ErrorKind::Alpha)
    } else {
        Ok((rest, name.to_string()))
    }
}

/// Decimal number with optional fraction and exponent
fn number(input: &str) -> IResult<&str, f64> {
    let (rest, text) = recognize((
        digit1,
        opt((char('.'), digit0)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)?;
    match text.parse::<f64>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => fail(input, ErrorKind::Float),
    }
}

/// Parse a string literal in single or double quotes
fn string_literal(input: &str) -> IResult<&str, String> {
    let (mut remaining, quote) = one_of("\"'").parse(input)?;
    let mut chars = String::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some(c) if c == quote => return Ok((char_iter.as_str(), chars)),
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    Some('\'') => chars.push('\''),
                    _ => return fail(remaining, ErrorKind::Char),
                }
                remaining = char_iter.as_str();
            }
            Some('\n') | None => return fail(remaining, ErrorKind::Char),
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
        }
    }
}

fn parameters(input: &str) -> IResult<&str, Vec<String>> {
    let (input, _) = symbol(input, "(")?;
    let (input, params) = separated_list0(|i| symbol(i, ","), identifier).parse(input)?;
    let (input, _) = symbol(input, ")")?;
    Ok((input, params))
}

/// Lookahead for an arrow function head: `x =>` or `(a, b) =>`
fn arrow_head(input: &str) -> IResult<&str, Vec<String>> {
    let (input, params) = match identifier(input) {
        Ok((rest, name)) => (rest, vec![name]),
        Err(_) => parameters(input)?,
    };
    let (input, _) = symbol(input, "=>")?;
    Ok((input, params))
}

/// Statement terminator: `;`, or nothing before `}` and at the end of input
fn terminator(input: &str) -> IResult<&str, ()> {
    if let Ok((rest, _)) = symbol(input, ";") {
        return Ok((rest, ()));
    }
    let (rest, _) = ws(input)?;
    if rest.is_empty() || rest.starts_with('}') {
        Ok((rest, ()))
    } else {
        fail(rest, ErrorKind::Tag)
    }
}

/// Recursive-descent parser writing nodes into an arena
struct SourceParser<'s> {
    ast: &'s mut Ast,
}

impl SourceParser<'_> {
    fn statement<'a>(&mut self, input: &'a str, depth: usize) -> IResult<&'a str, NodeId> {
        if depth >= MAX_PARSE_DEPTH {
            return fail(input, ErrorKind::TooLarge);
        }
        let (input, _) = ws(input)?;

        if let Ok((rest, _)) = keyword(input, "const") {
            return self.declaration(rest, DeclarationKind::Const, depth);
        }
        if let Ok((rest, _)) = keyword(input, "let") {
            return self.declaration(rest, DeclarationKind::Let, depth);
        }
        if let Ok((rest, _)) = keyword(input, "function")
            && let Ok((rest, name)) = identifier(rest)
        {
            let (rest, params) = parameters(rest)?;
            let (rest, body) = self.block(rest, depth + 1)?;
            let declaration = self.ast.add(Node::FunctionDeclaration { name, params, body });
            return Ok((rest, declaration));
        }
        if let Ok((rest, _)) = keyword(input, "return") {
            let (rest, argument) = match terminator(rest) {
                Ok((rest, ())) => (rest, None),
                Err(_) => {
                    let (rest, argument) = self.expression(rest, depth + 1)?;
                    let (rest, ()) = terminator(rest)?;
                    (rest, Some(argument))
                }
            };
            return Ok((rest, self.ast.add(Node::Return { argument })));
        }
        if let Ok((rest, _)) = keyword(input, "if") {
            return self.if_statement(rest, depth);
        }
        if let Ok((rest, _)) = keyword(input, "debugger") {
            let (rest, ()) = terminator(rest)?;
            return Ok((rest, self.ast.add(Node::Debugger)));
        }
        if input.starts_with('{') {
            return self.block(input, depth + 1);
        }

        let (rest, expression) = self.expression(input, depth + 1)?;
        let (rest, ()) = terminator(rest)?;
        Ok((rest, self.ast.expression_statement(expression)))
    }

    fn declaration<'a>(
        &mut self,
        input: &'a str,
        kind: DeclarationKind,
        depth: usize,
    ) -> IResult<&'a str, NodeId> {
        let (input, name) = identifier(input)?;
        let (input, init) = match symbol(input, "=") {
            Ok((rest, _)) => {
                let (rest, init) = self.expression(rest, depth + 1)?;
                (rest, Some(init))
            }
            Err(_) => (input, None),
        };
        let (input, ()) = terminator(input)?;
        Ok((input, self.ast.add(Node::VariableDeclaration { kind, name, init })))
    }

    fn if_statement<'a>(&mut self, input: &'a str, depth: usize) -> IResult<&'a str, NodeId> {
        let (input, _) = symbol(input, "(")?;
        let (input, test) = self.expression(input, depth + 1)?;
        let (input, _) = symbol(input, ")")?;
        let (input, consequent) = self.block(input, depth + 1)?;
        let (input, alternate) = match keyword(input, "else") {
            Ok((rest, ())) => match keyword(rest, "if") {
                Ok((rest, ())) => {
                    let (rest, nested) = self.if_statement(rest, depth + 1)?;
                    (rest, Some(nested))
                }
                Err(_) => {
                    let (rest, block) = self.block(rest, depth + 1)?;
                    (rest, Some(block))
                }
            },
            Err(_) => (input, None),
        };
        let node = self.ast.add(Node::If {
            test,
            consequent,
            alternate,
        });
        Ok((input, node))
    }

    fn block<'a>(&mut self, input: &'a str, depth: usize) -> IResult<&'a str, NodeId> {
        let (mut input, _) = symbol(input, "{")?;
        let mut body = Vec::new();
        loop {
            if let Ok((rest, _)) = symbol(input, "}") {
                return Ok((rest, self.ast.add(Node::Block { body })));
            }
            let (rest, statement) = self.statement(input, depth + 1)?;
            body.push(statement);
            input = rest;
        }
    }

    fn expression<'a>(&mut self, input: &'a str, depth: usize) -> IResult<&'a str, NodeId> {
        if depth >= MAX_PARSE_DEPTH {
            return fail(input, ErrorKind::TooLarge);
        }
        if let Ok((rest, params)) = arrow_head(input) {
            let (rest, _) = ws(rest)?;
            let (rest, body) = if rest.starts_with('{') {
                self.block(rest, depth + 1)?
            } else {
                self.expression(rest, depth + 1)?
            };
            let arrow = self.ast.add(Node::Arrow {
                name: None,
                params,
                body,
            });
            return Ok((rest, arrow));
        }

        let (input, test) = self.binary(input, 0, depth)?;
        let Ok((rest, _)) = symbol(input, "?") else {
            return Ok((input, test));
        };
        let (rest, consequent) = self.expression(rest, depth + 1)?;
        let (rest, _) = symbol(rest, ":")?;
        let (rest, alternate) = self.expression(rest, depth + 1)?;
        let conditional = self.ast.add(Node::Conditional {
            test,
            consequent,
            alternate,
        });
        Ok((rest, conditional))
    }

    /// Left-associative binary operators from `BINARY_LEVELS[level]` inwards
    fn binary<'a>(&mut self, input: &'a str, level: usize, depth: usize) -> IResult<&'a str, NodeId> {
        let Some(operators) = BINARY_LEVELS.get(level) else {
            return self.unary(input, depth);
        };
        let (mut input, mut left) = self.binary(input, level + 1, depth)?;
        loop {
            let Some((rest, op)) = operators
                .iter()
                .find_map(|op| symbol(input, op).ok().map(|(rest, _)| (rest, *op)))
            else {
                return Ok((input, left));
            };
            let (rest, right) = self.binary(rest, level + 1, depth)?;
            left = match op {
                "||" => self.logical(LogicalOperator::Or, left, right),
                "&&" => self.logical(LogicalOperator::And, left, right),
                other => match BinaryOperator::from_symbol(other) {
                    Some(operator) => self.ast.binary(operator, left, right),
                    None => return fail(input, ErrorKind::Tag),
                },
            };
            input = rest;
        }
    }

    fn logical(&mut self, operator: LogicalOperator, left: NodeId, right: NodeId) -> NodeId {
        self.ast.add(Node::Logical {
            operator,
            left,
            right,
        })
    }

    fn unary<'a>(&mut self, input: &'a str, depth: usize) -> IResult<&'a str, NodeId> {
        if depth >= MAX_PARSE_DEPTH {
            return fail(input, ErrorKind::TooLarge);
        }
        for (text, operator) in [("!", UnaryOperator::Not), ("-", UnaryOperator::Minus)] {
            if let Ok((rest, _)) = symbol(input, text) {
                let (rest, argument) = self.unary(rest, depth + 1)?;
                return Ok((rest, self.ast.unary(operator, argument)));
            }
        }
        self.call(input, depth)
    }

    fn call<'a>(&mut self, input: &'a str, depth: usize) -> IResult<&'a str, NodeId> {
        let (mut input, mut callee) = self.primary(input, depth)?;
        while let Ok((rest, _)) = symbol(input, "(") {
            let (rest, arguments) = self.list(rest, ")", depth + 1)?;
            callee = self.ast.call(callee, arguments);
            input = rest;
        }
        Ok((input, callee))
    }

    /// Comma-separated expressions up to `close`
    fn list<'a>(
        &mut self,
        input: &'a str,
        close: &'static str,
        depth: usize,
    ) -> IResult<&'a str, Vec<NodeId>> {
        let mut items = Vec::new();
        if let Ok((rest, _)) = symbol(input, close) {
            return Ok((rest, items));
        }
        let mut input = input;
        loop {
            let (rest, item) = self.expression(input, depth)?;
            items.push(item);
            if let Ok((rest, _)) = symbol(rest, ",") {
                input = rest;
                continue;
            }
            let (rest, _) = symbol(rest, close)?;
            return Ok((rest, items));
        }
    }

    fn primary<'a>(&mut self, input: &'a str, depth: usize) -> IResult<&'a str, NodeId> {
        let (input, _) = ws(input)?;

        if let Ok((rest, n)) = number(input) {
            return Ok((rest, self.ast.number(n)));
        }
        if input.starts_with(['"', '\'']) {
            let (rest, s) = string_literal(input)?;
            return Ok((rest, self.ast.string(s)));
        }
        for (word, value) in [("true", true), ("false", false)] {
            if let Ok((rest, ())) = keyword(input, word) {
                return Ok((rest, self.ast.boolean(value)));
            }
        }
        if let Ok((rest, ())) = keyword(input, "null") {
            return Ok((rest, self.ast.literal(Literal::Null)));
        }
        if let Ok((rest, ())) = keyword(input, "function") {
            let (rest, name) = match identifier(rest) {
                Ok((rest, name)) => (rest, Some(name)),
                Err(_) => (rest, None),
            };
            let (rest, params) = parameters(rest)?;
            let (rest, body) = self.block(rest, depth + 1)?;
            return Ok((rest, self.ast.add(Node::Function { name, params, body })));
        }
        if let Ok((rest, _)) = symbol(input, "(") {
            let (rest, inner) = self.expression(rest, depth + 1)?;
            let (rest, _) = symbol(rest, ")")?;
            return Ok((rest, inner));
        }
        if let Ok((rest, _)) = symbol(input, "[") {
            let (rest, elements) = self.list(rest, "]", depth + 1)?;
            return Ok((rest, self.ast.add(Node::Array { elements })));
        }
        let (rest, name) = identifier(input)?;
        Ok((rest, self.ast.identifier(name)))
    }
}

/// Parse a complete program into a fresh arena
pub fn parse_program(source: &str) -> Result<(Ast, NodeId), Error> {
    let mut ast = Ast::new();
    let program = parse_program_into(&mut ast, source)?;
    Ok((ast, program))
}

/// Parse a complete program into an existing arena
pub fn parse_program_into(ast: &mut Ast, source: &str) -> Result<NodeId, Error> {
    let mut parser = SourceParser { ast };
    let mut body = Vec::new();
    let mut input = source;
    loop {
        let (rest, ()) =
            ws(input).map_err(|e| Error::ParseError(parse_error_to_message(source, e)))?;
        if rest.is_empty() {
            break;
        }
        let (rest, statement) = parser
            .statement(rest, 0)
            .map_err(|e| Error::ParseError(parse_error_to_message(source, e)))?;
        body.push(statement);
        input = rest;
    }
    Ok(parser.ast.program(body))
}

/// Parse a single expression
pub fn parse_expression(ast: &mut Ast, source: &str) -> Result<NodeId, Error> {
    let mut parser = SourceParser { ast };
    let parsed = parser.expression(source, 0).and_then(|(rest, id)| {
        let (rest, ()) = ws(rest)?;
        Ok((rest, id))
    });
    match parsed {
        Ok(("", id)) => Ok(id),
        Ok((remaining, _)) => Err(Error::ParseError(format!(
            "Unexpected remaining input: '{remaining}'"
        ))),
        Err(e) => Err(Error::ParseError(parse_error_to_message(source, e))),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::Error;
    use crate::treeify::to_source;

    /// Test result variants for parsing tests
    #[derive(Debug)]
    enum ParseTestResult {
        /// Parses and prints back as this text
        Prints(&'static str),
        SpecificError(&'static str),
        Error,
    }
    use ParseTestResult::*;

    fn run_program_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let test_id = format!("#{}", i + 1);
            match (parse_program(input), expected) {
                (Ok((ast, program)), Prints(text)) => {
                    let printed = to_source(&ast, program);
                    assert_eq!(printed, text, "{test_id}: printed form of {input:?}");

                    // printing is a fixed point of parse-then-print
                    let (reparsed_ast, reparsed) = parse_program(&printed).unwrap();
                    assert_eq!(to_source(&reparsed_ast, reparsed), printed, "{test_id}");
                }
                (Err(Error::ParseError(msg)), SpecificError(fragment)) => {
                    assert!(msg.contains(fragment), "{test_id}: {msg:?} lacks {fragment:?}");
                }
                (Err(_), Error) => {}
                (result, expected) => {
                    panic!("{test_id}: {input:?} gave {result:?}, expected {expected:?}")
                }
            }
        }
    }

    #[test]
    fn test_statements() {
        run_program_tests(vec![
            ("1;", Prints("1;")),
            ("  1 ;  2  ", Prints("1;\n2;")),
            ("const x = 1;", Prints("const x = 1;")),
            ("let y = 2;", Prints("let y = 2;")),
            ("const z;", Prints("const z;")),
            (
                "function f(a, b) { return a + b; }",
                Prints("function f(a, b) {\n  return a + b;\n}"),
            ),
            ("function f() { return; }", Prints("function f() {\n  return;\n}")),
            (
                "if (x) { 1; } else if (y) { 2; }",
                Prints("if (x) {\n  1;\n} else if (y) {\n  2;\n}"),
            ),
            ("{ 1; { 2; } }", Prints("{\n  1;\n  {\n    2;\n  }\n}")),
            ("debugger; 1;", Prints("debugger;\n1;")),
            ("// comment\n1; /* block\ncomment */ 2;", Prints("1;\n2;")),
            (
                "function f(n){return n;} f(5+1*6-40);",
                Prints("function f(n) {\n  return n;\n}\nf(5 + 1 * 6 - 40);"),
            ),
            ("const", Error),
            ("1 +;", Error),
            ("{ 1;", Error),
            ("\"open", SpecificError("Unterminated string")),
            ("const if = 1;", Error),
            ("1 2;", Error),
        ]);
    }

    #[test]
    fn test_expressions() {
        let test_cases = vec![
            ("1.5e3", "1500"),
            ("'single' + \"double\"", "\"single\" + \"double\""),
            ("-x", "-x"),
            ("!!!true", "!!!true"),
            ("a < b === c >= d", "a < b === c >= d"),
            ("a || b && c", "a || b && c"),
            ("x => y => x + y", "x => y => x + y"),
            ("(a, b) => a", "(a, b) => a"),
            ("() => { return 1; }", "() => {\n  return 1;\n}"),
            ("f(1)(2, 3)", "f(1)(2, 3)"),
            ("[1, [2, 3], []]", "[1, [2, 3], []]"),
            ("a ? b ? 1 : 2 : 3", "a ? b ? 1 : 2 : 3"),
            ("(x) + 1", "x + 1"),
            ("function fact(n) { return n; }", "fact"),
            ("null", "null"),
        ];

        for (i, (input, expected)) in test_cases.into_iter().enumerate() {
            let mut ast = Ast::new();
            let id = parse_expression(&mut ast, input).unwrap();
            assert_eq!(to_source(&ast, id), expected, "#{}: {input}", i + 1);
        }
    }

    #[test]
    fn test_literal_nodes() {
        let mut ast = Ast::new();
        let id = parse_expression(&mut ast, "-5").unwrap();
        assert_eq!(ast.number_value(id), Some(-5.0));
        assert!(matches!(ast.get(id), Node::Unary { .. }));

        let id = parse_expression(&mut ast, "\"a\\nb\"").unwrap();
        assert_eq!(ast.get(id), &Node::Literal(Literal::String("a\nb".into())));

        let id = parse_expression(&mut ast, "undefined").unwrap();
        assert_eq!(ast.get(id), &Node::Identifier("undefined".into()));

        assert!(parse_expression(&mut ast, "1 2").is_err());
    }

    #[test]
    fn test_depth_limit() {
        let depth = MAX_PARSE_DEPTH + 5;
        let nested = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        let mut ast = Ast::new();
        match parse_expression(&mut ast, &nested) {
            Err(Error::ParseError(msg)) => assert!(msg.contains("too deeply nested")),
            other => panic!("expected depth error, got {other:?}"),
        }

        let shallow = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        assert!(parse_expression(&mut ast, &shallow).is_ok());
    }
}
