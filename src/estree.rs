use serde_json::{Map, Value, json};

use crate::Error;
use crate::MAX_PARSE_DEPTH;
use crate::ast::{
    Ast, BinaryOperator, DeclarationKind, Literal, LogicalOperator, Node, NodeId, UnaryOperator,
};
use crate::host::format_number;
use crate::treeify::treeify;

/// Parse ESTree JSON (as emitted by JavaScript parsers) into a fresh arena
pub fn parse_estree(input: &str) -> Result<(Ast, NodeId), Error> {
    let json: Value = serde_json::from_str(input)
        .map_err(|e| Error::ParseError(format!("Invalid JSON: {e}")))?;
    let mut ast = Ast::new();
    let root = from_estree(&mut ast, &json)?;
    Ok((ast, root))
}

/// Import one ESTree node, and everything below it, into `ast`
pub fn from_estree(ast: &mut Ast, json: &Value) -> Result<NodeId, Error> {
    Importer { ast }.node(json, 0)
}

fn unsupported(what: impl std::fmt::Display) -> Error {
    Error::ParseError(format!("Unsupported ESTree construct: {what}"))
}

fn field<'j>(json: &'j Value, key: &str) -> Result<&'j Value, Error> {
    json.get(key)
        .ok_or_else(|| Error::ParseError(format!("ESTree node is missing field '{key}'")))
}

fn str_field<'j>(json: &'j Value, key: &str) -> Result<&'j str, Error> {
    field(json, key)?
        .as_str()
        .ok_or_else(|| Error::ParseError(format!("ESTree field '{key}' must be a string")))
}

fn array_field<'j>(json: &'j Value, key: &str) -> Result<&'j [Value], Error> {
    field(json, key)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| Error::ParseError(format!("ESTree field '{key}' must be an array")))
}

/// A field that may be absent or `null`
fn optional<'j>(json: &'j Value, key: &str) -> Option<&'j Value> {
    json.get(key).filter(|v| !v.is_null())
}

fn identifier_name(json: &Value) -> Result<String, Error> {
    match str_field(json, "type")? {
        "Identifier" => Ok(str_field(json, "name")?.to_string()),
        other => Err(unsupported(format!("{other} in binding position"))),
    }
}

fn parameter_names(json: &Value) -> Result<Vec<String>, Error> {
    array_field(json, "params")?
        .iter()
        .map(identifier_name)
        .collect()
}

struct Importer<'a> {
    ast: &'a mut Ast,
}

impl Importer<'_> {
    fn nodes(&mut self, list: &[Value], depth: usize) -> Result<Vec<NodeId>, Error> {
        list.iter().map(|item| self.node(item, depth + 1)).collect()
    }

    fn block(&mut self, json: &Value, depth: usize) -> Result<NodeId, Error> {
        match str_field(json, "type")? {
            "BlockStatement" => self.node(json, depth + 1),
            other => Err(unsupported(format!("{other} where a block is required"))),
        }
    }

    fn node(&mut self, json: &Value, depth: usize) -> Result<NodeId, Error> {
        if depth >= MAX_PARSE_DEPTH {
            return Err(Error::ParseError(format!(
                "ESTree input too deeply nested (max depth: {MAX_PARSE_DEPTH})"
            )));
        }

        let node = match str_field(json, "type")? {
            "Program" => Node::Program {
                body: self.nodes(array_field(json, "body")?, depth)?,
            },
            "BlockStatement" => Node::Block {
                body: self.nodes(array_field(json, "body")?, depth)?,
            },
            "ExpressionStatement" => Node::ExpressionStatement {
                expression: self.node(field(json, "expression")?, depth + 1)?,
            },
            "VariableDeclaration" => {
                let kind = match str_field(json, "kind")? {
                    "const" => DeclarationKind::Const,
                    "let" => DeclarationKind::Let,
                    other => return Err(unsupported(format!("{other} declaration"))),
                };
                let [declarator] = array_field(json, "declarations")? else {
                    return Err(unsupported("declaration with several declarators"));
                };
                let init = match optional(declarator, "init") {
                    Some(init) => Some(self.node(init, depth + 1)?),
                    None => None,
                };
                Node::VariableDeclaration {
                    kind,
                    name: identifier_name(field(declarator, "id")?)?,
                    init,
                }
            }
            "FunctionDeclaration" => Node::FunctionDeclaration {
                name: identifier_name(field(json, "id")?)?,
                params: parameter_names(json)?,
                body: self.block(field(json, "body")?, depth)?,
            },
            "FunctionExpression" => Node::Function {
                name: optional(json, "id").map(identifier_name).transpose()?,
                params: parameter_names(json)?,
                body: self.block(field(json, "body")?, depth)?,
            },
            "ArrowFunctionExpression" => Node::Arrow {
                name: None,
                params: parameter_names(json)?,
                body: self.node(field(json, "body")?, depth + 1)?,
            },
            "ReturnStatement" => Node::Return {
                argument: match optional(json, "argument") {
                    Some(argument) => Some(self.node(argument, depth + 1)?),
                    None => None,
                },
            },
            "IfStatement" => {
                let alternate = match optional(json, "alternate") {
                    Some(alternate) if alternate.get("type") == Some(&json!("IfStatement")) => {
                        Some(self.node(alternate, depth + 1)?)
                    }
                    Some(alternate) => Some(self.block(alternate, depth)?),
                    None => None,
                };
                Node::If {
                    test: self.node(field(json, "test")?, depth + 1)?,
                    consequent: self.block(field(json, "consequent")?, depth)?,
                    alternate,
                }
            }
            "DebuggerStatement" => Node::Debugger,
            "Literal" => Node::Literal(match field(json, "value")? {
                Value::Null => Literal::Null,
                Value::Bool(b) => Literal::Boolean(*b),
                Value::String(s) => Literal::String(s.clone()),
                Value::Number(n) => match n.as_f64() {
                    Some(n) => Literal::Number(n),
                    None => return Err(unsupported(format!("number literal {n}"))),
                },
                other => return Err(unsupported(format!("literal value {other}"))),
            }),
            "Identifier" => Node::Identifier(str_field(json, "name")?.to_string()),
            "UnaryExpression" => {
                let operator = match str_field(json, "operator")? {
                    "!" => UnaryOperator::Not,
                    "-" => UnaryOperator::Minus,
                    other => return Err(unsupported(format!("unary operator {other}"))),
                };
                Node::Unary {
                    operator,
                    argument: self.node(field(json, "argument")?, depth + 1)?,
                }
            }
            "BinaryExpression" => {
                let symbol = str_field(json, "operator")?;
                let operator = BinaryOperator::from_symbol(symbol)
                    .ok_or_else(|| unsupported(format!("binary operator {symbol}")))?;
                Node::Binary {
                    operator,
                    left: self.node(field(json, "left")?, depth + 1)?,
                    right: self.node(field(json, "right")?, depth + 1)?,
                }
            }
            "LogicalExpression" => {
                let operator = match str_field(json, "operator")? {
                    "&&" => LogicalOperator::And,
                    "||" => LogicalOperator::Or,
                    other => return Err(unsupported(format!("logical operator {other}"))),
                };
                Node::Logical {
                    operator,
                    left: self.node(field(json, "left")?, depth + 1)?,
                    right: self.node(field(json, "right")?, depth + 1)?,
                }
            }
            "ConditionalExpression" => Node::Conditional {
                test: self.node(field(json, "test")?, depth + 1)?,
                consequent: self.node(field(json, "consequent")?, depth + 1)?,
                alternate: self.node(field(json, "alternate")?, depth + 1)?,
            },
            "CallExpression" => Node::Call {
                callee: self.node(field(json, "callee")?, depth + 1)?,
                arguments: self.nodes(array_field(json, "arguments")?, depth)?,
            },
            "ArrayExpression" => Node::Array {
                elements: self.nodes(array_field(json, "elements")?, depth)?,
            },
            other => return Err(unsupported(format!("node type {other}"))),
        };
        Ok(self.ast.add(node))
    }
}

/// Export the tree rooted at `root` as ESTree JSON.
///
/// The tree is treeified first, so the output only contains standard node types.
/// Elided function bodies and redex markers become identifiers named `...` and
/// `@redex`.
pub fn to_estree(ast: &Ast, root: NodeId) -> Value {
    let treeified = treeify(ast, root);
    export(&treeified.ast, treeified.root)
}

fn typed(kind: &str, fields: Value) -> Value {
    let mut object = Map::new();
    object.insert("type".into(), Value::String(kind.into()));
    if let Value::Object(fields) = fields {
        object.extend(fields);
    }
    Value::Object(object)
}

fn identifier(name: &str) -> Value {
    typed("Identifier", json!({ "name": name }))
}

fn number(n: f64) -> Value {
    // integral values export as JSON integers
    let value = if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        json!(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    };
    typed("Literal", json!({ "value": value, "raw": format_number(n) }))
}

fn export_all(ast: &Ast, ids: &[NodeId]) -> Value {
    Value::Array(ids.iter().map(|id| export(ast, *id)).collect())
}

fn export_params(params: &[String]) -> Value {
    Value::Array(params.iter().map(|p| identifier(p)).collect())
}

fn export(ast: &Ast, id: NodeId) -> Value {
    match ast.get(id) {
        Node::Literal(literal) => match literal {
            Literal::Number(n) => number(*n),
            Literal::Boolean(b) => typed("Literal", json!({ "value": b, "raw": b.to_string() })),
            Literal::String(s) => typed(
                "Literal",
                json!({ "value": s, "raw": format!("\"{}\"", crate::host::escape_string(s)) }),
            ),
            Literal::Null => typed("Literal", json!({ "value": null, "raw": "null" })),
            Literal::Undefined => identifier("undefined"),
        },
        Node::Identifier(name) => identifier(name),
        Node::Unary { operator, argument } => typed(
            "UnaryExpression",
            json!({
                "operator": operator.symbol(),
                "prefix": true,
                "argument": export(ast, *argument),
            }),
        ),
        Node::Binary {
            operator,
            left,
            right,
        } => typed(
            "BinaryExpression",
            json!({
                "operator": operator.symbol(),
                "left": export(ast, *left),
                "right": export(ast, *right),
            }),
        ),
        Node::Logical {
            operator,
            left,
            right,
        } => typed(
            "LogicalExpression",
            json!({
                "operator": operator.symbol(),
                "left": export(ast, *left),
                "right": export(ast, *right),
            }),
        ),
        Node::Conditional {
            test,
            consequent,
            alternate,
        } => typed(
            "ConditionalExpression",
            json!({
                "test": export(ast, *test),
                "consequent": export(ast, *consequent),
                "alternate": export(ast, *alternate),
            }),
        ),
        Node::Call { callee, arguments } => typed(
            "CallExpression",
            json!({
                "callee": export(ast, *callee),
                "arguments": export_all(ast, arguments),
            }),
        ),
        Node::Array { elements } => {
            typed("ArrayExpression", json!({ "elements": export_all(ast, elements) }))
        }
        Node::Function { name, params, body } => typed(
            "FunctionExpression",
            json!({
                "id": name.as_deref().map(identifier),
                "params": export_params(params),
                "body": export(ast, *body),
            }),
        ),
        Node::Arrow { params, body, .. } => typed(
            "ArrowFunctionExpression",
            json!({
                "params": export_params(params),
                "body": export(ast, *body),
                "expression": !matches!(ast.get(*body), Node::Block { .. }),
            }),
        ),
        Node::Program { body } => typed(
            "Program",
            json!({ "sourceType": "script", "body": export_all(ast, body) }),
        ),
        Node::Block { body } | Node::BlockExpression { body } => {
            typed("BlockStatement", json!({ "body": export_all(ast, body) }))
        }
        Node::ExpressionStatement { expression } => typed(
            "ExpressionStatement",
            json!({ "expression": export(ast, *expression) }),
        ),
        Node::VariableDeclaration { kind, name, init } => typed(
            "VariableDeclaration",
            json!({
                "kind": kind.keyword(),
                "declarations": [typed(
                    "VariableDeclarator",
                    json!({
                        "id": identifier(name),
                        "init": init.map(|init| export(ast, init)),
                    }),
                )],
            }),
        ),
        Node::FunctionDeclaration { name, params, body } => typed(
            "FunctionDeclaration",
            json!({
                "id": identifier(name),
                "params": export_params(params),
                "body": export(ast, *body),
            }),
        ),
        Node::If {
            test,
            consequent,
            alternate,
        } => typed(
            "IfStatement",
            json!({
                "test": export(ast, *test),
                "consequent": export(ast, *consequent),
                "alternate": alternate.map(|alternate| export(ast, alternate)),
            }),
        ),
        Node::Return { argument } => typed(
            "ReturnStatement",
            json!({ "argument": argument.map(|argument| export(ast, argument)) }),
        ),
        Node::Debugger => typed("DebuggerStatement", json!({})),
        Node::RedexMarker { .. } => identifier("@redex"),
        Node::Elided => identifier("..."),
    }
}
