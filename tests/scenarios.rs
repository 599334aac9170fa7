//! End-to-end traces through the public API: parse, step, print.

#![expect(clippy::unwrap_used)] // test code OK

use substep::ast::Ast;
use substep::pathify::highlight;
use substep::reducer::reduce;
use substep::source::{parse_program, parse_program_into};
use substep::stepper::{Trace, step_source};
use substep::treeify::{to_source, treeify};
use substep::{Chapter, Context, Environment, StepKind, StepperConfig, get_evaluation_steps};

fn trace(input: &str) -> Trace {
    step_source(input, Chapter::Two, &StepperConfig::default()).unwrap()
}

#[test]
fn test_full_traces() {
    let test_cases: Vec<(&str, Vec<&str>)> = vec![
        (
            "(1 + 2) * (3 + 4);",
            vec!["(1 + 2) * (3 + 4);", "3 * (3 + 4);", "3 * 7;", "21;"],
        ),
        (
            "!!!true || true;",
            vec![
                "!!!true || true;",
                "!!false || true;",
                "!true || true;",
                "false || true;",
                "true;",
            ],
        ),
        (
            "function f(n){return n;} f(5+1*6-40);",
            vec![
                "function f(n) {\n  return n;\n}\nf(5 + 1 * 6 - 40);",
                "f(5 + 1 * 6 - 40);",
                "f(5 + 6 - 40);",
                "f(11 - 40);",
                "f(-29);",
                "-29;",
            ],
        ),
        (
            "const x = 2;\nconst y = x + 1;\nx * y;",
            vec![
                "const x = 2;\nconst y = x + 1;\nx * y;",
                "const y = 2 + 1;\n2 * y;",
                "const y = 3;\n2 * y;",
                "2 * 3;",
                "6;",
            ],
        ),
        (
            "const sq = x => x * x;\nsq(3);",
            vec!["const sq = x => x * x;\nsq(3);", "sq(3);", "3 * 3;", "9;"],
        ),
        (
            "1 < 2 ? \"small\" : \"big\";",
            vec!["1 < 2 ? \"small\" : \"big\";", "true ? \"small\" : \"big\";", "\"small\";"],
        ),
    ];

    for (i, (input, expected)) in test_cases.into_iter().enumerate() {
        assert_eq!(trace(input).snapshots(), expected, "#{}", i + 1);
    }
}

#[test]
fn test_recursive_function() {
    let trace = trace(
        "function factorial(n) {\n  return n === 0 ? 1 : n * factorial(n - 1);\n}\nfactorial(5);",
    );
    let snapshots = trace.snapshots();
    assert_eq!(snapshots[1], "factorial(5);");
    assert_eq!(
        snapshots[2],
        "5 === 0 ? 1 : 5 * factorial(5 - 1);",
        "the function refers to itself by name"
    );
    assert_eq!(snapshots.last().unwrap(), "120;");
    assert!(trace.context.errors.is_empty());
    assert!(trace.steps.iter().all(|s| s.kind != StepKind::LimitExceeded));
}

#[test]
fn test_substitution_avoids_capture() {
    let trace = trace(
        "const abs = x => math_abs(x);\n\
         function f(math_abs) { return abs(math_abs); }\n\
         f(-3);",
    );
    let snapshots = trace.snapshots();
    assert_eq!(
        snapshots[1],
        "function f(math_abs_1) {\n  return abs(math_abs_1);\n}\nf(-3);"
    );
    assert_eq!(
        &snapshots[2..],
        ["f(-3);", "abs(-3);", "math_abs(-3);", "3;"]
    );
}

#[test]
fn test_inner_functions_are_renamed_apart() {
    let trace = trace("const twice = f => math_abs => f(f(math_abs));\ntwice(math_abs)(-2);");
    assert_eq!(
        trace.snapshots(),
        vec![
            "const twice = f => math_abs => f(f(math_abs));\ntwice(math_abs)(-2);",
            "twice(math_abs)(-2);",
            "(math_abs_1 => math_abs(math_abs(math_abs_1)))(-2);",
            "math_abs(math_abs(-2));",
            "math_abs(2);",
            "2;",
        ]
    );
}

#[test]
fn test_later_declarations_stay_in_scope() {
    let test_cases = vec![
        (
            "function f() { return g(); }\nfunction g() { return 1; }\nf();",
            "1;",
        ),
        (
            "function is_even(n) { return n === 0 ? true : is_odd(n - 1); }\n\
             function is_odd(n) { return n === 0 ? false : is_even(n - 1); }\n\
             is_even(4);",
            "true;",
        ),
        ("const h = () => k;\nconst k = 3;\nh();", "3;"),
    ];

    for (i, (input, expected)) in test_cases.into_iter().enumerate() {
        let trace = trace(input);
        assert!(trace.context.errors.is_empty(), "#{}: {:?}", i + 1, trace.context.errors);
        let snapshots = trace.snapshots();
        assert_eq!(snapshots.last().unwrap(), expected, "#{}", i + 1);
        assert!(
            snapshots.iter().all(|s| !s.contains("_1")),
            "#{}: nothing needs renaming",
            i + 1
        );
    }
}

#[test]
fn test_every_step_makes_progress() {
    let programs = [
        "function factorial(n) { return n === 0 ? 1 : n * factorial(n - 1); }\nfactorial(3);",
        "const compose = (f, g) => x => f(g(x));\ncompose(x => x - 10, x => -x)(4);",
        "(() => { const a = 1; return a; })();",
        "if (1 === 1) { \"a\" + \"b\"; } else { 0; }",
        "pair(1 / 0, 0 / 0);",
    ];

    for (i, program) in programs.iter().enumerate() {
        let trace = trace(program);
        let statement_count = |tree| {
            trace
                .ast
                .get(tree)
                .statements()
                .map_or(0, <[substep::ast::NodeId]>::len)
        };
        for pair in trace.steps.windows(2) {
            let [before, after] = pair else { unreachable!() };
            if before.kind != StepKind::Redex || after.kind != StepKind::Contracted {
                continue;
            }
            let rewritten = !trace
                .ast
                .structurally_equal(before.tree, &trace.ast, after.tree);
            assert!(
                rewritten || statement_count(after.tree) < statement_count(before.tree),
                "#{}: step {:?} left the program unchanged",
                i + 1,
                after.explanation
            );
        }
    }
}

#[test]
fn test_fixed_point() {
    let env = Environment::for_chapter(Chapter::One);
    for (i, input) in ["5;", "\"done\";", "x => x;", "[1, [2]];", ""].iter().enumerate() {
        let (mut ast, program) = parse_program(input).unwrap();
        let contraction = reduce(&mut ast, program, &env).unwrap();
        assert_eq!(contraction.node, program, "#{}", i + 1);
        assert!(contraction.redex.is_empty(), "#{}", i + 1);
    }
}

#[test]
fn test_printed_steps_parse_back() {
    let programs = [
        "function factorial(n) { return n === 0 ? 1 : n * factorial(n - 1); }\nfactorial(3);",
        "const compose = (f, g) => x => f(g(x));\ncompose(x => x - 10, x => -x)(4);",
        "(() => { const a = 1; return a; })();",
        "if (1 === 1) { \"a\" + \"b\"; } else { 0; }",
        "pair(1 / 0, 0 / 0);",
    ];

    for (i, program) in programs.iter().enumerate() {
        let trace = trace(program);
        for step in &trace.steps {
            let treeified = treeify(&trace.ast, step.tree);
            let printed = to_source(&treeified.ast, treeified.root);

            let mut reparsed = Ast::new();
            let root = parse_program_into(&mut reparsed, &printed).unwrap();
            assert!(
                treeified
                    .ast
                    .structurally_equal(treeified.root, &reparsed, root),
                "#{}: {printed:?} does not parse back to the same tree",
                i + 1
            );
        }
    }
}

#[test]
fn test_step_limit() {
    let looping = "function loop(n) { return loop(n + 1); }\nloop(0);";
    let config = StepperConfig { max_steps: 20 };
    let trace = step_source(looping, Chapter::One, &config).unwrap();

    assert_eq!(trace.steps.len(), 20);
    let last = trace.steps.last().unwrap();
    assert_eq!(last.kind, StepKind::LimitExceeded);
    assert_eq!(last.explanation, "Maximum number of steps exceeded");
    assert!(last.paths.is_empty());
    assert!(trace.context.errors.is_empty());
}

#[test]
fn test_runtime_errors() {
    let test_cases = vec![
        ("const f = x => x;\nf(1, 2);", "ArityError: f expects 1 argument(s), but got 2."),
        ("1 + \"a\";", "Type error: expected number on right hand side of operation +, got string"),
        ("undeclared + 1;", "Name undeclared not declared."),
        ("pair(1, 2);", "Name pair not declared."),
    ];

    for (i, (input, expected)) in test_cases.into_iter().enumerate() {
        let trace = step_source(input, Chapter::One, &StepperConfig::default()).unwrap();
        let last = trace.steps.last().unwrap();
        assert_eq!(last.kind, StepKind::Error, "#{}", i + 1);
        assert_eq!(last.explanation, expected, "#{}", i + 1);
        assert_eq!(trace.context.errors.len(), 1, "#{}", i + 1);
        assert_eq!(trace.context.errors[0].to_string(), expected, "#{}", i + 1);
    }
}

#[test]
fn test_nothing_to_evaluate() {
    for (i, input) in ["", "42;", "const x = 1;"].iter().enumerate() {
        let (mut ast, program) = parse_program(input).unwrap();
        let mut context = Context::new(Chapter::One);
        let steps = get_evaluation_steps(&mut ast, program, &mut context, &StepperConfig::default());

        if *input == "const x = 1;" {
            // a declaration is still a reduction
            assert_eq!(steps.len(), 2, "#{}", i + 1);
            assert_eq!(steps[1].source(&ast), "", "#{}", i + 1);
            continue;
        }
        assert_eq!(steps.len(), 1, "#{}", i + 1);
        assert_eq!(steps[0].kind, StepKind::NothingToEvaluate, "#{}", i + 1);
        assert_eq!(steps[0].explanation, "There is nothing to evaluate", "#{}", i + 1);
    }
}

#[test]
fn test_highlighted_trace() {
    let mut trace = trace("(1 + 2) * (3 + 4);");
    let steps = trace.steps.clone();
    let rendered: Vec<(String, Option<String>)> = steps
        .iter()
        .map(|step| {
            let h = highlight(&mut trace.ast, step);
            (h.text, h.redex)
        })
        .collect();

    let expected = [
        ("(@redex) * (3 + 4);", Some("1 + 2")),
        ("@redex * (3 + 4);", Some("3")),
        ("3 * (@redex);", Some("3 + 4")),
        ("3 * @redex;", Some("7")),
        ("@redex;", Some("3 * 7")),
        ("@redex;", Some("21")),
    ];
    for (i, ((text, redex), (want_text, want_redex))) in
        rendered.iter().zip(expected).enumerate()
    {
        assert_eq!(text, want_text, "#{}", i + 1);
        assert_eq!(redex.as_deref(), want_redex, "#{}", i + 1);
    }
}

#[cfg(feature = "estree")]
#[test]
fn test_estree_program() {
    use substep::estree::{parse_estree, to_estree};

    let json = r#"{
        "type": "Program",
        "body": [{
            "type": "ExpressionStatement",
            "expression": {
                "type": "BinaryExpression",
                "operator": "*",
                "left": {
                    "type": "BinaryExpression", "operator": "+",
                    "left": { "type": "Literal", "value": 1 },
                    "right": { "type": "Literal", "value": 2 }
                },
                "right": { "type": "Literal", "value": 7 }
            }
        }]
    }"#;
    let (mut ast, program) = parse_estree(json).unwrap();
    let mut context = Context::new(Chapter::One);
    let steps = get_evaluation_steps(&mut ast, program, &mut context, &StepperConfig::default());

    let last = steps.last().unwrap();
    assert_eq!(last.source(&ast), "21;");
    let exported = to_estree(&ast, last.tree);
    assert_eq!(exported["body"][0]["expression"]["value"], 21);
}
