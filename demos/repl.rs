use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use substep::ast::{Ast, NodeId};
use substep::estree::{parse_estree, to_estree};
use substep::pathify::highlight;
use substep::source::parse_program;
use substep::{Chapter, Context, Environment, Error, StepKind, StepperConfig, get_evaluation_steps};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

/// REPL settings changed by `:` commands
struct Session {
    chapter: Chapter,
    config: StepperConfig,
    estree_mode: bool,
}

fn run_repl() {
    println!("Substep - substitution model stepper");
    println!("Enter a program on one line, like: (1 + 2) * (3 + 4);");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new().expect("Could not initialize REPL");
    let mut session = Session {
        chapter: Chapter::Two,
        config: StepperConfig::default(),
        estree_mode: false,
    };

    loop {
        let prompt = format!("substep[{}]> ", session.chapter);
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                // Add the line to history
                let _ = rl.add_history_entry(line);

                if line.starts_with(':') {
                    if !run_command(line, &mut session) {
                        println!("Goodbye!");
                        break;
                    }
                    continue;
                }

                let parsed = if session.estree_mode {
                    parse_estree(line)
                } else {
                    parse_program(line)
                };
                match parsed {
                    Ok((mut ast, program)) => print_trace(&mut ast, program, &session),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

/// Handle a `:` command. Returns false when the REPL should exit.
fn run_command(line: &str, session: &mut Session) -> bool {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let argument = words.next();

    match (command, argument) {
        (":help", _) => print_help(),
        (":env", _) => print_environment(&Environment::for_chapter(session.chapter)),
        (":chapter", Some(n)) => {
            let chapter = n
                .parse::<u8>()
                .map_err(|e| e.to_string())
                .and_then(|n| Chapter::try_from(n).map_err(|e: Error| e.to_string()));
            match chapter {
                Ok(chapter) => {
                    session.chapter = chapter;
                    println!("Now using chapter {chapter}");
                }
                Err(e) => println!("Error: {e}"),
            }
        }
        (":limit", Some(n)) => match n.parse::<usize>() {
            Ok(max_steps) if max_steps > 0 => {
                session.config.max_steps = max_steps;
                println!("Traces now stop after {max_steps} entries");
            }
            _ => println!("Error: expected a positive step limit, got '{n}'"),
        },
        (":estree", _) => {
            session.estree_mode = !session.estree_mode;
            if session.estree_mode {
                println!("ESTree mode enabled:");
                println!("  • Input lines are ESTree JSON programs");
                println!("  • The final program is also shown as ESTree JSON (→)");
            } else {
                println!("Source mode enabled: input lines are program text");
            }
        }
        (":quit" | ":exit", _) => return false,
        (":chapter" | ":limit", None) => println!("Error: {command} needs an argument"),
        _ => println!("Unknown command {command}, try :help"),
    }
    true
}

fn print_trace(ast: &mut Ast, program: NodeId, session: &Session) {
    let mut context = Context::new(session.chapter);
    let steps = get_evaluation_steps(ast, program, &mut context, &session.config);

    for step in &steps {
        match step.kind {
            StepKind::Redex => {
                let highlighted = highlight(ast, step);
                println!("{}", highlighted.text);
                if let Some(redex) = highlighted.redex {
                    println!("  redex: {redex}");
                }
            }
            StepKind::Contracted => {
                println!("  {}", step.explanation);
                println!();
            }
            StepKind::LimitExceeded | StepKind::Error => {
                println!("{}", step.source(ast));
                println!("  {}", step.explanation);
            }
            StepKind::NothingToEvaluate => println!("{}", step.explanation),
        }
    }

    if let Some(last) = steps.last().filter(|s| s.kind == StepKind::Contracted) {
        println!("{}", last.source(ast));
        if session.estree_mode {
            println!("→ {}", to_estree(ast, last.tree));
        }
    }
}

fn print_help() {
    println!("Substitution model stepper:");
    println!("  :help       - Show this help message");
    println!("  :env        - Show the predeclared names of the current chapter");
    println!("  :chapter N  - Switch to chapter N (1-4)");
    println!("  :limit N    - Stop traces after N entries");
    println!("  :estree     - Toggle ESTree JSON input and output");
    println!("  :quit       - Exit the stepper");
    println!("  :exit       - Exit the stepper");
    println!("  Ctrl+C      - Exit the stepper");
    println!();
    println!("Each reduction is shown with its redex marked @redex, followed by");
    println!("an explanation of the step.");
    println!();
    println!("Examples:");
    println!("  (1 + 2) * (3 + 4);");
    println!("  !!!true || true;");
    println!("  function f(n) {{ return n === 0 ? 1 : n * f(n - 1); }} f(4);");
    println!("  const square = x => x * x; square(square(2));");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Predeclared names ({} total):", bindings.len());
    println!();

    let (constants, builtins): (Vec<String>, Vec<String>) = bindings
        .into_iter()
        .partition(|name| env.constant(name).is_some());

    // Print built-in functions
    if !builtins.is_empty() {
        println!("Built-in functions ({}):", builtins.len());
        // Print in columns for readability
        let mut col = 0;
        for name in builtins {
            print!("  {name:<20}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !constants.is_empty() {
        println!("Constants ({}):", constants.len());
        for name in constants {
            println!("  {name}");
        }
    }
}
