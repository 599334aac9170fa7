//! The step driver.
//!
//! [`get_evaluation_steps`] prepares a program (predeclared constants substituted,
//! `debugger` statements removed) and then calls the reducer until the program is
//! fully reduced, the step ceiling is hit, or a reduction fails. Every reduction
//! contributes two entries to the trace: the tree before the step with the redex
//! located, and the tree after it with the rewritten part located.

use crate::Error;
use crate::ast::{Ast, Node, NodeId};
use crate::classify::has_redex;
use crate::context::{Context, Environment};
use crate::path::Path;
use crate::reducer::reduce;
use crate::substitute::{free_names, substitute};
use crate::treeify::to_source;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Tree before a reduction; paths locate the redex
    Redex,
    /// Tree after a reduction; paths locate the result or the substitution sites
    Contracted,
    LimitExceeded,
    Error,
    NothingToEvaluate,
}

/// One entry of a trace
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub tree: NodeId,
    pub paths: Vec<Path>,
    pub explanation: String,
    pub kind: StepKind,
}

impl Step {
    /// The step's tree as source text
    pub fn source(&self, ast: &Ast) -> String {
        to_source(ast, self.tree)
    }
}

/// Limits for one run of the step driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepperConfig {
    /// Maximum number of trace entries
    pub max_steps: usize,
}

impl Default for StepperConfig {
    fn default() -> Self {
        StepperConfig {
            max_steps: crate::DEFAULT_MAX_STEPS,
        }
    }
}

/// Produce the full trace for `program`.
///
/// Runtime errors end the trace with an [`StepKind::Error`] entry and are also pushed
/// onto `context.errors`. Reaching `config.max_steps` replaces the final entry with a
/// [`StepKind::LimitExceeded`] entry. A program with nothing to reduce yields a single
/// [`StepKind::NothingToEvaluate`] entry.
pub fn get_evaluation_steps(
    ast: &mut Ast,
    program: NodeId,
    context: &mut Context,
    config: &StepperConfig,
) -> Vec<Step> {
    tracing::debug!(
        target: "substep::step",
        chapter = %context.chapter,
        max_steps = config.max_steps,
        "starting evaluation"
    );

    let prepared = substitute_constants(ast, program, &context.environment);
    let mut current = strip_debugger(ast, prepared);
    let mut steps: Vec<Step> = Vec::new();
    let mut failure: Option<Error> = None;
    let mut limited = false;

    while has_redex(ast, current, &context.environment) {
        if steps.len() >= config.max_steps {
            limited = true;
            break;
        }
        match reduce(ast, current, &context.environment) {
            Ok(contraction) => {
                tracing::trace!(
                    target: "substep::step",
                    step = steps.len() / 2 + 1,
                    explanation = %contraction.explanation,
                    "reduced"
                );
                steps.push(Step {
                    tree: current,
                    paths: contraction.redex,
                    explanation: contraction.explanation.clone(),
                    kind: StepKind::Redex,
                });
                steps.push(Step {
                    tree: contraction.node,
                    paths: contraction.contracted,
                    explanation: contraction.explanation,
                    kind: StepKind::Contracted,
                });
                current = contraction.node;
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    // the last pair may overshoot an odd ceiling
    if limited || steps.len() > config.max_steps {
        tracing::warn!(
            target: "substep::step",
            max_steps = config.max_steps,
            "step limit exceeded"
        );
        steps.truncate(config.max_steps);
        let tree = steps.pop().map_or(current, |last| last.tree);
        steps.push(Step {
            tree,
            paths: Vec::new(),
            explanation: "Maximum number of steps exceeded".to_string(),
            kind: StepKind::LimitExceeded,
        });
    }

    if let Some(e) = failure {
        tracing::debug!(target: "substep::step", error = %e, "evaluation failed");
        steps.push(Step {
            tree: current,
            paths: Vec::new(),
            explanation: e.to_string(),
            kind: StepKind::Error,
        });
        context.errors.push(e);
    }

    if steps.is_empty() {
        steps.push(Step {
            tree: current,
            paths: Vec::new(),
            explanation: "There is nothing to evaluate".to_string(),
            kind: StepKind::NothingToEvaluate,
        });
    }

    tracing::debug!(target: "substep::step", entries = steps.len(), "evaluation finished");
    steps
}

/// Substitute every predeclared constant that occurs free in `program`
fn substitute_constants(ast: &mut Ast, program: NodeId, env: &Environment) -> NodeId {
    let free = free_names(ast, program);
    let mut current = program;
    for (name, value) in env.constants() {
        if free.contains(name) {
            let replacement = ast.literal(value.clone());
            current = substitute(ast, name, replacement, current).node;
        }
    }
    current
}

/// Remove `debugger` statements at every depth
fn strip_debugger(ast: &mut Ast, id: NodeId) -> NodeId {
    let node = ast.get(id).clone();
    let mut changed = false;
    let mut stripped = node.map_children(|c| {
        let s = strip_debugger(ast, c);
        changed |= s != c;
        s
    });
    if let Node::Program { body } | Node::Block { body } | Node::BlockExpression { body } =
        &mut stripped
    {
        let before = body.len();
        body.retain(|s| !matches!(ast.get(*s), Node::Debugger));
        changed |= body.len() != before;
    }
    if changed { ast.add(stripped) } else { id }
}

/// A parsed program together with its trace
#[cfg(feature = "source")]
#[derive(Debug, Clone)]
pub struct Trace {
    pub ast: Ast,
    pub steps: Vec<Step>,
    pub context: Context,
}

#[cfg(feature = "source")]
impl Trace {
    /// The program text before the first reduction and after each one
    pub fn snapshots(&self) -> Vec<String> {
        let mut texts = Vec::new();
        for step in &self.steps {
            match step.kind {
                StepKind::Redex if texts.is_empty() => texts.push(step.source(&self.ast)),
                StepKind::Contracted => texts.push(step.source(&self.ast)),
                _ => {}
            }
        }
        texts
    }
}

/// Parse `text` and step it under the standard environment of `chapter`
#[cfg(feature = "source")]
pub fn step_source(
    text: &str,
    chapter: crate::context::Chapter,
    config: &StepperConfig,
) -> Result<Trace, Error> {
    let (mut ast, program) = crate::source::parse_program(text)?;
    let mut context = Context::new(chapter);
    let steps = get_evaluation_steps(&mut ast, program, &mut context, config);
    Ok(Trace {
        ast,
        steps,
        context,
    })
}
