//! GL-007: Runner: the step loop for one recipe execution.
//!
//! Steps run strictly in order: guard → render → adapter → bind output.
//! The first failure stops the run and every later step is SKIPPED
//! (jidoka). Step failures are recorded in `StepResult::error` and never
//! surface as `Err`.

use super::context::Context;
use super::error::Result;
use super::resolver::ReferenceResolver;
use super::types::*;
use crate::adapters::Adapter;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Instant;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n(.*?)```").expect("fenced json regex")
});

/// Inputs for one execution.
pub struct RunConfig<'a> {
    pub recipe: &'a Recipe,
    pub adapter: &'a dyn Adapter,
    pub resolver: &'a ReferenceResolver,
    /// Caller overrides, applied on top of the recipe's context defaults
    pub user_context: &'a IndexMap<String, Value>,
    /// Base for relative step `working_dir` values
    pub working_dir: &'a Path,
    pub dry_run: bool,
}

/// What a successful step hands back to the loop.
struct StepOutput {
    text: String,
    value: Value,
}

/// Execute a recipe. Always returns a result, even when a step fails.
pub fn execute(cfg: &RunConfig) -> RecipeResult {
    let start = Instant::now();
    let recipe = cfg.recipe;
    let mut context = Context::new(&recipe.context, cfg.user_context);
    let mut results: Vec<StepResult> = recipe
        .steps
        .iter()
        .map(|s| StepResult::pending(&s.id))
        .collect();

    tracing::info!(
        recipe = %recipe.name,
        steps = recipe.steps.len(),
        adapter = cfg.adapter.name(),
        dry_run = cfg.dry_run,
        "executing recipe"
    );

    let mut halted = false;
    for (step, result) in recipe.steps.iter().zip(results.iter_mut()) {
        if halted {
            result.skip();
            continue;
        }

        if let Some(ref expr) = step.condition {
            match context.evaluate_condition(expr) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::info!(step = %step.id, condition = %expr, "condition false, skipping");
                    result.skip();
                    continue;
                }
                Err(e) => {
                    result.start();
                    result.fail(e.to_string());
                    halted = true;
                    continue;
                }
            }
        }

        result.start();
        let step_start = Instant::now();
        let outcome = if cfg.dry_run {
            Ok(dry_run_step(cfg, step, &context))
        } else {
            run_step(cfg, step, &context)
        };

        match outcome {
            Ok(out) => {
                if let Some(ref name) = step.output {
                    context.set(name, out.value);
                }
                tracing::info!(
                    step = %step.id,
                    secs = step_start.elapsed().as_secs_f64(),
                    "step completed"
                );
                result.complete(out.text);
            }
            Err(e) => {
                tracing::error!(step = %step.id, error = %e, "step failed, halting");
                result.fail(e.to_string());
                halted = true;
            }
        }
    }

    let success = results.iter().all(|r| r.status != StepStatus::Failed);
    tracing::info!(
        recipe = %recipe.name,
        success,
        secs = start.elapsed().as_secs_f64(),
        "recipe finished"
    );

    RecipeResult {
        recipe_name: recipe.name.clone(),
        success,
        step_results: results,
        context: context.into_inner(),
    }
}

fn run_step(cfg: &RunConfig, step: &Step, context: &Context) -> Result<StepOutput> {
    let working_dir = step_working_dir(cfg.working_dir, step, context);

    let raw = match &step.action {
        StepAction::Bash { command } => {
            let rendered = context.render_shell(command);
            tracing::debug!(step = %step.id, command = %rendered, wd = %working_dir.display(), "bash");
            cfg.adapter
                .execute_bash_step(&rendered, &working_dir, step.timeout)?
        }
        StepAction::Agent { agent, prompt } => {
            let system_prompt = cfg.resolver.resolve(agent)?;
            let rendered = prompt
                .as_deref()
                .map(|p| context.render(p))
                .unwrap_or_default();
            tracing::debug!(step = %step.id, agent = %agent, prompt = %rendered, "agent");
            cfg.adapter.execute_agent_step(
                &rendered,
                Some(agent),
                Some(&system_prompt),
                step.mode.as_deref(),
                &working_dir,
            )?
        }
    };

    let text = raw.trim().to_string();
    let value = if step.parse_json {
        parse_json_output(&text)?
    } else {
        Value::String(text.clone())
    };
    Ok(StepOutput { text, value })
}

fn dry_run_step(cfg: &RunConfig, step: &Step, context: &Context) -> StepOutput {
    match &step.action {
        StepAction::Bash { command } => {
            tracing::info!(
                step = %step.id,
                command = %context.render_shell(command),
                "dry run: would execute bash"
            );
        }
        StepAction::Agent { agent, prompt } => {
            if let Err(e) = cfg.resolver.resolve(agent) {
                tracing::warn!(step = %step.id, agent = %agent, error = %e, "dry run: agent does not resolve");
            }
            tracing::info!(
                step = %step.id,
                agent = %agent,
                prompt = %prompt.as_deref().map(|p| context.render(p)).unwrap_or_default(),
                "dry run: would invoke agent"
            );
        }
    }
    StepOutput {
        text: String::new(),
        value: Value::String(String::new()),
    }
}

/// Rendered step `working_dir`, resolved against the run's base directory.
fn step_working_dir(base: &Path, step: &Step, context: &Context) -> PathBuf {
    match step.working_dir.as_deref() {
        Some(wd) => {
            let rendered = PathBuf::from(context.render(wd));
            if rendered.is_absolute() {
                rendered
            } else {
                base.join(rendered)
            }
        }
        None => base.to_path_buf(),
    }
}

/// Parse step output as JSON: raw text first, then a fenced ```json block.
pub fn parse_json_output(text: &str) -> Result<Value> {
    match serde_json::from_str(text) {
        Ok(v) => Ok(v),
        Err(raw_err) => match FENCED_JSON.captures(text) {
            Some(caps) => Ok(serde_json::from_str(caps[1].trim())?),
            None => Err(raw_err.into()),
        },
    }
}
