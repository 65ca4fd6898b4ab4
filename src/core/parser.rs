//! GL-002: Recipe YAML parsing and validation.
//!
//! `parse_recipe` enforces structure and fails hard:
//! - `name` present and non-empty
//! - `steps` present and non-empty, every step has a unique `id`
//! - step type explicit (`bash`/`agent`) or inferable from `agent`/`command`
//! - guard expressions are well-formed
//!
//! `validate_recipe` is lint only: it returns warnings and never fails.

use super::condition::Condition;
use super::context::template_variables;
use super::error::{Error, Result};
use super::resolver::parse_reference;
use super::types::*;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

static OUTPUT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("output name regex"));

/// Parse a recipe file from disk.
pub fn parse_recipe_file(path: &Path) -> Result<Recipe> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    parse_recipe(&content)
}

/// Parse a recipe from a YAML string.
pub fn parse_recipe(yaml: &str) -> Result<Recipe> {
    let file: RecipeFile = serde_yaml_ng::from_str(yaml)?;
    build_recipe(file)
}

/// Turn the on-disk schema into a validated `Recipe`.
pub fn build_recipe(file: RecipeFile) -> Result<Recipe> {
    let name = match file.name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => return Err(Error::structural("missing required field 'name'")),
    };

    let specs = match file.steps {
        Some(s) if !s.is_empty() => s,
        _ => {
            return Err(Error::structural(format!(
                "recipe '{}' has no steps",
                name
            )))
        }
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut steps = Vec::with_capacity(specs.len());

    for (index, spec) in specs.into_iter().enumerate() {
        let id = match spec.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => {
                return Err(Error::structural(format!(
                    "step #{} has no id",
                    index + 1
                )))
            }
        };
        if !seen.insert(id.clone()) {
            return Err(Error::structural(format!("duplicate step id '{}'", id)));
        }
        steps.push(build_step(id, spec)?);
    }

    Ok(Recipe {
        name,
        description: file.description,
        version: file.version,
        author: file.author,
        tags: file.tags.into_iter().collect::<BTreeSet<_>>(),
        context: file.context,
        steps,
    })
}

fn build_step(id: String, spec: StepSpec) -> Result<Step> {
    let action = build_action(&id, &spec)?;

    if let Some(ref expr) = spec.condition {
        Condition::parse(expr).map_err(|e| Error::structural(format!("step '{}': {}", id, e)))?;
    }

    if let Some(ref output) = spec.output {
        if !OUTPUT_NAME.is_match(output) {
            return Err(Error::structural(format!(
                "step '{}': invalid output variable name '{}'",
                id, output
            )));
        }
    }

    let timeout = match spec.timeout {
        Some(0) => {
            return Err(Error::structural(format!(
                "step '{}': timeout must be a positive number of seconds",
                id
            )))
        }
        Some(t) => t,
        None => DEFAULT_TIMEOUT_SECS,
    };

    Ok(Step {
        id,
        action,
        output: spec.output,
        condition: spec.condition,
        parse_json: spec.parse_json,
        mode: spec.mode,
        working_dir: spec.working_dir,
        timeout,
    })
}

fn build_action(id: &str, spec: &StepSpec) -> Result<StepAction> {
    let step_type = match spec.step_type.as_deref() {
        Some(raw) => StepType::from_name(raw).ok_or_else(|| {
            Error::structural(format!(
                "step '{}': unknown type '{}' (expected bash or agent)",
                id, raw
            ))
        })?,
        None if spec.agent.is_some() => StepType::Agent,
        None if spec.command.is_some() => StepType::Bash,
        None => {
            return Err(Error::structural(format!(
                "step '{}': cannot infer type; set 'command' (bash) or 'agent'",
                id
            )))
        }
    };

    match step_type {
        StepType::Bash => {
            let command = spec.command.clone().ok_or_else(|| {
                Error::structural(format!("step '{}': bash step requires 'command'", id))
            })?;
            Ok(StepAction::Bash { command })
        }
        StepType::Agent => {
            let agent = spec.agent.clone().ok_or_else(|| {
                Error::structural(format!("step '{}': agent step requires 'agent'", id))
            })?;
            Ok(StepAction::Agent {
                agent,
                prompt: spec.prompt.clone(),
            })
        }
    }
}

/// Lint a parsed recipe. Returns warnings (empty = clean).
pub fn validate_recipe(recipe: &Recipe) -> Vec<String> {
    let mut warnings = Vec::new();
    let mut known: HashSet<String> = recipe.context.keys().cloned().collect();
    let mut writers: HashMap<String, String> = HashMap::new();

    for step in &recipe.steps {
        let mut templates: Vec<&str> = Vec::new();

        match &step.action {
            StepAction::Bash { command } => {
                if command.trim().is_empty() {
                    warnings.push(format!("step '{}': bash command is empty", step.id));
                }
                templates.push(command);
            }
            StepAction::Agent { agent, prompt } => {
                if parse_reference(agent).is_err() {
                    warnings.push(format!(
                        "step '{}': agent reference '{}' is not a valid namespace:name identifier",
                        step.id, agent
                    ));
                }
                match prompt.as_deref() {
                    Some(p) if !p.trim().is_empty() => templates.push(p),
                    _ => warnings.push(format!("step '{}': agent step has no prompt", step.id)),
                }
            }
        }
        if let Some(ref wd) = step.working_dir {
            templates.push(wd);
        }

        for template in templates {
            for var in template_variables(template) {
                let root = var.split('.').next().unwrap_or(&var);
                if !known.contains(root) {
                    warnings.push(format!(
                        "step '{}': references undefined variable '{}'",
                        step.id, var
                    ));
                }
            }
        }

        if step.parse_json && step.output.is_none() {
            warnings.push(format!(
                "step '{}': parse_json has no effect without 'output'",
                step.id
            ));
        }

        if let Some(ref output) = step.output {
            if let Some(previous) = writers.insert(output.clone(), step.id.clone()) {
                warnings.push(format!(
                    "step '{}': output '{}' overwrites the value from step '{}'",
                    step.id, output, previous
                ));
            }
            known.insert(output.clone());
        }
    }

    warnings
}
