//! GL-050: CLI subcommands: run, validate, list, resolve, manifest, drift, schema.

use crate::adapters::{select_adapter, AdapterKind, ProcessEnv};
use crate::core::config::{load_config, EngineConfig};
use crate::core::runner::{self, RunConfig};
use crate::core::{discovery, parser, types};
use crate::tripwire::drift;
use clap::Subcommand;
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute a recipe
    Run {
        /// Recipe file path, or the name of a discovered recipe
        recipe: String,

        /// Override a context variable (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Show what would be executed without running anything
        #[arg(long)]
        dry_run: bool,

        /// Backend: sdk, cli or nested (default: auto-select)
        #[arg(long)]
        adapter: Option<String>,

        /// Base directory for step execution (default: current)
        #[arg(long)]
        workdir: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse a recipe and print lint warnings
    Validate {
        /// Recipe file
        file: PathBuf,
    },

    /// List recipes found in the configured recipe directories
    List,

    /// Print the definition text for an agent reference
    Resolve {
        /// Reference in namespace:name form
        reference: String,
    },

    /// Write the content-hash manifest for a recipe directory
    Manifest {
        /// Recipe directory
        dir: PathBuf,
    },

    /// Compare a recipe directory against its stored manifest
    Drift {
        /// Recipe directory
        dir: PathBuf,

        /// Exit non-zero on any change (for CI/cron)
        #[arg(long)]
        tripwire: bool,
    },

    /// Print the JSON Schema for recipe files
    Schema,
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands, config_path: Option<&Path>) -> Result<(), String> {
    match cmd {
        Commands::Run {
            recipe,
            set,
            dry_run,
            adapter,
            workdir,
            json,
        } => {
            let config = engine_config(config_path)?;
            cmd_run(
                &config,
                &recipe,
                &set,
                dry_run,
                adapter.as_deref(),
                workdir.as_deref(),
                json,
            )
        }
        Commands::Validate { file } => cmd_validate(&file),
        Commands::List => cmd_list(&engine_config(config_path)?),
        Commands::Resolve { reference } => cmd_resolve(&engine_config(config_path)?, &reference),
        Commands::Manifest { dir } => cmd_manifest(&dir),
        Commands::Drift { dir, tripwire } => cmd_drift(&dir, tripwire),
        Commands::Schema => cmd_schema(),
    }
}

fn engine_config(config_path: Option<&Path>) -> Result<EngineConfig, String> {
    let cwd = std::env::current_dir().map_err(|e| format!("cannot read current dir: {}", e))?;
    load_config(config_path, &cwd, &ProcessEnv).map_err(|e| e.to_string())
}

/// A file path wins; otherwise look the name up in the recipe directories.
fn locate_recipe(recipe: &str, dirs: &[PathBuf]) -> Result<PathBuf, String> {
    let direct = Path::new(recipe);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }
    match discovery::find_recipe(recipe, dirs).map_err(|e| e.to_string())? {
        Some(info) => Ok(info.path),
        None => Err(format!(
            "recipe '{}' not found (not a file, and no recipe by that name in: {})",
            recipe,
            dirs.iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

/// Parse `KEY=VALUE` pairs. Values are read as YAML scalars.
pub fn parse_overrides(pairs: &[String]) -> Result<IndexMap<String, Value>, String> {
    let mut overrides = IndexMap::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid --set '{}': expected KEY=VALUE", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("invalid --set '{}': empty key", pair));
        }
        let value = match serde_yaml_ng::from_str::<Value>(raw) {
            Ok(v @ (Value::Bool(_) | Value::Number(_) | Value::String(_))) => v,
            _ => Value::String(raw.to_string()),
        };
        overrides.insert(key.to_string(), value);
    }
    Ok(overrides)
}

fn cmd_run(
    config: &EngineConfig,
    recipe_arg: &str,
    sets: &[String],
    dry_run: bool,
    adapter: Option<&str>,
    workdir: Option<&Path>,
    json: bool,
) -> Result<(), String> {
    let path = locate_recipe(recipe_arg, &config.recipe_dirs)?;
    let recipe = parser::parse_recipe_file(&path).map_err(|e| e.to_string())?;
    for warning in parser::validate_recipe(&recipe) {
        tracing::warn!("{}", warning);
    }
    let overrides = parse_overrides(sets)?;

    let preference = match adapter {
        Some(raw) if raw.trim().eq_ignore_ascii_case("auto") => None,
        Some(raw) => Some(raw.parse::<AdapterKind>().map_err(|e| e.to_string())?),
        None => config.adapter.preference,
    };
    let adapter = select_adapter(preference, &ProcessEnv, &config.adapter, None)
        .map_err(|e| e.to_string())?;
    let resolver = config.resolver();
    let working_dir = match workdir {
        Some(dir) => dir.to_path_buf(),
        None => std::env::current_dir().map_err(|e| format!("cannot read current dir: {}", e))?,
    };

    let result = runner::execute(&RunConfig {
        recipe: &recipe,
        adapter: adapter.as_ref(),
        resolver: &resolver,
        user_context: &overrides,
        working_dir: &working_dir,
        dry_run,
    });

    if json {
        let out = serde_json::to_string_pretty(&result)
            .map_err(|e| format!("cannot serialize result: {}", e))?;
        println!("{}", out);
    } else {
        print_result(&result, dry_run);
    }

    match result.failed_step() {
        None => Ok(()),
        Some(failed) => Err(format!("step '{}' failed: {}", failed.step_id, failed.error)),
    }
}

/// Display a run summary to stdout.
fn print_result(result: &types::RecipeResult, dry_run: bool) {
    println!("Recipe: {}", result.recipe_name);
    for step in &result.step_results {
        println!("  {:<9} {}", step.status.to_string(), step.step_id);
        if !step.error.is_empty() {
            println!("            error: {}", step.error);
        }
    }
    println!();
    if dry_run {
        println!("Dry run: no steps executed.");
    }
    println!(
        "{}: {} completed, {} skipped, {} failed.",
        if result.success { "OK" } else { "FAILED" },
        result.count(types::StepStatus::Completed),
        result.count(types::StepStatus::Skipped),
        result.count(types::StepStatus::Failed)
    );
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let recipe = parser::parse_recipe_file(file).map_err(|e| e.to_string())?;
    let warnings = parser::validate_recipe(&recipe);
    for w in &warnings {
        eprintln!("  WARNING: {}", w);
    }
    println!(
        "OK: {} ({} steps, {} warning(s))",
        recipe.name,
        recipe.steps.len(),
        warnings.len()
    );
    Ok(())
}

fn cmd_list(config: &EngineConfig) -> Result<(), String> {
    let recipes = discovery::discover(&config.recipe_dirs).map_err(|e| e.to_string())?;
    if recipes.is_empty() {
        println!("No recipes found.");
        return Ok(());
    }
    for info in recipes.values() {
        println!(
            "{:<24} {:>3} steps  {}",
            info.name,
            info.step_count,
            info.description.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn cmd_resolve(config: &EngineConfig, reference: &str) -> Result<(), String> {
    let text = config
        .resolver()
        .resolve(reference)
        .map_err(|e| e.to_string())?;
    print!("{}", text);
    Ok(())
}

fn cmd_manifest(dir: &Path) -> Result<(), String> {
    let path = drift::update_manifest(dir).map_err(|e| e.to_string())?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn cmd_drift(dir: &Path, tripwire_mode: bool) -> Result<(), String> {
    let changes = drift::check_upstream_changes(dir).map_err(|e| e.to_string())?;
    if changes.is_empty() {
        println!("No upstream changes.");
        return Ok(());
    }
    for change in &changes {
        println!("  {}", change);
        if let Some(ref old) = change.old_hash {
            println!("    old: {}", old);
        }
        if let Some(ref new) = change.new_hash {
            println!("    new: {}", new);
        }
    }
    println!();
    println!("Upstream changes: {} file(s)", changes.len());
    if tripwire_mode {
        return Err(format!("{} upstream change(s)", changes.len()));
    }
    Ok(())
}

fn cmd_schema() -> Result<(), String> {
    let schema = schemars::schema_for!(types::RecipeFile);
    let out = serde_json::to_string_pretty(&schema)
        .map_err(|e| format!("cannot serialize schema: {}", e))?;
    println!("{}", out);
    Ok(())
}
