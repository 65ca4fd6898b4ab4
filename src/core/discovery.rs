//! GL-006: Recipe discovery across prioritized directories.
//!
//! Only files directly inside each directory are considered. When two
//! directories define the same recipe name, the earlier directory wins.

use super::error::{Error, Result};
use super::parser::parse_recipe;
use crate::tripwire::hasher::hash_string;
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Summary of one discovered recipe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeInfo {
    pub name: String,
    pub path: PathBuf,
    pub description: Option<String>,
    pub version: Option<String>,
    pub step_count: usize,
    /// `"blake3:{hex}"` of the file contents
    pub hash: String,
}

/// `*.yaml` and `*.yml` files directly inside `dir`, sorted by path.
/// A missing directory yields an empty list.
pub fn recipe_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let mut files = Vec::new();
    for ext in ["yaml", "yml"] {
        let pattern = format!("{}/*.{}", escaped, ext);
        let paths = glob::glob(&pattern)
            .map_err(|e| Error::Config(format!("bad glob pattern {}: {}", pattern, e)))?;
        for entry in paths {
            let path = entry.map_err(|e| {
                let cause = std::io::Error::new(e.error().kind(), e.error().to_string());
                Error::io(e.path(), cause)
            })?;
            if path.is_file() {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Parse every recipe found in `dirs`, keyed by recipe name.
pub fn discover(dirs: &[PathBuf]) -> Result<IndexMap<String, RecipeInfo>> {
    let mut found: IndexMap<String, RecipeInfo> = IndexMap::new();
    for dir in dirs {
        for path in recipe_files(dir)? {
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable recipe");
                    continue;
                }
            };
            let recipe = match parse_recipe(&content) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unparseable recipe");
                    continue;
                }
            };
            if let Some(existing) = found.get(&recipe.name) {
                tracing::debug!(
                    name = %recipe.name,
                    kept = %existing.path.display(),
                    shadowed = %path.display(),
                    "duplicate recipe name"
                );
                continue;
            }
            found.insert(
                recipe.name.clone(),
                RecipeInfo {
                    name: recipe.name,
                    description: recipe.description,
                    version: recipe.version,
                    step_count: recipe.steps.len(),
                    hash: hash_string(&content),
                    path,
                },
            );
        }
    }
    Ok(found)
}

/// Find one recipe by name.
pub fn find_recipe(name: &str, dirs: &[PathBuf]) -> Result<Option<RecipeInfo>> {
    Ok(discover(dirs)?.shift_remove(name))
}
