//! GL-005: Agent reference resolution.
//!
//! Maps `namespace:name` to the text of a definition file. Identifiers are
//! validated before any filesystem access, and every hit is canonicalized and
//! checked against its canonical search base. A symlink that leads outside
//! the base is an error, never a silent skip.

use super::error::{Error, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("identifier regex"));

/// Split and validate `namespace:name`.
pub fn parse_reference(reference: &str) -> Result<(&str, &str)> {
    let (namespace, name) = reference
        .split_once(':')
        .ok_or_else(|| Error::InvalidReference(reference.to_string()))?;
    if !IDENT.is_match(namespace) || !IDENT.is_match(name) {
        return Err(Error::InvalidReference(reference.to_string()));
    }
    Ok((namespace, name))
}

/// Prioritized search over definition directories.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    search_paths: Vec<PathBuf>,
}

impl ReferenceResolver {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// Every path `resolve` would try, in order. Validates the reference.
    pub fn candidates(&self, reference: &str) -> Result<Vec<PathBuf>> {
        let (namespace, name) = parse_reference(reference)?;
        let file = format!("{}.md", name);
        Ok(self
            .search_paths
            .iter()
            .flat_map(|base| candidate_paths(base, namespace, &file))
            .collect())
    }

    /// Resolve a reference to the contents of its definition file.
    pub fn resolve(&self, reference: &str) -> Result<String> {
        let (namespace, name) = parse_reference(reference)?;
        let file = format!("{}.md", name);
        let mut attempted = Vec::new();

        for base in &self.search_paths {
            for candidate in candidate_paths(base, namespace, &file) {
                if !candidate.is_file() {
                    attempted.push(candidate);
                    continue;
                }
                let real = contained(base, &candidate)?;
                tracing::debug!(reference, path = %real.display(), "resolved agent reference");
                return std::fs::read_to_string(&real).map_err(|e| Error::io(&real, e));
            }
        }

        Err(Error::ReferenceNotFound {
            reference: reference.to_string(),
            attempted,
        })
    }
}

fn candidate_paths(base: &Path, namespace: &str, file: &str) -> [PathBuf; 5] {
    [
        base.join(namespace).join("core").join(file),
        base.join(namespace).join("specialized").join(file),
        base.join("core").join(file),
        base.join("specialized").join(file),
        base.join(file),
    ]
}

/// Canonicalize `candidate` and require it to live under canonical `base`.
fn contained(base: &Path, candidate: &Path) -> Result<PathBuf> {
    let real_base = base.canonicalize().map_err(|e| Error::io(base, e))?;
    let real = candidate
        .canonicalize()
        .map_err(|e| Error::io(candidate, e))?;
    if !real.starts_with(&real_base) {
        return Err(Error::PathEscape {
            path: real,
            base: real_base,
        });
    }
    Ok(real)
}
