//! GL-041: Upstream drift detection for vendored recipe directories.
//!
//! A manifest maps recipe filename to content hash. Re-hashing the directory
//! and diffing against the stored manifest shows what upstream changed.

use crate::core::discovery::recipe_files;
use crate::core::error::{Error, Result};
use crate::tripwire::hasher;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILE: &str = ".recipe-manifest.json";

/// filename → `"blake3:{hex}"`, sorted by filename.
pub type Manifest = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
        })
    }
}

/// One file whose hash differs from the stored manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestChange {
    pub filename: String,
    pub kind: ChangeKind,
    pub old_hash: Option<String>,
    pub new_hash: Option<String>,
}

impl fmt::Display for ManifestChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}  {}", self.kind, self.filename)
    }
}

/// Hash every recipe file directly inside `dir`.
pub fn compute_manifest(dir: &Path) -> Result<Manifest> {
    let mut manifest = Manifest::new();
    for path in recipe_files(dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        manifest.insert(name, hasher::hash_file(&path)?);
    }
    Ok(manifest)
}

pub fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

/// Load the stored manifest. A missing file is an empty manifest.
pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = manifest_path(dir);
    if !path.exists() {
        return Ok(Manifest::new());
    }
    let content = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    Ok(serde_json::from_str(&content)?)
}

/// Write a manifest atomically (temp file, then rename).
pub fn write_manifest(dir: &Path, manifest: &Manifest) -> Result<PathBuf> {
    let path = manifest_path(dir);
    let json = serde_json::to_string_pretty(manifest)?;
    let tmp_path = dir.join(format!("{}.tmp", MANIFEST_FILE));
    std::fs::write(&tmp_path, format!("{}\n", json)).map_err(|e| Error::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, &path).map_err(|e| Error::io(&path, e))?;
    Ok(path)
}

/// Recompute and store the manifest for `dir`.
pub fn update_manifest(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        return Err(Error::io(
            dir,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }
    let manifest = compute_manifest(dir)?;
    let path = write_manifest(dir, &manifest)?;
    tracing::info!(path = %path.display(), entries = manifest.len(), "manifest updated");
    Ok(path)
}

/// Diff two manifests. Output is sorted by filename.
pub fn diff_manifests(old: &Manifest, new: &Manifest) -> Vec<ManifestChange> {
    let mut changes = Vec::new();
    for (name, new_hash) in new {
        match old.get(name) {
            None => changes.push(ManifestChange {
                filename: name.clone(),
                kind: ChangeKind::Added,
                old_hash: None,
                new_hash: Some(new_hash.clone()),
            }),
            Some(old_hash) if old_hash != new_hash => changes.push(ManifestChange {
                filename: name.clone(),
                kind: ChangeKind::Modified,
                old_hash: Some(old_hash.clone()),
                new_hash: Some(new_hash.clone()),
            }),
            Some(_) => {}
        }
    }
    for (name, old_hash) in old {
        if !new.contains_key(name) {
            changes.push(ManifestChange {
                filename: name.clone(),
                kind: ChangeKind::Removed,
                old_hash: Some(old_hash.clone()),
                new_hash: None,
            });
        }
    }
    changes.sort_by(|a, b| a.filename.cmp(&b.filename));
    changes
}

/// Compare the current contents of `dir` with its stored manifest.
pub fn check_upstream_changes(dir: &Path) -> Result<Vec<ManifestChange>> {
    let stored = read_manifest(dir)?;
    let current = compute_manifest(dir)?;
    Ok(diff_manifests(&stored, &current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed(dir: &Path) {
        std::fs::write(dir.join("a.yaml"), "name: a").unwrap();
        std::fs::write(dir.join("b.yml"), "name: b").unwrap();
        std::fs::write(dir.join("README.md"), "not a recipe").unwrap();
    }

    #[test]
    fn test_gl041_update_writes_sorted_manifest() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let path = update_manifest(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(MANIFEST_FILE));
        assert!(!dir.path().join(format!("{}.tmp", MANIFEST_FILE)).exists());

        let stored = read_manifest(dir.path()).unwrap();
        assert_eq!(stored.keys().collect::<Vec<_>>(), vec!["a.yaml", "b.yml"]);
        assert_eq!(stored["a.yaml"], hasher::hash_string("name: a"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.find("a.yaml").unwrap() < raw.find("b.yml").unwrap());
    }

    #[test]
    fn test_gl041_no_changes_after_update() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        update_manifest(dir.path()).unwrap();
        assert!(check_upstream_changes(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_gl041_detects_all_kinds() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        update_manifest(dir.path()).unwrap();

        std::fs::write(dir.path().join("a.yaml"), "name: a2").unwrap();
        std::fs::remove_file(dir.path().join("b.yml")).unwrap();
        std::fs::write(dir.path().join("c.yaml"), "name: c").unwrap();

        let changes = check_upstream_changes(dir.path()).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].filename, "a.yaml");
        assert_eq!(changes[0].kind, ChangeKind::Modified);
        assert_eq!(changes[0].old_hash.as_deref(), Some(hasher::hash_string("name: a").as_str()));
        assert_eq!(changes[0].new_hash.as_deref(), Some(hasher::hash_string("name: a2").as_str()));
        assert_eq!(changes[1].filename, "b.yml");
        assert_eq!(changes[1].kind, ChangeKind::Removed);
        assert!(changes[1].new_hash.is_none());
        assert_eq!(changes[2].filename, "c.yaml");
        assert_eq!(changes[2].kind, ChangeKind::Added);
        assert!(changes[2].old_hash.is_none());
    }

    #[test]
    fn test_gl041_missing_manifest_reports_all_added() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let changes = check_upstream_changes(dir.path()).unwrap();
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.kind == ChangeKind::Added));
    }

    #[test]
    fn test_gl041_corrupt_manifest_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), "{not json").unwrap();
        assert!(matches!(
            check_upstream_changes(dir.path()),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_gl041_update_missing_dir() {
        assert!(update_manifest(Path::new("/nonexistent/galley-recipes")).is_err());
    }

    #[test]
    fn test_gl041_change_display() {
        let change = ManifestChange {
            filename: "x.yaml".to_string(),
            kind: ChangeKind::Modified,
            old_hash: None,
            new_hash: None,
        };
        assert_eq!(change.to_string(), "modified  x.yaml");
    }
}
