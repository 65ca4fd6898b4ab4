//! GL-022: Agent CLI subprocess adapter.
//!
//! Runs `<binary> -p <enriched prompt>` in the step's working directory.

use super::{enrich_prompt, process, Adapter};
use crate::core::config::AdapterSettings;
use crate::core::error::{Error, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CliAdapter {
    binary: String,
    timeout_secs: u64,
}

impl CliAdapter {
    pub fn new(binary: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            binary: binary.into(),
            timeout_secs,
        }
    }

    pub fn from_settings(settings: &AdapterSettings) -> Self {
        Self::new(settings.cli_binary.clone(), settings.agent_timeout_secs)
    }

    fn executable(&self) -> Option<PathBuf> {
        find_executable(&self.binary, std::env::var_os("PATH").as_deref())
    }
}

impl Adapter for CliAdapter {
    fn name(&self) -> &str {
        "cli"
    }

    fn is_available(&self) -> bool {
        self.executable().is_some()
    }

    fn execute_agent_step(
        &self,
        prompt: &str,
        agent_name: Option<&str>,
        agent_system_prompt: Option<&str>,
        mode: Option<&str>,
        working_dir: &Path,
    ) -> Result<String> {
        let exe = self.executable().ok_or_else(|| Error::Unavailable {
            adapter: self.name().to_string(),
            reason: format!("'{}' not found on PATH", self.binary),
        })?;
        let enriched = enrich_prompt(prompt, agent_system_prompt, mode);
        tracing::debug!(
            binary = %exe.display(),
            agent = agent_name.unwrap_or("-"),
            "invoking agent cli"
        );

        let program = exe.to_string_lossy();
        process::run_argv(
            &program,
            &["-p", &enriched],
            working_dir,
            Duration::from_secs(self.timeout_secs),
        )?
        .into_stdout()
    }
}

/// Locate `binary` on a PATH-style list, or accept it as-is when it is a path.
pub fn find_executable(binary: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    if binary.is_empty() {
        return None;
    }
    let direct = Path::new(binary);
    if direct.components().count() > 1 || direct.is_absolute() {
        return is_executable(direct).then(|| direct.to_path_buf());
    }
    std::env::split_paths(path_var?)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_cli(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-agent");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_gl022_find_executable_on_path() {
        let dir = tempfile::tempdir().unwrap();
        fake_cli(dir.path(), "true");
        let found = find_executable("fake-agent", Some(dir.path().as_os_str())).unwrap();
        assert_eq!(found, dir.path().join("fake-agent"));
        assert!(find_executable("missing-agent", Some(dir.path().as_os_str())).is_none());
        assert!(find_executable("fake-agent", None).is_none());
    }

    #[test]
    fn test_gl022_non_executable_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("plain"), "x").unwrap();
        assert!(find_executable("plain", Some(dir.path().as_os_str())).is_none());
    }

    #[test]
    fn test_gl022_passes_enriched_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_cli(dir.path(), r#"[ "$1" = "-p" ] || exit 9; printf '%s' "$2""#);
        let adapter = CliAdapter::new(exe.to_string_lossy(), 10);
        assert!(adapter.is_available());
        let out = adapter
            .execute_agent_step("do it", Some("ns:x"), Some("You are X."), None, dir.path())
            .unwrap();
        assert_eq!(out, "You are X.\n\n---\n\ndo it");
    }

    #[test]
    fn test_gl022_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let wd = tempfile::tempdir().unwrap();
        let exe = fake_cli(dir.path(), "pwd");
        let adapter = CliAdapter::new(exe.to_string_lossy(), 10);
        let out = adapter
            .execute_agent_step("p", None, None, None, wd.path())
            .unwrap();
        let expected = wd.path().canonicalize().unwrap();
        assert_eq!(Path::new(out.trim()).canonicalize().unwrap(), expected);
    }

    #[test]
    fn test_gl022_non_zero_exit_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let exe = fake_cli(dir.path(), "echo denied >&2; exit 3");
        let adapter = CliAdapter::new(exe.to_string_lossy(), 10);
        let err = adapter
            .execute_agent_step("p", None, None, None, dir.path())
            .unwrap_err();
        assert!(matches!(err, Error::NonZeroExit { code: 3, .. }));
    }

    #[test]
    fn test_gl022_unavailable() {
        let adapter = CliAdapter::new("/nonexistent/agent-cli", 10);
        assert!(!adapter.is_available());
        let err = adapter
            .execute_agent_step("p", None, None, None, Path::new("/tmp"))
            .unwrap_err();
        assert!(matches!(err, Error::Unavailable { .. }));
    }
}
