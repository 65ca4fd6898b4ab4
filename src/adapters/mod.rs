//! GL-021: Adapter abstraction: SDK, CLI subprocess and nested-session backends.
//!
//! The runner talks to one `Adapter`. Bash steps share a single process
//! implementation; adapters differ only in how they reach an agent.

pub mod cli;
pub mod nested;
pub mod process;
pub mod sdk;

use crate::core::config::AdapterSettings;
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

pub use cli::CliAdapter;
pub use nested::{HostSession, NestedSessionAdapter};
pub use sdk::SdkAdapter;

/// Execution backend for recipe steps.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Run an agent step and return its text output.
    fn execute_agent_step(
        &self,
        prompt: &str,
        agent_name: Option<&str>,
        agent_system_prompt: Option<&str>,
        mode: Option<&str>,
        working_dir: &Path,
    ) -> Result<String>;

    /// Run a bash step and return its stdout.
    fn execute_bash_step(&self, command: &str, working_dir: &Path, timeout: u64) -> Result<String> {
        process::run_bash(command, working_dir, timeout)
    }
}

/// Backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    Sdk,
    Cli,
    Nested,
}

impl FromStr for AdapterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sdk" => Ok(Self::Sdk),
            "cli" => Ok(Self::Cli),
            "nested" => Ok(Self::Nested),
            other => Err(Error::Config(format!(
                "unknown adapter '{}' (expected sdk, cli or nested)",
                other
            ))),
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sdk => write!(f, "sdk"),
            Self::Cli => write!(f, "cli"),
            Self::Nested => write!(f, "nested"),
        }
    }
}

/// Read-only view of the environment. Injected so selection is testable.
pub trait EnvProbe {
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvProbe for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvProbe for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Merge an agent definition and task prompt into one prompt.
pub fn enrich_prompt(prompt: &str, system_prompt: Option<&str>, mode: Option<&str>) -> String {
    let mut enriched = match system_prompt.map(str::trim) {
        Some(system) if !system.is_empty() => format!("{}\n\n---\n\n{}", system, prompt),
        _ => prompt.to_string(),
    };
    if let Some(mode) = mode.filter(|m| !m.trim().is_empty()) {
        enriched.push_str(&format!("\n\nMode: {}", mode.trim()));
    }
    enriched
}

/// Pick a backend.
///
/// Order: explicit preference, then the nested host session when its marker
/// is set, then the first available of SDK and CLI, then CLI regardless.
pub fn select_adapter(
    preference: Option<AdapterKind>,
    probe: &dyn EnvProbe,
    settings: &AdapterSettings,
    host_session: Option<Arc<dyn HostSession>>,
) -> Result<Box<dyn Adapter>> {
    let marker = probe
        .var(&settings.nested_marker)
        .is_some_and(|v| !v.is_empty());

    match preference {
        Some(AdapterKind::Nested) => {
            let session = host_session.ok_or_else(|| {
                Error::Config("nested adapter requested but no host session is attached".into())
            })?;
            Ok(Box::new(NestedSessionAdapter::new(session, marker)))
        }
        Some(AdapterKind::Sdk) => Ok(Box::new(SdkAdapter::from_settings(settings, probe))),
        Some(AdapterKind::Cli) => Ok(Box::new(CliAdapter::from_settings(settings))),
        None => {
            match (marker, host_session) {
                (true, Some(session)) => {
                    tracing::info!("nested host session detected");
                    return Ok(Box::new(NestedSessionAdapter::new(session, true)));
                }
                (true, None) => tracing::debug!(
                    marker = %settings.nested_marker,
                    "nested marker set but no host session attached, falling through"
                ),
                _ => {}
            }
            let sdk = SdkAdapter::from_settings(settings, probe);
            if sdk.is_available() {
                return Ok(Box::new(sdk));
            }
            let cli = CliAdapter::from_settings(settings);
            if !cli.is_available() {
                tracing::warn!(
                    binary = %settings.cli_binary,
                    "no adapter available; agent steps will fail"
                );
            }
            Ok(Box::new(cli))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoSession;

    impl HostSession for EchoSession {
        fn submit(&self, prompt: &str, _working_dir: &Path) -> Result<String> {
            Ok(format!("session:{}", prompt))
        }
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn settings() -> AdapterSettings {
        AdapterSettings {
            cli_binary: "/nonexistent/galley-agent-cli".to_string(),
            ..AdapterSettings::default()
        }
    }

    #[test]
    fn test_gl021_kind_from_str() {
        assert_eq!("sdk".parse::<AdapterKind>().unwrap(), AdapterKind::Sdk);
        assert_eq!(" CLI ".parse::<AdapterKind>().unwrap(), AdapterKind::Cli);
        assert_eq!("nested".parse::<AdapterKind>().unwrap(), AdapterKind::Nested);
        assert!("docker".parse::<AdapterKind>().is_err());
        assert_eq!(AdapterKind::Nested.to_string(), "nested");
    }

    #[test]
    fn test_gl021_enrich_prompt() {
        assert_eq!(enrich_prompt("task", None, None), "task");
        assert_eq!(enrich_prompt("task", Some("  "), None), "task");
        let e = enrich_prompt("task", Some("You review code.\n"), Some("analyze"));
        assert_eq!(e, "You review code.\n\n---\n\ntask\n\nMode: analyze");
    }

    #[test]
    fn test_gl021_explicit_preference_wins() {
        let s = settings();
        let probe = env(&[(s.nested_marker.as_str(), "1")]);
        let session: Arc<dyn HostSession> = Arc::new(EchoSession);
        let a = select_adapter(Some(AdapterKind::Cli), &probe, &s, Some(session)).unwrap();
        assert_eq!(a.name(), "cli");
    }

    #[test]
    fn test_gl021_nested_auto_detected() {
        let s = settings();
        let probe = env(&[(s.nested_marker.as_str(), "1"), (s.sdk.api_key_env.as_str(), "k")]);
        let a = select_adapter(None, &probe, &s, Some(Arc::new(EchoSession))).unwrap();
        assert_eq!(a.name(), "nested");
        let out = a
            .execute_agent_step("hi", None, None, None, &std::env::temp_dir())
            .unwrap();
        assert_eq!(out, "session:hi");
    }

    #[test]
    fn test_gl021_marker_without_session_falls_through() {
        let s = settings();
        let probe = env(&[(s.nested_marker.as_str(), "1"), (s.sdk.api_key_env.as_str(), "k")]);
        let a = select_adapter(None, &probe, &s, None).unwrap();
        assert_eq!(a.name(), "sdk");
    }

    #[test]
    fn test_gl021_session_without_marker_not_auto_selected() {
        let s = settings();
        let a = select_adapter(None, &env(&[]), &s, Some(Arc::new(EchoSession))).unwrap();
        assert_eq!(a.name(), "cli");
    }

    #[test]
    fn test_gl021_sdk_when_key_present() {
        let s = settings();
        let probe = env(&[(s.sdk.api_key_env.as_str(), "secret")]);
        let a = select_adapter(None, &probe, &s, None).unwrap();
        assert_eq!(a.name(), "sdk");
        assert!(a.is_available());
    }

    #[test]
    fn test_gl021_cli_fallback_when_nothing_available() {
        let s = settings();
        let a = select_adapter(None, &env(&[]), &s, None).unwrap();
        assert_eq!(a.name(), "cli");
        assert!(!a.is_available());
    }

    #[test]
    fn test_gl021_explicit_nested_without_session_is_config_error() {
        let s = settings();
        let Err(err) = select_adapter(Some(AdapterKind::Nested), &env(&[]), &s, None) else {
            panic!("nested without a session must not select an adapter");
        };
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_gl021_bash_shared_by_adapters() {
        let s = settings();
        let a = select_adapter(None, &env(&[]), &s, None).unwrap();
        let out = a
            .execute_bash_step("echo shared", &std::env::temp_dir(), 10)
            .unwrap();
        assert_eq!(out.trim(), "shared");
    }
}
