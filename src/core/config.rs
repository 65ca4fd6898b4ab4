//! GL-030: Engine configuration.
//!
//! Optional YAML file (`--config`, else `galley.yaml` in the working
//! directory), then environment overrides read through an `EnvProbe`.

use super::error::{Error, Result};
use super::resolver::ReferenceResolver;
use crate::adapters::{AdapterKind, EnvProbe};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "galley.yaml";
pub const ENV_ADAPTER: &str = "GALLEY_ADAPTER";
pub const ENV_RECIPE_PATH: &str = "GALLEY_RECIPE_PATH";
pub const ENV_AGENT_PATH: &str = "GALLEY_AGENT_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Recipe search directories, highest priority first
    pub recipe_dirs: Vec<PathBuf>,
    /// Agent definition search directories, highest priority first
    pub agent_dirs: Vec<PathBuf>,
    pub adapter: AdapterSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            recipe_dirs: vec![PathBuf::from("recipes")],
            agent_dirs: vec![PathBuf::from("agents")],
            adapter: AdapterSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn resolver(&self) -> ReferenceResolver {
        ReferenceResolver::new(self.agent_dirs.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdapterSettings {
    /// Explicit backend; absent means auto-select
    pub preference: Option<AdapterKind>,
    pub cli_binary: String,
    pub agent_timeout_secs: u64,
    /// Environment variable whose presence signals a nested host session
    pub nested_marker: String,
    pub sdk: SdkSettings,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            preference: None,
            cli_binary: "claude".to_string(),
            agent_timeout_secs: 600,
            nested_marker: "GALLEY_HOST_SESSION".to_string(),
            sdk: SdkSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SdkSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for SdkSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 8192,
        }
    }
}

/// Load configuration: explicit file, else `cwd/galley.yaml` if present,
/// else defaults. Environment overrides are applied last.
pub fn load_config(
    explicit: Option<&Path>,
    cwd: &Path,
    probe: &dyn EnvProbe,
) -> Result<EngineConfig> {
    let mut config = match explicit {
        Some(path) => read_config_file(path)?,
        None => {
            let default = cwd.join(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                read_config_file(&default)?
            } else {
                EngineConfig::default()
            }
        }
    };
    apply_env_overrides(&mut config, probe)?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let config: EngineConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    if config.adapter.agent_timeout_secs == 0 {
        return Err(Error::Config(format!(
            "{}: adapter.agent_timeout_secs must be positive",
            path.display()
        )));
    }
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Apply `GALLEY_ADAPTER`, `GALLEY_RECIPE_PATH` and `GALLEY_AGENT_PATH`.
pub fn apply_env_overrides(config: &mut EngineConfig, probe: &dyn EnvProbe) -> Result<()> {
    if let Some(raw) = probe.var(ENV_ADAPTER).filter(|v| !v.trim().is_empty()) {
        config.adapter.preference = if raw.trim().eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(raw.parse()?)
        };
    }
    prepend_paths(&mut config.recipe_dirs, probe.var(ENV_RECIPE_PATH));
    prepend_paths(&mut config.agent_dirs, probe.var(ENV_AGENT_PATH));
    Ok(())
}

fn prepend_paths(dirs: &mut Vec<PathBuf>, raw: Option<String>) {
    if let Some(raw) = raw {
        let mut merged: Vec<PathBuf> = std::env::split_paths(&raw)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        merged.append(dirs);
        *dirs = merged;
    }
}
