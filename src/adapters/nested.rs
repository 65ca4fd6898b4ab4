//! GL-024: Nested host-session adapter.
//!
//! When the engine runs inside an already-active agent session, agent steps
//! go back through that session instead of spawning a second agent process.

use super::{enrich_prompt, Adapter};
use crate::core::error::{Error, Result};
use std::path::Path;
use std::sync::Arc;

/// Handle to the active host session.
pub trait HostSession: Send + Sync {
    fn submit(&self, prompt: &str, working_dir: &Path) -> Result<String>;
}

pub struct NestedSessionAdapter {
    session: Arc<dyn HostSession>,
    marker_present: bool,
}

impl NestedSessionAdapter {
    pub fn new(session: Arc<dyn HostSession>, marker_present: bool) -> Self {
        Self {
            session,
            marker_present,
        }
    }
}

impl Adapter for NestedSessionAdapter {
    fn name(&self) -> &str {
        "nested"
    }

    fn is_available(&self) -> bool {
        self.marker_present
    }

    fn execute_agent_step(
        &self,
        prompt: &str,
        agent_name: Option<&str>,
        agent_system_prompt: Option<&str>,
        mode: Option<&str>,
        working_dir: &Path,
    ) -> Result<String> {
        if !self.is_available() {
            return Err(Error::Unavailable {
                adapter: self.name().to_string(),
                reason: "not running inside a host session".to_string(),
            });
        }
        tracing::debug!(agent = agent_name.unwrap_or("-"), "submitting to host session");
        self.session
            .submit(&enrich_prompt(prompt, agent_system_prompt, mode), working_dir)
    }
}
