//! GL-023: Messages API adapter.
//!
//! POST {base_url}/v1/messages with `x-api-key` and `anthropic-version`
//! headers. The agent definition is merged into the user prompt.

use super::{enrich_prompt, Adapter, EnvProbe};
use crate::core::config::AdapterSettings;
use crate::core::error::{Error, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::time::{Duration, Instant};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct SdkAdapter {
    base_url: String,
    api_key: Option<String>,
    api_key_env: String,
    model: String,
    max_tokens: u32,
    timeout: Duration,
}

impl SdkAdapter {
    pub fn from_settings(settings: &AdapterSettings, probe: &dyn EnvProbe) -> Self {
        let sdk = &settings.sdk;
        Self {
            base_url: sdk.base_url.trim_end_matches('/').to_string(),
            api_key: probe.var(&sdk.api_key_env).filter(|k| !k.trim().is_empty()),
            api_key_env: sdk.api_key_env.clone(),
            model: sdk.model.clone(),
            max_tokens: sdk.max_tokens,
            timeout: Duration::from_secs(settings.agent_timeout_secs),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Adapter {
            adapter: self.name().to_string(),
            message: message.into(),
        }
    }

    /// Request body for one single-turn call.
    pub fn request_body(&self, prompt: &str) -> Value {
        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "user", "content": prompt }
            ]
        })
    }
}

impl Adapter for SdkAdapter {
    fn name(&self) -> &str {
        "sdk"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn execute_agent_step(
        &self,
        prompt: &str,
        agent_name: Option<&str>,
        agent_system_prompt: Option<&str>,
        mode: Option<&str>,
        _working_dir: &Path,
    ) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| Error::Unavailable {
            adapter: self.name().to_string(),
            reason: format!("{} is not set", self.api_key_env),
        })?;

        let url = format!("{}/v1/messages", self.base_url);
        let body = self.request_body(&enrich_prompt(prompt, agent_system_prompt, mode));
        tracing::info!(
            url = %url,
            model = %self.model,
            agent = agent_name.unwrap_or("-"),
            "calling messages api"
        );

        // A timeout past the representable instant range means none.
        let timeout = Instant::now().checked_add(self.timeout).map(|_| self.timeout);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| self.error(format!("failed to build HTTP client: {}", e)))?;

        let response = client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(self.timeout.as_secs())
                } else {
                    self.error(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| self.error(format!("failed to read response body: {}", e)))?;
        if !status.is_success() {
            return Err(self.error(format!("API returned {}: {}", status, text)));
        }

        let json: Value = serde_json::from_str(&text)?;
        extract_text(&json).ok_or_else(|| self.error("response contained no text content"))
    }
}

/// Join the `text` blocks of a Messages API response.
pub fn extract_text(response: &Value) -> Option<String> {
    let blocks = response.get("content")?.as_array()?;
    let texts: Vec<&str> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n"))
    }
}
