//! GL-003: Execution context: variable store, template rendering, guards.
//!
//! `{{ name }}` placeholders resolve against the context. Dotted names
//! (`{{result.items.0}}`) index into JSON objects and arrays. Placeholders
//! that do not resolve are left verbatim, so optional variables never abort
//! a long recipe.
//!
//! Bash commands go through `render_shell`, which single-quotes substituted
//! values that contain anything outside a conservative safe set. Write
//! `echo {{x}}`, not `echo "{{x}}"`.

use super::condition::Condition;
use super::error::Result;
use super::types::value_to_string;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").expect("placeholder regex")
});

static SHELL_SAFE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9@%+=:,./_\-]+$").expect("shell-safe regex"));

/// Mutable variable mapping owned by one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    vars: IndexMap<String, Value>,
}

impl Context {
    /// Seed from recipe defaults, then apply caller overrides on top.
    pub fn new(defaults: &IndexMap<String, Value>, overrides: &IndexMap<String, Value>) -> Self {
        let mut vars = defaults.clone();
        for (k, v) in overrides {
            vars.insert(k.clone(), v.clone());
        }
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Resolve a possibly dotted path. An exact top-level key wins over
    /// path traversal.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        if let Some(v) = self.vars.get(path) {
            return Some(v);
        }
        let mut segments = path.split('.');
        let mut current = self.vars.get(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Substitute every resolvable `{{name}}` with its string form.
    pub fn render(&self, template: &str) -> String {
        self.render_with(template, value_to_string)
    }

    /// Like `render`, but shell-quotes each substituted value.
    pub fn render_shell(&self, template: &str) -> String {
        self.render_with(template, |v| shell_quote(&value_to_string(v)))
    }

    fn render_with<F>(&self, template: &str, format: F) -> String
    where
        F: Fn(&Value) -> String,
    {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures| match self.lookup(&caps[1]) {
                Some(v) => format(v),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Evaluate a guard expression against the current variables.
    pub fn evaluate_condition(&self, expr: &str) -> Result<bool> {
        let condition = Condition::parse(expr)?;
        Ok(condition.evaluate(|name| self.lookup(name).map(value_to_string)))
    }

    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.vars.clone()
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.vars
    }
}

/// Names referenced by `{{...}}` placeholders, in order of appearance.
pub fn template_variables(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// POSIX single-quote a value unless it is made of safe characters only.
pub fn shell_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if SHELL_SAFE.is_match(s) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r#"'"'"'"#))
}
