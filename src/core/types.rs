//! GL-001: Recipe, step and result types.
//!
//! Two layers live here: the YAML file schema (`RecipeFile`, `StepSpec`),
//! which mirrors what users write, and the validated model (`Recipe`, `Step`)
//! the parser produces from it. The runner only ever sees the model.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default bash step timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// Recipe file schema (YAML)
// ============================================================================

/// A recipe document as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RecipeFile {
    /// Recipe name (unique within a search scope)
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Default context variables
    #[serde(default)]
    pub context: IndexMap<String, serde_json::Value>,

    /// Ordered steps
    #[serde(default)]
    pub steps: Option<Vec<StepSpec>>,
}

/// A step entry as written on disk. The parser turns this into a `Step`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    #[serde(default)]
    pub id: Option<String>,

    /// `bash` or `agent`; inferred from `agent`/`command` when absent
    #[serde(rename = "type", default)]
    pub step_type: Option<String>,

    #[serde(default)]
    pub command: Option<String>,

    /// Agent reference, `namespace:name`
    #[serde(default)]
    pub agent: Option<String>,

    #[serde(default)]
    pub prompt: Option<String>,

    /// Context variable receiving the step's output
    #[serde(default)]
    pub output: Option<String>,

    /// Guard expression, e.g. `flag == "yes"`
    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub parse_json: bool,

    #[serde(default)]
    pub mode: Option<String>,

    #[serde(default)]
    pub working_dir: Option<String>,

    /// Timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

// ============================================================================
// Validated model
// ============================================================================

/// A parsed, structurally valid recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub tags: BTreeSet<String>,
    pub context: IndexMap<String, serde_json::Value>,
    pub steps: Vec<Step>,
}

impl Recipe {
    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// A single unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub id: String,
    pub action: StepAction,
    pub output: Option<String>,
    pub condition: Option<String>,
    pub parse_json: bool,
    pub mode: Option<String>,
    pub working_dir: Option<String>,
    pub timeout: u64,
}

impl Step {
    pub fn step_type(&self) -> StepType {
        match self.action {
            StepAction::Bash { .. } => StepType::Bash,
            StepAction::Agent { .. } => StepType::Agent,
        }
    }
}

/// What a step does. Each variant carries exactly the fields its type needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Bash {
        command: String,
    },
    Agent {
        agent: String,
        prompt: Option<String>,
    },
}

/// Step type discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepType {
    Bash,
    Agent,
}

impl StepType {
    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bash" => Some(Self::Bash),
            "agent" => Some(Self::Agent),
            _ => None,
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bash => write!(f, "bash"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

// ============================================================================
// Execution results
// ============================================================================

/// Step lifecycle: PENDING → RUNNING → {COMPLETED | SKIPPED | FAILED}.
/// Guarded-out and never-reached steps go PENDING → SKIPPED directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped | Self::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Outcome of one step in one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    pub output: String,
    pub error: String,
}

impl StepResult {
    pub fn pending(step_id: &str) -> Self {
        Self {
            step_id: step_id.to_string(),
            status: StepStatus::Pending,
            output: String::new(),
            error: String::new(),
        }
    }

    pub fn start(&mut self) {
        debug_assert_eq!(self.status, StepStatus::Pending);
        self.status = StepStatus::Running;
    }

    pub fn complete(&mut self, output: String) {
        debug_assert_eq!(self.status, StepStatus::Running);
        self.status = StepStatus::Completed;
        self.output = output;
    }

    pub fn skip(&mut self) {
        debug_assert_eq!(self.status, StepStatus::Pending);
        self.status = StepStatus::Skipped;
    }

    pub fn fail(&mut self, error: String) {
        debug_assert_eq!(self.status, StepStatus::Running);
        self.status = StepStatus::Failed;
        self.error = error;
    }
}

/// Outcome of a whole recipe execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeResult {
    pub recipe_name: String,
    pub success: bool,
    pub step_results: Vec<StepResult>,
    pub context: IndexMap<String, serde_json::Value>,
}

impl RecipeResult {
    pub fn count(&self, status: StepStatus) -> usize {
        self.step_results
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn failed_step(&self) -> Option<&StepResult> {
        self.step_results
            .iter()
            .find(|r| r.status == StepStatus::Failed)
    }
}

// ============================================================================
// Value helper
// ============================================================================

/// String form of a context value, as substituted into templates.
pub fn value_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gl001_recipe_file_parse() {
        let yaml = r#"
name: review
version: "1.2"
tags: [review, ci]
context:
  branch: main
  retries: 3
  strict: true
steps:
  - id: diff
    command: git diff
    output: diff
  - id: analyze
    agent: "amp:reviewer"
    prompt: "Review {{diff}}"
"#;
        let file: RecipeFile = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(file.name.as_deref(), Some("review"));
        assert_eq!(file.context["retries"], serde_json::json!(3));
        assert_eq!(file.context["strict"], serde_json::json!(true));
        let steps = file.steps.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].agent.as_deref(), Some("amp:reviewer"));
        assert!(!steps[0].parse_json);
    }

    #[test]
    fn test_gl001_unknown_field_rejected() {
        let yaml = r#"
name: t
steps:
  - id: a
    comand: echo typo
"#;
        let result: Result<RecipeFile, _> = serde_yaml_ng::from_str(yaml);
        assert!(result.is_err());
    }

    #[test]
    fn test_gl001_step_type_from_name() {
        assert_eq!(StepType::from_name("bash"), Some(StepType::Bash));
        assert_eq!(StepType::from_name(" Agent "), Some(StepType::Agent));
        assert_eq!(StepType::from_name("python"), None);
    }

    #[test]
    fn test_gl001_step_type_display() {
        assert_eq!(StepType::Bash.to_string(), "bash");
        assert_eq!(StepType::Agent.to_string(), "agent");
    }

    #[test]
    fn test_gl001_status_display_and_terminal() {
        assert_eq!(StepStatus::Completed.to_string(), "COMPLETED");
        assert_eq!(StepStatus::Skipped.to_string(), "SKIPPED");
        assert!(!StepStatus::Pending.is_terminal());
        assert!(!StepStatus::Running.is_terminal());
        assert!(StepStatus::Failed.is_terminal());
    }

    #[test]
    fn test_gl001_step_result_transitions() {
        let mut r = StepResult::pending("s1");
        assert_eq!(r.status, StepStatus::Pending);
        r.start();
        assert_eq!(r.status, StepStatus::Running);
        r.complete("out".to_string());
        assert_eq!(r.status, StepStatus::Completed);
        assert_eq!(r.output, "out");
        assert!(r.error.is_empty());

        let mut f = StepResult::pending("s2");
        f.start();
        f.fail("boom".to_string());
        assert_eq!(f.status, StepStatus::Failed);
        assert!(f.output.is_empty());
        assert_eq!(f.error, "boom");
    }

    #[test]
    fn test_gl001_step_type_of_action() {
        let step = Step {
            id: "a".to_string(),
            action: StepAction::Agent {
                agent: "ns:x".to_string(),
                prompt: None,
            },
            output: None,
            condition: None,
            parse_json: false,
            mode: None,
            working_dir: None,
            timeout: DEFAULT_TIMEOUT_SECS,
        };
        assert_eq!(step.step_type(), StepType::Agent);
    }

    #[test]
    fn test_gl001_value_to_string() {
        assert_eq!(value_to_string(&serde_json::json!("hi")), "hi");
        assert_eq!(value_to_string(&serde_json::json!(42)), "42");
        assert_eq!(value_to_string(&serde_json::json!(false)), "false");
        assert_eq!(value_to_string(&serde_json::Value::Null), "");
        assert_eq!(value_to_string(&serde_json::json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_gl001_result_serde() {
        let result = RecipeResult {
            recipe_name: "t".to_string(),
            success: true,
            step_results: vec![StepResult::pending("a")],
            context: IndexMap::new(),
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"pending\""));
        assert!(json.contains("\"recipe_name\":\"t\""));
    }
}
