//! Policy, tool call, and decision wire types.
//!
//! A policy is a bag of optional sections; absent fields get explicit
//! defaults injected at the evaluator boundary, never looked up at
//! match time. Tool-call arguments are a dynamic map read through
//! permissive accessors for the few fields the evaluator cares about.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PolicyLoadError, ToolCallInputError};
use crate::API_VERSION;

fn default_api_version() -> u32 {
    API_VERSION
}

/// Runtime policy. All sections optional; see the evaluator for the
/// injected defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paths: Option<PathPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<UrlPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            api_version: API_VERSION,
            tool: None,
            exec: None,
            paths: None,
            urls: None,
            thresholds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowlist: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denylist: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevated_requires_approval: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_only: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_cmds: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_cmds: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_domains: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_domains: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny_schemes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_deny_at: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_approve_at: Option<u32>,
}

/// Load a policy from disk. A version other than 1 is a hard error;
/// unknown fields are ignored.
pub fn load_policy(path: &Path) -> Result<Policy, PolicyLoadError> {
    let bytes = fs::read(path)?;
    let policy: Policy = serde_json::from_slice(&bytes)?;
    if policy.api_version != API_VERSION {
        return Err(PolicyLoadError::Version(policy.api_version));
    }
    Ok(policy)
}

/// A proposed tool invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,

    #[serde(default)]
    pub args: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ToolCall {
    /// Get-or-empty string accessor into the args map.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }

    /// The `args` array rendered as strings, empty when absent or not
    /// an array.
    pub fn arg_list(&self, key: &str) -> Vec<String> {
        match self.args.get(key).and_then(|v| v.as_array()) {
            Some(items) => items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Parse a tool call from JSON. Missing or empty `tool_name` is the
/// only schema requirement.
pub fn parse_tool_call(json: &str) -> Result<ToolCall, ToolCallInputError> {
    let call: ToolCall = serde_json::from_str(json)?;
    if call.tool_name.trim().is_empty() {
        return Err(ToolCallInputError::MissingToolName);
    }
    Ok(call)
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Allow,
    Deny,
    NeedsApproval,
    SandboxOnly,
}

impl Action {
    /// Stable process exit code for this action. `sandbox_only` maps
    /// to the approval code on runtime evaluation.
    pub fn exit_code(self) -> i32 {
        match self {
            Action::Allow => 0,
            Action::Deny => 2,
            Action::NeedsApproval | Action::SandboxOnly => 3,
        }
    }
}

/// One explanation attached to a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionReason {
    pub reason_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl DecisionReason {
    pub fn new(reason_code: &str) -> Self {
        Self {
            reason_code: reason_code.to_string(),
            detail: None,
            evidence: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }
}

/// The evaluator's verdict for one tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub api_version: u32,
    pub action: Action,
    pub reasons: Vec<DecisionReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_mitigations: Option<Vec<String>>,
}

impl Decision {
    pub fn new(action: Action, reason: DecisionReason) -> Self {
        Self {
            api_version: API_VERSION,
            action,
            reasons: vec![reason],
            suggested_mitigations: None,
        }
    }

    pub fn allow() -> Self {
        Self::new(Action::Allow, DecisionReason::new("default_allow"))
    }

    pub fn deny(reason: DecisionReason) -> Self {
        Self::new(Action::Deny, reason)
    }
}
