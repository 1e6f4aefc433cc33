//! The tool-call policy evaluator.
//!
//! A single pass with strict precedence: tool deny-list, tool
//! allow-list, exec checks, path checks, URL checks, sandbox-only
//! patterns, elevated gate, allow. The evaluator never fails on bad
//! policy input: malformed regexes and unparseable fragments are
//! skipped with no effect, so a decision is always produced.

use regex::Regex;
use tracing::debug;
use url::Url;

use crate::policy::model::{Action, Decision, DecisionReason, Policy, ToolCall};

const DEFAULT_PATH_DENY: &[&str] = &[
    ".ssh",
    "id_rsa",
    "keychain",
    "Keychains",
    "Cookies",
    ".env",
    "AWS_SECRET_ACCESS_KEY",
    "GITHUB_TOKEN",
];

const DEFAULT_URL_DENY_SCHEMES: &[&str] = &["file", "data", "javascript"];

const DEFAULT_URL_DENY_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "169.254.169.254"];

const SANDBOX_MITIGATIONS: &[&str] = &[
    "execute inside an isolated sandbox with no credential access",
    "restrict network egress to explicitly allowed hosts",
];

/// Policy with every field concrete; defaults injected once here, not
/// looked up at match time.
struct EffectivePolicy {
    allowlist: Vec<String>,
    denylist: Vec<String>,
    elevated_requires_approval: bool,
    sandbox_only: Vec<String>,
    allow_cmds: Vec<String>,
    deny_cmds: Vec<String>,
    deny_patterns: Vec<String>,
    path_deny: Vec<String>,
    allow_domains: Vec<String>,
    deny_domains: Vec<String>,
    deny_schemes: Vec<String>,
}

impl EffectivePolicy {
    fn new(policy: &Policy) -> Self {
        let tool = policy.tool.clone().unwrap_or_default();
        let exec = policy.exec.clone().unwrap_or_default();
        let paths = policy.paths.clone().unwrap_or_default();
        let urls = policy.urls.clone().unwrap_or_default();

        Self {
            allowlist: tool.allowlist.unwrap_or_default(),
            denylist: tool.denylist.unwrap_or_default(),
            elevated_requires_approval: tool.elevated_requires_approval.unwrap_or(false),
            sandbox_only: tool.sandbox_only.unwrap_or_default(),
            allow_cmds: exec.allow_cmds.unwrap_or_default(),
            deny_cmds: exec.deny_cmds.unwrap_or_default(),
            deny_patterns: exec.deny_patterns.unwrap_or_default(),
            path_deny: paths
                .deny
                .unwrap_or_else(|| DEFAULT_PATH_DENY.iter().map(|s| s.to_string()).collect()),
            allow_domains: urls.allow_domains.unwrap_or_default(),
            deny_domains: urls.deny_domains.unwrap_or_else(|| {
                DEFAULT_URL_DENY_DOMAINS.iter().map(|s| s.to_string()).collect()
            }),
            deny_schemes: urls.deny_schemes.unwrap_or_else(|| {
                DEFAULT_URL_DENY_SCHEMES.iter().map(|s| s.to_string()).collect()
            }),
        }
    }
}

/// Evaluate one tool call against a policy.
pub fn evaluate(call: &ToolCall, policy: &Policy) -> Decision {
    let p = EffectivePolicy::new(policy);
    let tool = call.tool_name.as_str();

    // 1. Tool deny-list.
    if p.denylist.iter().any(|t| t == tool) {
        return Decision::deny(DecisionReason::new("tool_denylist").with_detail(tool));
    }

    // 2. Tool allow-list.
    if !p.allowlist.is_empty() && !p.allowlist.iter().any(|t| t == tool) {
        return Decision::deny(DecisionReason::new("tool_not_allowlisted").with_detail(tool));
    }

    // 3. Exec checks.
    if tool == "system_exec" {
        if let Some(decision) = check_exec(call, &p) {
            return decision;
        }
    }

    // 4. Path checks.
    if tool == "system_read_file" || tool == "system_write_file" {
        if let Some(decision) = check_path(call, &p) {
            return decision;
        }
    }

    // 5. URL checks.
    if tool.starts_with("browser_") || tool == "system_exec" {
        if let Some(decision) = check_url(call, &p) {
            return decision;
        }
    }

    // 6. Sandbox-only patterns.
    if p.sandbox_only.iter().any(|pat| pattern_matches(pat, tool)) {
        let mut decision = Decision::new(
            Action::SandboxOnly,
            DecisionReason::new("tool_sandbox_only").with_detail(tool),
        );
        decision.suggested_mitigations =
            Some(SANDBOX_MITIGATIONS.iter().map(|s| s.to_string()).collect());
        return decision;
    }

    // 7. Elevated gate.
    if is_elevated(tool) && p.elevated_requires_approval {
        return Decision::new(
            Action::NeedsApproval,
            DecisionReason::new("elevated_requires_approval").with_detail(tool),
        );
    }

    Decision::allow()
}

fn is_elevated(tool: &str) -> bool {
    tool.starts_with("system_") || tool.starts_with("browser_") || tool == "workflow_tool"
}

fn check_exec(call: &ToolCall, p: &EffectivePolicy) -> Option<Decision> {
    let cmd = call.arg_str("cmd").unwrap_or_default().trim();
    let base = cmd_basename(cmd);

    if !base.is_empty() {
        if p.deny_cmds.iter().any(|c| c == base) {
            return Some(Decision::deny(
                DecisionReason::new("exec_cmd_denied").with_evidence(base),
            ));
        }
        if !p.allow_cmds.is_empty() && !p.allow_cmds.iter().any(|c| c == base) {
            return Some(Decision::deny(
                DecisionReason::new("exec_cmd_not_allowlisted").with_evidence(base),
            ));
        }
    }

    let mut joined = cmd.to_string();
    for arg in call.arg_list("args") {
        joined.push(' ');
        joined.push_str(&arg);
    }

    for pattern in &p.deny_patterns {
        let Ok(re) = Regex::new(pattern) else {
            debug!(pattern = %pattern, "invalid exec deny pattern ignored");
            continue;
        };
        if re.is_match(&joined) {
            return Some(Decision::deny(
                DecisionReason::new("exec_pattern_denied")
                    .with_detail(pattern.as_str())
                    .with_evidence(clip(&joined)),
            ));
        }
    }

    if has_shell_operators(&joined) {
        return Some(Decision::deny(
            DecisionReason::new("exec_shell_operators").with_evidence(clip(&joined)),
        ));
    }

    None
}

/// Basename semantics for command comparisons: trim, then take the
/// final path segment.
fn cmd_basename(cmd: &str) -> &str {
    cmd.trim().rsplit(['/', '\\']).next().unwrap_or("")
}

fn has_shell_operators(joined: &str) -> bool {
    joined.contains(['|', ';', '&', '>', '<', '`']) || joined.contains("$(")
}

fn check_path(call: &ToolCall, p: &EffectivePolicy) -> Option<Decision> {
    let path = call.arg_str("path")?;
    for deny in &p.path_deny {
        if path.contains(deny.as_str()) {
            return Some(Decision::deny(
                DecisionReason::new("path_denied")
                    .with_detail(deny.as_str())
                    .with_evidence(clip(path)),
            ));
        }
    }
    None
}

fn check_url(call: &ToolCall, p: &EffectivePolicy) -> Option<Decision> {
    let raw = call.arg_str("url")?;

    let Ok(url) = Url::parse(raw) else {
        return Some(Decision::deny(
            DecisionReason::new("url_invalid").with_evidence(clip(raw)),
        ));
    };

    let scheme = url.scheme().to_ascii_lowercase();
    if p.deny_schemes.iter().any(|s| s.eq_ignore_ascii_case(&scheme)) {
        return Some(Decision::deny(
            DecisionReason::new("url_scheme_denied")
                .with_detail(scheme.as_str())
                .with_evidence(clip(raw)),
        ));
    }

    let host = normalize_host(url.host_str().unwrap_or_default());
    if !host.is_empty() {
        if p.deny_domains.iter().any(|d| domain_matches(&host, d)) {
            return Some(Decision::deny(
                DecisionReason::new("url_domain_denied")
                    .with_detail(host.as_str())
                    .with_evidence(clip(raw)),
            ));
        }
        if !p.allow_domains.is_empty() && !p.allow_domains.iter().any(|d| domain_matches(&host, d))
        {
            return Some(Decision::deny(
                DecisionReason::new("url_domain_not_allowlisted")
                    .with_detail(host.as_str())
                    .with_evidence(clip(raw)),
            ));
        }
    }

    None
}

/// Lowercase with the trailing dot stripped.
fn normalize_host(host: &str) -> String {
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Exact match or dot-suffix match against a configured domain.
fn domain_matches(host: &str, domain: &str) -> bool {
    let domain = normalize_host(domain);
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Single trailing `*` gives a prefix match; anything else is exact.
fn pattern_matches(pattern: &str, tool: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => tool.starts_with(prefix),
        None => pattern == tool,
    }
}

fn clip(s: &str) -> String {
    const MAX: usize = 220;
    if s.len() <= MAX {
        return s.to_string();
    }
    let mut end = MAX;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
