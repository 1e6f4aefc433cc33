//! The clawguard rule pack.
//!
//! This module is strictly declarative: each rule is data (id,
//! severity, selectors, regex, score) and contains no evaluation
//! logic. The built-in pack is versioned and its `pack_version` is
//! part of the audit surface; it is frozen at "1" and never
//! renumbered.

use serde::{Deserialize, Serialize};

use crate::signals::model::SignalKind;

/// Severity grades, ordered weakest to strongest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Minimum risk score a finding of this severity forces on a
    /// report.
    pub fn floor(self) -> u32 {
        match self {
            Severity::Low => 10,
            Severity::Medium => 30,
            Severity::High => 60,
            Severity::Critical => 80,
        }
    }
}

/// One data-driven detection rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub reason_code: String,
    /// Signal kinds this rule applies to.
    pub selectors: Vec<SignalKind>,
    /// Regex source text.
    #[serde(rename = "match")]
    pub pattern: String,
    /// Regex flags; `g` is implicit (all matches are reported) and `i`
    /// selects case-insensitive compilation.
    pub flags: String,
    /// Points this rule contributes per report when it fires.
    pub score: u32,
}

/// A versioned set of rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulePack {
    pub pack_id: String,
    pub pack_version: String,
    pub rules: Vec<Rule>,
}

impl RulePack {
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

fn rule(
    id: &str,
    title: &str,
    severity: Severity,
    reason_code: &str,
    selectors: &[SignalKind],
    pattern: &str,
    score: u32,
) -> Rule {
    Rule {
        id: id.to_string(),
        title: title.to_string(),
        severity,
        reason_code: reason_code.to_string(),
        selectors: selectors.to_vec(),
        pattern: pattern.to_string(),
        flags: "gi".to_string(),
        score,
    }
}

const TEXTUAL: &[SignalKind] = &[SignalKind::File, SignalKind::Markdown, SignalKind::Codeblock];
const META: &[SignalKind] = &[SignalKind::Meta];

/// Returns the built-in rule pack.
pub fn default_pack() -> RulePack {
    RulePack {
        pack_id: "clawguard-default".to_string(),
        pack_version: "1".to_string(),
        rules: vec![
            rule(
                "R001",
                "Remote script piped to a shell",
                Severity::Critical,
                "pipe_to_shell",
                TEXTUAL,
                r"(curl|wget)[^|\n]*\|\s*(ba|z)?sh\b",
                60,
            ),
            rule(
                "R002",
                "Base64 payload decoded into a shell",
                Severity::Critical,
                "base64_to_shell",
                TEXTUAL,
                r"base64\s+(-d|-D|--decode)[^|\n]*\|\s*(ba|z)?sh\b",
                60,
            ),
            rule(
                "R003",
                "Reverse shell indicator",
                Severity::Critical,
                "reverse_shell",
                TEXTUAL,
                r"(/dev/tcp/\d|nc\s+(-\w+\s+)*-e\s|ncat\s[^\n]*--exec)",
                60,
            ),
            rule(
                "R004",
                "Recursive deletion of home or root",
                Severity::High,
                "destructive_delete",
                TEXTUAL,
                r"rm\s+-[a-z]*rf?[a-z]*\s+(/|~|\$HOME)",
                40,
            ),
            rule(
                "R005",
                "Credential or secret reference",
                Severity::High,
                "secret_reference",
                TEXTUAL,
                r"(AWS_SECRET_ACCESS_KEY|GITHUB_TOKEN|OPENAI_API_KEY|api[_-]?key\s*[:=]|secret[_-]?key\s*[:=])",
                30,
            ),
            rule(
                "R006",
                "SSH key material reference",
                Severity::High,
                "ssh_material",
                &[
                    SignalKind::File,
                    SignalKind::Markdown,
                    SignalKind::Codeblock,
                    SignalKind::Path,
                ],
                r"(\.ssh/|id_rsa|id_ed25519|authorized_keys)",
                30,
            ),
            rule(
                "R007",
                "Environment file reference",
                Severity::Medium,
                "env_file_reference",
                &[
                    SignalKind::File,
                    SignalKind::Markdown,
                    SignalKind::Codeblock,
                    SignalKind::Path,
                ],
                r"\.env\b",
                15,
            ),
            rule(
                "R008",
                "Prompt injection phrasing",
                Severity::High,
                "prompt_injection",
                &[SignalKind::Markdown, SignalKind::File],
                r"(ignore\s+(all\s+)?(previous|prior)\s+instructions|disregard\s+(your|all)\s+(rules|instructions)|you\s+are\s+now\s+unrestricted)",
                40,
            ),
            rule(
                "R009",
                "Cloud metadata service address",
                Severity::Critical,
                "metadata_service",
                &[
                    SignalKind::Url,
                    SignalKind::File,
                    SignalKind::Markdown,
                    SignalKind::Codeblock,
                ],
                r"169\.254\.169\.254",
                60,
            ),
            rule(
                "R010",
                "Raw IP address URL",
                Severity::Medium,
                "raw_ip_url",
                &[SignalKind::Url],
                r"^https?://\d{1,3}(\.\d{1,3}){3}",
                15,
            ),
            rule(
                "R011",
                "Insecure http URL",
                Severity::Low,
                "insecure_url",
                &[SignalKind::Url],
                r"^http://",
                5,
            ),
            rule(
                "R012",
                "Archive entry escapes the bundle root",
                Severity::Critical,
                "path_traversal",
                META,
                r"^path_traversal_entry\b",
                60,
            ),
            rule(
                "R013",
                "Ingest hit a resource cap",
                Severity::Low,
                "ingest_anomaly",
                META,
                r"^ingest_warning:",
                5,
            ),
            rule(
                "R014",
                "Binary or executable payload in bundle",
                Severity::Medium,
                "binary_payload",
                META,
                r"^(binary_file|executable_file|nested_archive)\b",
                15,
            ),
            rule(
                "R015",
                "Symlink entry in bundle",
                Severity::Medium,
                "symlink_entry",
                META,
                r"^symlink_entry\b",
                15,
            ),
            rule(
                "R016",
                "Long encoded blob",
                Severity::Medium,
                "obfuscated_blob",
                &[SignalKind::Codeblock, SignalKind::File],
                r"[A-Za-z0-9+/]{120,}={0,2}",
                20,
            ),
        ],
    }
}
