//! Scan report wire types.
//!
//! `ScanReport` is a stable JSON contract: identical bundles scanned
//! with the same rule pack must serialize identically.

use serde::{Deserialize, Serialize};

use crate::rules::pack::Severity;
use crate::API_VERSION;

/// One rule match with evidence and location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFinding {
    pub rule_id: String,
    pub severity: Severity,
    pub reason_code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,

    /// Matched substring, truncated to 220 bytes.
    pub evidence: String,
}

impl ScanFinding {
    /// Key used for deduplication: two findings with the same key are
    /// the same observation.
    pub fn dedupe_key(&self) -> (String, Option<String>, Option<u32>, Option<u32>, String) {
        (
            self.rule_id.clone(),
            self.file.clone(),
            self.line,
            self.column,
            self.evidence.clone(),
        )
    }
}

/// Result of scanning one bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub api_version: u32,
    /// Risk score in 0..=100.
    pub risk_score: u32,
    pub findings: Vec<ScanFinding>,
}

impl ScanReport {
    pub fn new(risk_score: u32, findings: Vec<ScanFinding>) -> Self {
        Self {
            api_version: API_VERSION,
            risk_score,
            findings,
        }
    }

    pub fn has_rule(&self, rule_id: &str) -> bool {
        self.findings.iter().any(|f| f.rule_id == rule_id)
    }
}
