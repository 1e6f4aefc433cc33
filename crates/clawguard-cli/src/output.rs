//! JSON output shapes for the CLI.
//!
//! Everything printed to stdout is one well-formed JSON object with a
//! trailing newline; logs go to stderr so the two never mix.

use serde::Serialize;

use clawguard_core::bundle::model::{SkillBundle, SourceTag};
use clawguard_core::gate::{EffectiveThresholds, Mode};
use clawguard_core::hash::{content_sha256, manifest_sha256};
use clawguard_core::policy::model::{Action, DecisionReason};
use clawguard_core::report::model::ScanReport;
use clawguard_core::trust::TrustStatus;

/// Audit-oriented bundle summary: identity, hashes, and what ingest
/// had to say, without the full file contents.
#[derive(Debug, Serialize)]
pub struct BundleSummary {
    pub id: String,
    pub source: SourceTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub entrypoint: String,
    pub file_count: usize,
    pub manifest_count: usize,
    pub content_sha256: String,
    pub manifest_sha256: String,
    pub ingest_warnings: Vec<String>,
}

impl BundleSummary {
    pub fn new(bundle: &SkillBundle) -> Self {
        Self {
            id: bundle.id.clone(),
            source: bundle.source,
            version: bundle.version.clone(),
            entrypoint: bundle.entrypoint.clone(),
            file_count: bundle.files.len(),
            manifest_count: bundle.manifest.len(),
            content_sha256: content_sha256(bundle),
            manifest_sha256: manifest_sha256(bundle),
            ingest_warnings: bundle.ingest_warnings.clone(),
        }
    }
}

/// Output of `scan-source`.
#[derive(Debug, Serialize)]
pub struct ScanSourceOutput {
    pub bundle: BundleSummary,
    pub mode_requested: Mode,
    pub mode_effective: Mode,
    pub trust: TrustStatus,
    pub trust_store: String,
    pub action: Action,
    pub policy_thresholds: EffectiveThresholds,
    pub reasons: Vec<DecisionReason>,
    pub report: ScanReport,
}

/// Output of `ingest`: the install action plus a durable receipt.
#[derive(Debug, Serialize)]
pub struct IngestOutput {
    pub action: Action,
    pub receipt: Receipt,
    pub receipt_path: String,
}

#[derive(Debug, Serialize)]
pub struct Receipt {
    pub receipt_version: u32,
    pub created_at: String,
    pub source_input: String,
    pub bundle: BundleSummary,
    pub policy_sha256: String,
    pub scan_report: ScanReport,
}

/// The reason attached to an install action.
pub fn install_reason(action: Action, risk_score: u32, t: EffectiveThresholds) -> DecisionReason {
    match action {
        Action::Deny => DecisionReason::new("scan_score_deny")
            .with_detail(format!("risk_score {risk_score} >= scan_deny_at {}", t.scan_deny_at)),
        Action::NeedsApproval => DecisionReason::new("scan_score_approve").with_detail(format!(
            "risk_score {risk_score} >= scan_approve_at {}",
            t.scan_approve_at
        )),
        _ => DecisionReason::new("scan_score_allow").with_detail(format!(
            "risk_score {risk_score} < scan_approve_at {}",
            t.scan_approve_at
        )),
    }
}
