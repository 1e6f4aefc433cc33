//! Risk scoring.
//!
//! The score is the sum of rule points with a severity floor: additive
//! points express many weak signals stacking up, while the floor
//! guarantees that a single critical finding dominates the
//! sub-threshold band on its own. The result is clamped to 0..=100 so
//! the score has a fixed range.

use crate::report::model::ScanFinding;
use crate::rules::pack::{RulePack, Severity};

pub const MAX_RISK_SCORE: u32 = 100;

/// `clamp(max(Σ scores, severity_floor), 0, 100)`.
///
/// Per-rule points come from the pack; a finding whose rule is missing
/// from the pack contributes no points but still counts toward the
/// floor.
pub fn risk_score(findings: &[ScanFinding], pack: &RulePack) -> u32 {
    let sum: u32 = findings
        .iter()
        .filter_map(|f| pack.rule(&f.rule_id))
        .map(|r| r.score)
        .sum();

    let floor = findings
        .iter()
        .map(|f| f.severity.floor())
        .max()
        .unwrap_or(0);

    sum.max(floor).min(MAX_RISK_SCORE)
}

/// Highest severity among findings, if any.
pub fn highest_severity(findings: &[ScanFinding]) -> Option<Severity> {
    findings.iter().map(|f| f.severity).max()
}
