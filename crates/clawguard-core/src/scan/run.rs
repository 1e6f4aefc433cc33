//! The scanner: signal extraction, rule evaluation, deduplication,
//! scoring.
//!
//! `scan_bundle` is a pure function of `(bundle, rule_pack)`; the
//! ordering guarantees of the extractor and the rule engine make its
//! output byte-for-byte reproducible.

use std::collections::HashSet;

use crate::bundle::model::SkillBundle;
use crate::report::model::{ScanFinding, ScanReport};
use crate::rules::eval::evaluate_rules;
use crate::rules::pack::RulePack;
use crate::scan::score::risk_score;
use crate::signals::extract::extract_signals;

/// Scan a bundle with a rule pack.
pub fn scan_bundle(bundle: &SkillBundle, pack: &RulePack) -> ScanReport {
    let signals = extract_signals(bundle);
    let raw = evaluate_rules(pack, &signals);
    let findings = dedupe(raw);
    let score = risk_score(&findings, pack);
    ScanReport::new(score, findings)
}

/// Drop findings that repeat an already-seen `(rule, file, line,
/// column, evidence)` tuple, keeping the first occurrence.
fn dedupe(findings: Vec<ScanFinding>) -> Vec<ScanFinding> {
    let mut seen = HashSet::new();
    findings
        .into_iter()
        .filter(|f| seen.insert(f.dedupe_key()))
        .collect()
}
