//! Rule evaluation over extracted signals.
//!
//! For every `(rule, signal)` pair where the rule's selectors include
//! the signal kind, all regex matches are reported. Findings come out
//! in rule order × signal order × match order, which makes the scanner
//! output a pure function of `(bundle, rule_pack)`.

use regex::Regex;
use tracing::warn;

use crate::report::model::ScanFinding;
use crate::rules::pack::{Rule, RulePack};
use crate::signals::model::ScanSignal;

/// Matched substrings are clipped to this many bytes of evidence.
const EVIDENCE_MAX_BYTES: usize = 220;

/// Evaluate a rule pack against a signal list.
///
/// Rules whose regex fails to compile are skipped; evaluation itself
/// never fails.
pub fn evaluate_rules(pack: &RulePack, signals: &[ScanSignal]) -> Vec<ScanFinding> {
    let mut findings = Vec::new();

    for rule in &pack.rules {
        let Some(re) = compile_rule(rule) else {
            continue;
        };

        for signal in signals {
            if !rule.selectors.contains(&signal.kind) {
                continue;
            }

            for m in re.find_iter(&signal.text) {
                let (local_line, column) = line_and_column(&signal.text, m.start());
                let line = signal.base_line.unwrap_or(1) + local_line - 1;

                findings.push(ScanFinding {
                    rule_id: rule.id.clone(),
                    severity: rule.severity,
                    reason_code: rule.reason_code.clone(),
                    file: signal.file.clone(),
                    line: Some(line),
                    column: Some(column),
                    evidence: clip_evidence(m.as_str()),
                });
            }
        }
    }

    findings
}

/// Compile a rule's regex. The `g` flag is implicit (find_iter walks
/// all matches); `i` selects case-insensitive mode.
fn compile_rule(rule: &Rule) -> Option<Regex> {
    let source = if rule.flags.contains('i') {
        format!("(?i){}", rule.pattern)
    } else {
        rule.pattern.clone()
    };

    match Regex::new(&source) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(rule = %rule.id, error = %e, "rule regex does not compile; skipped");
            None
        }
    }
}

/// 1-based (line, column) of a byte offset within `text`.
fn line_and_column(text: &str, offset: usize) -> (u32, u32) {
    let prefix = &text[..offset];
    let line = prefix.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
    let column = match prefix.rfind('\n') {
        Some(nl) => (offset - nl) as u32,
        None => offset as u32 + 1,
    };
    (line, column)
}

/// Clip evidence to [`EVIDENCE_MAX_BYTES`] on a char boundary.
fn clip_evidence(matched: &str) -> String {
    if matched.len() <= EVIDENCE_MAX_BYTES {
        return matched.to_string();
    }
    let mut end = EVIDENCE_MAX_BYTES;
    while !matched.is_char_boundary(end) {
        end -= 1;
    }
    matched[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::pack::Severity;
    use crate::signals::model::{ScanSignal, SignalKind};

    fn test_rule(id: &str, pattern: &str, selectors: &[SignalKind]) -> Rule {
        Rule {
            id: id.into(),
            title: "test".into(),
            severity: Severity::High,
            reason_code: "test_reason".into(),
            selectors: selectors.to_vec(),
            pattern: pattern.into(),
            flags: "gi".into(),
            score: 10,
        }
    }

    fn pack_of(rules: Vec<Rule>) -> RulePack {
        RulePack {
            pack_id: "test".into(),
            pack_version: "0".into(),
            rules,
        }
    }

    #[test]
    fn selector_gates_signal_kinds() {
        let pack = pack_of(vec![test_rule("T1", "danger", &[SignalKind::Codeblock])]);
        let signals = vec![
            ScanSignal::new(SignalKind::Markdown, "danger here"),
            ScanSignal::new(SignalKind::Codeblock, "danger there"),
        ];

        let findings = evaluate_rules(&pack, &signals);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn all_matches_are_reported() {
        let pack = pack_of(vec![test_rule("T1", "x", &[SignalKind::File])]);
        let signals = vec![ScanSignal::new(SignalKind::File, "x and x and x")];
        assert_eq!(evaluate_rules(&pack, &signals).len(), 3);
    }

    #[test]
    fn matching_is_case_insensitive_by_default() {
        let pack = pack_of(vec![test_rule("T1", "curl", &[SignalKind::File])]);
        let signals = vec![ScanSignal::new(SignalKind::File, "CURL something")];
        assert_eq!(evaluate_rules(&pack, &signals).len(), 1);
    }

    #[test]
    fn line_and_column_are_one_based() {
        let pack = pack_of(vec![test_rule("T1", "bad", &[SignalKind::File])]);
        let signals =
            vec![ScanSignal::new(SignalKind::File, "ok\nstill ok\n  bad thing").in_file("f.md", 1)];

        let findings = evaluate_rules(&pack, &signals);
        assert_eq!(findings[0].line, Some(3));
        assert_eq!(findings[0].column, Some(3));
    }

    #[test]
    fn base_line_offsets_the_reported_line() {
        let pack = pack_of(vec![test_rule("T1", "bad", &[SignalKind::Codeblock])]);
        let signals =
            vec![ScanSignal::new(SignalKind::Codeblock, "fine\nbad").in_file("f.md", 10)];

        let findings = evaluate_rules(&pack, &signals);
        assert_eq!(findings[0].line, Some(11));
    }

    #[test]
    fn evidence_is_clipped_to_220_bytes() {
        let pack = pack_of(vec![test_rule("T1", "a{300}", &[SignalKind::File])]);
        let signals = vec![ScanSignal::new(SignalKind::File, "a".repeat(300))];

        let findings = evaluate_rules(&pack, &signals);
        assert_eq!(findings[0].evidence.len(), 220);
    }

    #[test]
    fn evidence_clip_respects_char_boundaries() {
        // 219 ASCII bytes then a 2-byte char straddling the cut.
        let text = format!("{}é end", "a".repeat(219));
        let pack = pack_of(vec![test_rule("T1", "a+é", &[SignalKind::File])]);
        let signals = vec![ScanSignal::new(SignalKind::File, text)];

        let findings = evaluate_rules(&pack, &signals);
        assert!(findings[0].evidence.len() <= 220);
        assert!(findings[0].evidence.is_char_boundary(findings[0].evidence.len()));
    }

    #[test]
    fn malformed_regex_is_skipped_not_fatal() {
        let pack = pack_of(vec![
            test_rule("T1", "([unclosed", &[SignalKind::File]),
            test_rule("T2", "fine", &[SignalKind::File]),
        ]);
        let signals = vec![ScanSignal::new(SignalKind::File, "fine")];

        let findings = evaluate_rules(&pack, &signals);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "T2");
    }

    #[test]
    fn findings_follow_rule_then_signal_order() {
        let pack = pack_of(vec![
            test_rule("T1", "alpha", &[SignalKind::File]),
            test_rule("T2", "beta", &[SignalKind::File]),
        ]);
        let signals = vec![
            ScanSignal::new(SignalKind::File, "beta alpha"),
            ScanSignal::new(SignalKind::File, "alpha beta"),
        ];

        let findings = evaluate_rules(&pack, &signals);
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T1", "T2", "T2"]);
    }
}
