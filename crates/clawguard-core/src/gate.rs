//! The decision composer: risk score → install action, and trust-mode
//! stance composition.
//!
//! The stance is what turns a base policy into the runtime posture for
//! a bundle. Untrusted is the default and is strictly tighter: every
//! elevated tool is sandbox-only, `system_exec` is denied outright,
//! and the scan thresholds are lower. Trusted loosens that, but only
//! for bundles whose trust status actually is trusted; a trusted
//! request for an unpinned bundle silently degrades to untrusted and
//! reports the effective mode.

use serde::{Deserialize, Serialize};

use crate::policy::model::{Action, Policy, Thresholds, ToolPolicy};
use crate::trust::TrustStatus;

/// Requested runtime stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Untrusted,
    Trusted,
}

/// Scan thresholds with both values resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveThresholds {
    pub scan_approve_at: u32,
    pub scan_deny_at: u32,
}

const UNTRUSTED_THRESHOLDS: EffectiveThresholds = EffectiveThresholds {
    scan_approve_at: 30,
    scan_deny_at: 60,
};

const TRUSTED_THRESHOLDS: EffectiveThresholds = EffectiveThresholds {
    scan_approve_at: 40,
    scan_deny_at: 80,
};

/// A composed stance: the policy to evaluate tool calls under, the
/// thresholds for the install gate, and the mode that actually took
/// effect.
#[derive(Debug, Clone)]
pub struct Stance {
    pub policy: Policy,
    pub thresholds: EffectiveThresholds,
    pub mode_effective: Mode,
}

/// Compose the stance for a bundle.
///
/// Trusted mode is honored only when `trust` is
/// [`TrustStatus::Trusted`]; otherwise the composer falls back to the
/// untrusted stance.
pub fn compose_stance(base: &Policy, requested: Mode, trust: TrustStatus) -> Stance {
    let effective = match (requested, trust) {
        (Mode::Trusted, TrustStatus::Trusted) => Mode::Trusted,
        _ => Mode::Untrusted,
    };

    let mut policy = base.clone();
    let tool = policy.tool.get_or_insert_with(ToolPolicy::default);

    match effective {
        Mode::Untrusted => {
            tool.sandbox_only = Some(vec![
                "system_*".to_string(),
                "browser_*".to_string(),
                "workflow_tool".to_string(),
            ]);
            let denylist = tool.denylist.get_or_insert_with(Vec::new);
            if !denylist.iter().any(|t| t == "system_exec") {
                denylist.push("system_exec".to_string());
            }
            tool.elevated_requires_approval = Some(true);
        }
        Mode::Trusted => {
            tool.sandbox_only = Some(Vec::new());
            if let Some(denylist) = tool.denylist.as_mut() {
                denylist.retain(|t| t != "system_exec");
            }
            tool.elevated_requires_approval = Some(true);
        }
    }

    let defaults = match effective {
        Mode::Untrusted => UNTRUSTED_THRESHOLDS,
        Mode::Trusted => TRUSTED_THRESHOLDS,
    };
    let thresholds = resolve_thresholds(base.thresholds.as_ref(), defaults);
    policy.thresholds = Some(Thresholds {
        scan_approve_at: Some(thresholds.scan_approve_at),
        scan_deny_at: Some(thresholds.scan_deny_at),
    });

    Stance {
        policy,
        thresholds,
        mode_effective: effective,
    }
}

/// Explicit policy thresholds win over the mode defaults.
fn resolve_thresholds(
    configured: Option<&Thresholds>,
    defaults: EffectiveThresholds,
) -> EffectiveThresholds {
    EffectiveThresholds {
        scan_approve_at: configured
            .and_then(|t| t.scan_approve_at)
            .unwrap_or(defaults.scan_approve_at),
        scan_deny_at: configured
            .and_then(|t| t.scan_deny_at)
            .unwrap_or(defaults.scan_deny_at),
    }
}

/// Map a risk score to an install action.
pub fn install_action(risk_score: u32, thresholds: EffectiveThresholds) -> Action {
    if risk_score >= thresholds.scan_deny_at {
        Action::Deny
    } else if risk_score >= thresholds.scan_approve_at {
        Action::NeedsApproval
    } else {
        Action::Allow
    }
}
