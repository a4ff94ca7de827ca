//! Resume-step decision engine.
//!
//! Maps one [`VersionSnapshot`] onto the linear minor-update procedure. Pure
//! and total: no I/O, no clock, every snapshot produces exactly one plan.

use crate::version::VersionSnapshot;

/// Condition types the update controllers publish while a phase is running.
pub const MINOR_UPDATE_OVN_CONTROLPLANE: &str = "MinorUpdateOVNControlplane";
pub const MINOR_UPDATE_OVN_DATAPLANE: &str = "MinorUpdateOVNDataplane";
pub const MINOR_UPDATE_CONTROLPLANE: &str = "MinorUpdateControlplane";
pub const MINOR_UPDATE_DATAPLANE: &str = "MinorUpdateDataplane";

/// The steps of the documented update procedure a caller can resume at.
/// Numbering matches the runbook; no other number is ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeStep {
    PreUpgradeValidation,
    MonitorOvnControlplane,
    DeployOvnDataplane,
    MonitorControlplane,
    DeployUpdateDataplane,
    UpdateComplete,
}

impl ResumeStep {
    pub fn number(self) -> u8 {
        match self {
            Self::PreUpgradeValidation => 2,
            Self::MonitorOvnControlplane => 4,
            Self::DeployOvnDataplane => 5,
            Self::MonitorControlplane => 7,
            Self::DeployUpdateDataplane => 8,
            Self::UpdateComplete => 10,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::PreUpgradeValidation => "Pre-Upgrade Validation",
            Self::MonitorOvnControlplane => "Monitor OVN Controlplane Deployment",
            Self::DeployOvnDataplane => "Deploy OVN on Dataplane",
            Self::MonitorControlplane => "Monitor Controlplane Update Completion",
            Self::DeployUpdateDataplane => "Deploy Update on Dataplane",
            Self::UpdateComplete => "Update Complete",
        }
    }
}

/// A resume decision plus the sentence justifying it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    pub step: ResumeStep,
    pub explanation: String,
}

/// In-progress phase markers in priority order. Ordering matters: the OVN
/// phases run first in the procedure and their condition names contain the
/// later phases' names as substrings, so matching is by exact equality only.
const CHAIN: [(&str, ResumeStep); 4] = [
    (MINOR_UPDATE_OVN_CONTROLPLANE, ResumeStep::MonitorOvnControlplane),
    (MINOR_UPDATE_OVN_DATAPLANE, ResumeStep::DeployOvnDataplane),
    (MINOR_UPDATE_CONTROLPLANE, ResumeStep::MonitorControlplane),
    (MINOR_UPDATE_DATAPLANE, ResumeStep::DeployUpdateDataplane),
];

/// Decide where to resume the update procedure, first match wins:
///
/// 1. `availableVersion` absent or different from `targetVersion`: the
///    upgrade has not started, step 2.
/// 2. `deployedVersion` equals `targetVersion` with every condition ready:
///    already done, step 10.
/// 3. Otherwise the upgrade is mid-flight: the highest-priority in-progress
///    condition present among `notReadyConditions` picks the step, with a
///    completeness re-check and a conservative step-2 fallback behind it.
pub fn decide_resume_step(snapshot: &VersionSnapshot) -> ResumePlan {
    let target = &snapshot.target_version;
    let not_ready = &snapshot.not_ready_conditions;

    let in_progress = match &snapshot.available_version {
        Some(available) if available == target => available,
        other => {
            let rendered = other.as_deref().unwrap_or("nil");
            return ResumePlan {
                step: ResumeStep::PreUpgradeValidation,
                explanation: format!(
                    "Upgrade not in progress (targetVersion='{target}' != availableVersion='{rendered}'). \
                     Start from Step 2: Pre-Upgrade Validation."
                ),
            };
        }
    };

    let deployed_matches = snapshot.deployed_version.as_deref() == Some(target.as_str());
    if deployed_matches && not_ready.is_empty() {
        let deployed = snapshot.deployed_version.as_deref().unwrap_or_default();
        return ResumePlan {
            step: ResumeStep::UpdateComplete,
            explanation: format!(
                "Upgrade complete (targetVersion='{target}' == deployedVersion='{deployed}' \
                 and all conditions ready). Jump to Step 10: Update Complete."
            ),
        };
    }

    let prefix =
        format!("Upgrade in progress (targetVersion='{target}' == availableVersion='{in_progress}'). ");

    for (name, step) in CHAIN {
        if not_ready.iter().any(|c| c == name) {
            return ResumePlan {
                step,
                explanation: format!(
                    "{prefix}notReadyConditions contains '{name}'. Resume at Step {}: {}.",
                    step.number(),
                    step.title()
                ),
            };
        }
    }

    // Unreachable while the early completeness check stays ahead of the chain.
    if deployed_matches && not_ready.is_empty() {
        return ResumePlan {
            step: ResumeStep::UpdateComplete,
            explanation: format!(
                "{prefix}All conditions ready and targetVersion equals deployedVersion. \
                 Resume at Step 10: Update Complete."
            ),
        };
    }

    // No in-progress prefix on the fallback.
    ResumePlan {
        step: ResumeStep::PreUpgradeValidation,
        explanation: format!(
            "Could not determine specific resume point from notReadyConditions={not_ready:?}. \
             Starting from Step 2: Pre-Upgrade Validation."
        ),
    }
}
