use anyhow::{bail, Result};
use ccm_core::{AuditResult, AuditStage, StageRecord};

// ── Valid transitions ──

const VALID_TRANSITIONS: &[(AuditStage, &[AuditStage])] = &[
    (
        AuditStage::Start,
        &[AuditStage::PreConsentCaptured, AuditStage::Finalized],
    ),
    (
        AuditStage::PreConsentCaptured,
        &[AuditStage::BannerEvaluated, AuditStage::Finalized],
    ),
    (
        AuditStage::BannerEvaluated,
        &[
            AuditStage::AcceptBranchDone,
            AuditStage::NoBanner,
            AuditStage::Finalized,
        ],
    ),
    (
        AuditStage::AcceptBranchDone,
        &[AuditStage::BrowserReset, AuditStage::Finalized],
    ),
    (AuditStage::NoBanner, &[AuditStage::Finalized]),
    (
        AuditStage::BrowserReset,
        &[AuditStage::RejectBranchDone, AuditStage::Finalized],
    ),
    (AuditStage::RejectBranchDone, &[AuditStage::Finalized]),
    // Finalized is terminal
];

pub fn is_valid_transition(from: AuditStage, to: AuditStage) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

// ── CAS-guarded transition ──

/// Move the audit from `from` to `to` and record the stage.
/// Returns Ok(true) on success, Ok(false) on CAS miss (current != from).
pub fn transition(result: &mut AuditResult, from: AuditStage, to: AuditStage) -> Result<bool> {
    if result.stage != from {
        return Ok(false);
    }
    if !is_valid_transition(from, to) {
        bail!("invalid transition: {from} → {to}");
    }
    let at = ccm_core::now_rfc3339();
    result.stage = to;
    result.stages.push(StageRecord {
        stage: to,
        at: at.clone(),
    });
    if to == AuditStage::Finalized {
        result.completed_at = Some(at);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> AuditResult {
        AuditResult::new("id", "https://example.com/")
    }

    #[test]
    fn full_banner_path() {
        let mut r = fresh();
        let path = [
            AuditStage::Start,
            AuditStage::PreConsentCaptured,
            AuditStage::BannerEvaluated,
            AuditStage::AcceptBranchDone,
            AuditStage::BrowserReset,
            AuditStage::RejectBranchDone,
            AuditStage::Finalized,
        ];
        for pair in path.windows(2) {
            assert!(transition(&mut r, pair[0], pair[1]).unwrap());
        }
        let stages: Vec<_> = r.stages.iter().map(|s| s.stage).collect();
        assert_eq!(stages, path);
        assert!(r.completed_at.is_some());
    }

    #[test]
    fn no_banner_path() {
        let mut r = fresh();
        transition(&mut r, AuditStage::Start, AuditStage::PreConsentCaptured).unwrap();
        transition(&mut r, AuditStage::PreConsentCaptured, AuditStage::BannerEvaluated).unwrap();
        assert!(transition(&mut r, AuditStage::BannerEvaluated, AuditStage::NoBanner).unwrap());
        assert!(transition(&mut r, AuditStage::NoBanner, AuditStage::Finalized).unwrap());
    }

    #[test]
    fn cas_miss_leaves_result_untouched() {
        let mut r = fresh();
        assert!(!transition(&mut r, AuditStage::BannerEvaluated, AuditStage::NoBanner).unwrap());
        assert_eq!(r.stage, AuditStage::Start);
        assert_eq!(r.stages.len(), 1);
    }

    #[test]
    fn skipping_ahead_is_rejected() {
        let mut r = fresh();
        assert!(transition(&mut r, AuditStage::Start, AuditStage::AcceptBranchDone).is_err());
        transition(&mut r, AuditStage::Start, AuditStage::Finalized).unwrap();
        assert!(transition(&mut r, AuditStage::Finalized, AuditStage::Start).is_err());
    }

    #[test]
    fn every_stage_can_finalize() {
        for (from, _) in VALID_TRANSITIONS {
            assert!(is_valid_transition(*from, AuditStage::Finalized), "{from}");
        }
    }
}
