use ccm_core::{AuditResult, PartyClass, Phase, PhaseState};
use serde::{Deserialize, Serialize};

use crate::interpret::{interpret, Flag, Outlook};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlagResult {
    pub flag: Flag,
    pub value: bool,
    pub meaning: String,
    pub outlook: Outlook,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseCounts {
    pub cookies: usize,
    pub first_party_cookies: usize,
    pub third_party_cookies: usize,
    pub ccm_provider_cookies: usize,
    pub requests: usize,
    pub first_party_requests: usize,
    /// Third-party requests that are not analytics container loads.
    pub third_party_requests: usize,
    pub ccm_provider_requests: usize,
    pub analytics_container_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub label: String,
    /// False when the phase never ran; its flags then describe an empty page.
    pub captured: bool,
    pub counts: PhaseCounts,
    pub flags: Vec<FlagResult>,
}

impl PhaseReport {
    pub fn flag(&self, flag: Flag) -> Option<&FlagResult> {
        self.flags.iter().find(|f| f.flag == flag)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComplianceReport {
    pub audit_id: String,
    pub url: String,
    pub banner_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub phases: Vec<PhaseReport>,
    pub error_count: usize,
    pub fatal: bool,
}

impl ComplianceReport {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseReport> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    /// Flags with a negative outlook, across all phases.
    pub fn negatives(&self) -> impl Iterator<Item = (Phase, &FlagResult)> {
        self.phases.iter().flat_map(|p| {
            p.flags
                .iter()
                .filter(|f| f.outlook == Outlook::Negative)
                .map(move |f| (p.phase, f))
        })
    }
}

fn counts(state: &PhaseState) -> PhaseCounts {
    let mut c = PhaseCounts {
        cookies: state.cookies.len(),
        requests: state.network.requests.len(),
        ..Default::default()
    };
    for cookie in &state.cookies {
        match cookie.classification {
            Some(PartyClass::FirstParty) => c.first_party_cookies += 1,
            Some(PartyClass::ThirdParty) => c.third_party_cookies += 1,
            Some(PartyClass::CcmProvider) => c.ccm_provider_cookies += 1,
            None => {}
        }
    }
    for req in &state.network.requests {
        let class = &req.classification;
        if class.is_first_party {
            c.first_party_requests += 1;
        }
        if class.is_ccm_provider {
            c.ccm_provider_requests += 1;
        }
        if class.is_analytics_container {
            c.analytics_container_requests += 1;
        }
        if req.is_plain_third_party() {
            c.third_party_requests += 1;
        }
    }
    c
}

fn flag(flag: Flag, value: bool, phase: Phase) -> FlagResult {
    let (meaning, outlook) = interpret(flag, value, phase);
    FlagResult {
        flag,
        value,
        meaning: meaning.to_string(),
        outlook,
    }
}

fn phase_report(result: &AuditResult, phase: Phase) -> PhaseReport {
    let state = result.phase_state(phase);
    let c = state.map(counts).unwrap_or_default();

    let mut flags = vec![
        flag(Flag::HasFirstPartyCookies, c.first_party_cookies > 0, phase),
        flag(Flag::HasCcmProviderCookies, c.ccm_provider_cookies > 0, phase),
        flag(Flag::NoThirdPartyCookies, c.third_party_cookies == 0, phase),
        flag(Flag::HasFirstPartyRequests, c.first_party_requests > 0, phase),
        flag(Flag::HasCcmProviderRequests, c.ccm_provider_requests > 0, phase),
        flag(Flag::NoThirdPartyRequests, c.third_party_requests == 0, phase),
        flag(Flag::HasAnalyticsLibraryLoads, c.analytics_container_requests > 0, phase),
    ];
    if phase == Phase::PreConsent {
        if let Some(report) = &result.ccm_detection.accessibility {
            flags.push(flag(Flag::PageInteractable, report.can_interact, phase));
        }
    }

    PhaseReport {
        phase,
        label: phase.label().to_string(),
        captured: state.is_some(),
        counts: c,
        flags,
    }
}

/// Roll up every phase of `result`. Total: phases that never ran are
/// reported as empty.
pub fn analyze(result: &AuditResult) -> ComplianceReport {
    ComplianceReport {
        audit_id: result.audit_id.clone(),
        url: result.url_info.requested_url.clone(),
        banner_found: result.ccm_detection.banner_found,
        provider: result.ccm_detection.provider_name.clone(),
        phases: Phase::ALL.into_iter().map(|p| phase_report(result, p)).collect(),
        error_count: result.errors.len(),
        fatal: result.has_fatal_error(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccm_core::{
        AccessibilityReport, CookieRecord, Initiator, NetworkRequestRecord, RawCookie,
        RequestClassification,
    };

    fn cookie(name: &str, domain: &str, class: PartyClass) -> CookieRecord {
        CookieRecord {
            classification: Some(class),
            ..CookieRecord::from_raw(&RawCookie {
                name: name.into(),
                domain: domain.into(),
                ..Default::default()
            })
        }
    }

    fn request(url: &str, classification: RequestClassification) -> NetworkRequestRecord {
        NetworkRequestRecord {
            request_id: url.into(),
            url: url.into(),
            domain: ccm_core::domain::domain_of_url(url).unwrap_or_default(),
            initiator: Initiator::None,
            timestamp: 0.0,
            classification,
            sets_cookies: Vec::new(),
        }
    }

    fn landing() -> PhaseState {
        let mut state = PhaseState::empty(Phase::PreConsent);
        state.cookies = vec![
            cookie("session", "example.com", PartyClass::FirstParty),
            cookie("_ga", "google-analytics.com", PartyClass::ThirdParty),
        ];
        state.network.requests = vec![
            request(
                "https://www.googletagmanager.com/gtm.js?id=GTM-1",
                RequestClassification::analytics_container("Google Analytics"),
            ),
            request(
                "https://cdn.cookielaw.org/otSDKStub.js",
                RequestClassification::party(PartyClass::CcmProvider),
            ),
        ];
        state
    }

    #[test]
    fn third_party_cookie_before_consent_is_negative() {
        let mut result = AuditResult::new("a", "https://example.com/");
        result.page_landing = Some(landing());
        let report = analyze(&result);
        let pre = report.phase(Phase::PreConsent).unwrap();

        let f = pre.flag(Flag::NoThirdPartyCookies).unwrap();
        assert!(!f.value);
        assert_eq!(f.outlook, Outlook::Negative);
        assert!(pre.flag(Flag::HasFirstPartyCookies).unwrap().value);
        assert!(pre.flag(Flag::HasCcmProviderRequests).unwrap().value);
        assert!(pre.flag(Flag::HasAnalyticsLibraryLoads).unwrap().value);
    }

    #[test]
    fn analytics_container_is_not_a_plain_third_party_request() {
        let mut result = AuditResult::new("a", "https://example.com/");
        result.page_landing = Some(landing());
        let report = analyze(&result);
        let pre = report.phase(Phase::PreConsent).unwrap();
        assert_eq!(pre.counts.analytics_container_requests, 1);
        assert_eq!(pre.counts.third_party_requests, 0);
        assert!(pre.flag(Flag::NoThirdPartyRequests).unwrap().value);
    }

    #[test]
    fn empty_result_is_total() {
        let result = AuditResult::new("a", "https://example.com/");
        let report = analyze(&result);
        assert_eq!(report.phases.len(), 3);
        for phase in &report.phases {
            assert!(!phase.captured);
            assert_eq!(phase.counts, PhaseCounts::default());
            assert!(phase.flags.iter().all(|f| f.outlook != Outlook::Negative));
        }
        assert_eq!(report.negatives().count(), 0);
        assert!(report.phase(Phase::PreConsent).unwrap().flag(Flag::PageInteractable).is_none());
    }

    #[test]
    fn interactable_page_is_flagged() {
        let mut result = AuditResult::new("a", "https://example.com/");
        result.ccm_detection.accessibility = Some(AccessibilityReport {
            can_interact: true,
            is_accessible: true,
            ..Default::default()
        });
        let report = analyze(&result);
        let negatives: Vec<_> = report.negatives().map(|(_, f)| f.flag).collect();
        assert_eq!(negatives, vec![Flag::PageInteractable]);
        assert!(report.phase(Phase::PostAccept).unwrap().flag(Flag::PageInteractable).is_none());
    }
}
