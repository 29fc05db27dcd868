use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;
use crate::types::{Phase, PhaseState};

// ── Stages ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AuditStage {
    Start,
    PreConsentCaptured,
    BannerEvaluated,
    AcceptBranchDone,
    NoBanner,
    BrowserReset,
    RejectBranchDone,
    Finalized,
}

impl AuditStage {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStage::Start => "start",
            AuditStage::PreConsentCaptured => "pre_consent_captured",
            AuditStage::BannerEvaluated => "banner_evaluated",
            AuditStage::AcceptBranchDone => "accept_branch_done",
            AuditStage::NoBanner => "no_banner",
            AuditStage::BrowserReset => "browser_reset",
            AuditStage::RejectBranchDone => "reject_branch_done",
            AuditStage::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for AuditStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageRecord {
    pub stage: AuditStage,
    pub at: String,
}

// ── Detection ──

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UrlInfo {
    pub requested_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CcmDetection {
    pub banner_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    /// Registry key of the detected provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessibility: Option<AccessibilityReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementStatus {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    pub is_clickable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Whether the page can be used before consent is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AccessibilityReport {
    pub can_scroll: bool,
    pub can_interact: bool,
    pub is_accessible: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub elements: Vec<ElementStatus>,
}

// ── Sample links ──

/// An outbound link chosen on the landing page, as plain data.
///
/// Re-resolved against the live DOM by `href` + `text` in every session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SampleLink {
    pub href: String,
    pub text: String,
    pub opens_new_tab: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SampleLinks(pub Vec<SampleLink>);

impl SampleLinks {
    pub fn iter(&self) -> std::slice::Iter<'_, SampleLink> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ── Consent flows ──

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConsentKind {
    Accept,
    Reject,
}

impl ConsentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentKind::Accept => "accept",
            ConsentKind::Reject => "reject",
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            ConsentKind::Accept => Phase::PostAccept,
            ConsentKind::Reject => Phase::PostReject,
        }
    }
}

impl std::fmt::Display for ConsentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of clicking a consent control.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsentAction {
    pub action: ConsentKind,
    pub performed: bool,
    pub succeeded: bool,
    pub button_found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConsentAction {
    pub fn not_performed(action: ConsentKind) -> Self {
        Self {
            action,
            performed: false,
            succeeded: false,
            button_found: false,
            button_id: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    SameWindow,
    NewTab,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionResult {
    pub element_text: String,
    pub href: String,
    pub opens_new_tab: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_click_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landed_on_url: Option<String>,
    pub interaction_type: InteractionType,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InteractionResult {
    pub fn for_link(link: &SampleLink) -> Self {
        Self {
            element_text: link.text.clone(),
            href: link.href.clone(),
            opens_new_tab: link.opens_new_tab,
            before_click_url: None,
            landed_on_url: None,
            interaction_type: if link.opens_new_tab {
                InteractionType::NewTab
            } else {
                InteractionType::SameWindow
            },
            success: false,
            error: None,
        }
    }
}

/// One consent branch: the click, the replayed links and the captured state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsentFlow {
    pub consent: ConsentAction,
    #[serde(default)]
    pub sample_links: SampleLinks,
    #[serde(default)]
    pub interactions: Vec<InteractionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_state: Option<PhaseState>,
}

impl ConsentFlow {
    pub fn new(action: ConsentKind) -> Self {
        Self {
            consent: ConsentAction::not_performed(action),
            sample_links: SampleLinks::default(),
            interactions: Vec::new(),
            final_state: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.consent.performed && self.interactions.is_empty() && self.final_state.is_none()
    }
}

// ── Audit result ──

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditResult {
    pub audit_id: String,
    pub url_info: UrlInfo,
    pub ccm_detection: CcmDetection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_landing: Option<PhaseState>,
    pub accept_flow: ConsentFlow,
    pub reject_flow: ConsentFlow,
    pub stage: AuditStage,
    #[serde(default)]
    pub stages: Vec<StageRecord>,
    #[serde(default)]
    pub errors: Vec<ErrorInfo>,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

impl AuditResult {
    pub fn new(audit_id: &str, requested_url: &str) -> Self {
        let now = crate::now_rfc3339();
        Self {
            audit_id: audit_id.to_string(),
            url_info: UrlInfo {
                requested_url: requested_url.to_string(),
                ..Default::default()
            },
            ccm_detection: CcmDetection::default(),
            page_landing: None,
            accept_flow: ConsentFlow::new(ConsentKind::Accept),
            reject_flow: ConsentFlow::new(ConsentKind::Reject),
            stage: AuditStage::Start,
            stages: vec![StageRecord {
                stage: AuditStage::Start,
                at: now.clone(),
            }],
            errors: Vec::new(),
            started_at: now,
            completed_at: None,
        }
    }

    pub fn phase_state(&self, phase: Phase) -> Option<&PhaseState> {
        match phase {
            Phase::PreConsent => self.page_landing.as_ref(),
            Phase::PostAccept => self.accept_flow.final_state.as_ref(),
            Phase::PostReject => self.reject_flow.final_state.as_ref(),
        }
    }

    pub fn flow(&self, kind: ConsentKind) -> &ConsentFlow {
        match kind {
            ConsentKind::Accept => &self.accept_flow,
            ConsentKind::Reject => &self.reject_flow,
        }
    }

    pub fn flow_mut(&mut self, kind: ConsentKind) -> &mut ConsentFlow {
        match kind {
            ConsentKind::Accept => &mut self.accept_flow,
            ConsentKind::Reject => &mut self.reject_flow,
        }
    }

    pub fn has_fatal_error(&self) -> bool {
        self.errors.iter().any(|e| e.fatal)
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
