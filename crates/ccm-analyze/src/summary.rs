use ccm_core::{AuditResult, ConsentKind};
use serde::{Deserialize, Serialize};

/// One line per audited URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditSummary {
    pub url: String,
    pub status: Option<u16>,
    pub banner_found: bool,
    pub provider: Option<String>,
    pub accessible: Option<bool>,
    pub accept_successful: bool,
    pub reject_successful: bool,
    pub initial_cookies: usize,
    pub accept_cookies: usize,
    pub reject_cookies: usize,
    pub has_errors: bool,
}

pub fn summarize(result: &AuditResult) -> AuditSummary {
    let cookies = |state: Option<&ccm_core::PhaseState>| state.map_or(0, |s| s.cookies.len());
    AuditSummary {
        url: result.url_info.requested_url.clone(),
        status: result.url_info.status_code,
        banner_found: result.ccm_detection.banner_found,
        provider: result.ccm_detection.provider_name.clone(),
        accessible: result.ccm_detection.accessibility.as_ref().map(|a| a.is_accessible),
        accept_successful: result.flow(ConsentKind::Accept).consent.succeeded,
        reject_successful: result.flow(ConsentKind::Reject).consent.succeeded,
        initial_cookies: cookies(result.page_landing.as_ref()),
        accept_cookies: cookies(result.accept_flow.final_state.as_ref()),
        reject_cookies: cookies(result.reject_flow.final_state.as_ref()),
        has_errors: !result.errors.is_empty(),
    }
}
