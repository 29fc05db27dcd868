use ccm_core::{
    AnalyticsTag, AuditError, CookieRecord, Phase, PhaseState, ProviderRegistry, ProviderSignature,
};
use ccm_network::{chain, Classifier};
use serde_json::Value;
use tracing::debug;

use crate::config::AuditConfig;
use crate::probe::scripts;
use crate::session::PageSession;

/// Snapshot cookies, analytics globals and the network log of the current
/// visit, classified against the page and the detected platform.
///
/// Partial failures leave that part empty and are pushed onto `errors`.
pub async fn capture_phase(
    session: &mut PageSession,
    phase: Phase,
    registry: &ProviderRegistry,
    provider: Option<&ProviderSignature>,
    config: &AuditConfig,
    errors: &mut Vec<AuditError>,
) -> PhaseState {
    tokio::time::sleep(config.settle_delay()).await;
    let mut state = PhaseState::empty(phase);

    let cookies: Vec<CookieRecord> = match session.browser().all_cookies().await {
        Ok(raw) => raw.iter().map(CookieRecord::from_raw).collect(),
        Err(e) => {
            errors.push(AuditError::Capture(format!("cookies: {e}")));
            Vec::new()
        }
    };

    for (kind, _, js) in scripts::ANALYTICS_GLOBALS {
        match session.browser().execute_script(js, &[]).await {
            Ok(Value::Bool(true)) => state.analytics_tags_detected.push(AnalyticsTag {
                kind: kind.to_string(),
                present: true,
            }),
            Ok(_) => {}
            Err(e) => errors.push(e.into_audit(&format!("{kind} tag check"))),
        }
    }

    let root = session.page_url().to_string();
    let built = match session.network_log().await {
        Ok(log) => chain::build(log, &root),
        Err(e) => {
            errors.push(e);
            chain::ChainBuild::default()
        }
    };
    let (network, parse_errors) = built.into_network();
    if parse_errors > 0 {
        errors.push(AuditError::LogParseFailure(format!(
            "{parse_errors} performance log entries skipped"
        )));
    }

    let page_domain = session.page_domain().to_string();
    let classifier = Classifier::new(registry, &page_domain, provider);
    state.cookies = classifier.classify_cookies(&cookies);
    state.network = classifier.classify_network(&network);
    state.log_parse_errors = parse_errors;

    debug!(
        phase = phase.label(),
        cookies = state.cookies.len(),
        requests = state.network.requests.len(),
        "phase captured"
    );
    state
}
