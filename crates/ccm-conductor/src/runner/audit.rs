//! Consent-flow orchestration for one URL.
//!
//! Stages run strictly in order against a single browser session at a time:
//! capture the landing page, evaluate the banner, run the accept branch,
//! throw the session away, run the reject branch in a fresh one, finalize.
//! Only a failed initial visit ends the run early; every other failure is
//! recorded on the result and the run carries on.

use std::path::PathBuf;
use std::sync::Arc;

use ccm_core::{
    AuditError, AuditResult, AuditStage, ConsentFlow, ConsentKind, ErrorInfo, Phase,
    ProviderRegistry, SampleLinks,
};
use ccm_network::Classifier;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::event_log::{Event, EventLogger};
use crate::browser::BrowserFactory;
use crate::capture::capture_phase;
use crate::config::AuditConfig;
use crate::probe::accessibility::check_accessibility;
use crate::probe::consent::click_consent;
use crate::probe::interactions::replay_links;
use crate::probe::links::{find_sample_links, to_sample_links};
use crate::probe::{detect_banner, DetectedProvider};
use crate::session::PageSession;
use crate::state::machine::transition;
use crate::state::persist::save_result;

/// Fixed namespace UUID for audit ids.
const AUDIT_NS: Uuid = Uuid::from_bytes([
    0xcc, 0x3a, 0x0d, 0x17, 0x00, 0x00, 0x40, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
]);

/// Deterministic audit id per requested URL.
pub fn audit_id(url: &str) -> String {
    Uuid::new_v5(&AUDIT_NS, url.as_bytes()).to_string()
}

pub struct Conductor {
    factory: Arc<dyn BrowserFactory>,
    registry: Arc<ProviderRegistry>,
    config: AuditConfig,
    out_dir: Option<PathBuf>,
}

/// Result under construction plus its event side channel.
struct Run {
    result: AuditResult,
    events: Option<EventLogger>,
    /// Stage errors are attributed to while a branch is running.
    branch: Option<AuditStage>,
}

impl Run {
    fn record(&mut self, event: Event) {
        if let Some(log) = &mut self.events {
            log.record(event);
        }
    }

    fn error_stage(&self) -> AuditStage {
        self.branch.unwrap_or(self.result.stage)
    }

    fn error(&mut self, err: AuditError) {
        let stage = self.error_stage();
        warn!(stage = %stage, error = %err, "audit error");
        self.result.errors.push(ErrorInfo::recoverable(&err, stage));
    }

    fn errors(&mut self, errs: Vec<AuditError>) {
        for err in errs {
            self.error(err);
        }
    }

    fn fatal(&mut self, err: AuditError) {
        let stage = self.error_stage();
        warn!(stage = %stage, error = %err, "audit aborted");
        self.result.errors.push(ErrorInfo::fatal(&err, stage));
    }

    fn advance(&mut self, to: AuditStage) {
        let from = self.result.stage;
        match transition(&mut self.result, from, to) {
            Ok(true) => {
                debug!(from = %from, to = %to, "stage");
                self.record(Event::StageEntered { stage: to });
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "stage transition rejected"),
        }
    }

    fn skip(&mut self, kind: ConsentKind, reason: &str) {
        info!(branch = %kind, reason, "branch skipped");
        self.record(Event::BranchSkipped {
            branch: kind.to_string(),
            reason: reason.to_string(),
        });
    }
}

async fn close(session: PageSession) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "browser session did not quit cleanly");
    }
}

impl Conductor {
    pub fn new(
        factory: Arc<dyn BrowserFactory>,
        registry: Arc<ProviderRegistry>,
        config: AuditConfig,
    ) -> Self {
        Self {
            factory,
            registry,
            config,
            out_dir: None,
        }
    }

    /// Persist results and write the JSONL event log under `out_dir`.
    pub fn with_output(mut self, out_dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(out_dir.into());
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Audit one URL. Never fails: problems end up in `errors` and missing
    /// phase states stay `None`.
    pub async fn create_result(&self, url: &str) -> AuditResult {
        let id = audit_id(url);
        let mut run = Run {
            result: AuditResult::new(&id, url),
            events: self.out_dir.as_deref().map(|dir| EventLogger::new(dir, &id)),
            branch: None,
        };
        run.record(Event::AuditStart {
            url: url.to_string(),
            audit_id: id.clone(),
        });
        info!(url, audit_id = %id, "audit started");

        if let Some(session) = self.landing(&mut run, url).await {
            self.consent_flow(&mut run, session, url).await;
        }
        self.finalize(run)
    }

    /// Launch, visit and capture the pre-consent state. `None` when the
    /// page could not be reached.
    async fn landing(&self, run: &mut Run, url: &str) -> Option<PageSession> {
        let browser = match self.factory.launch().await {
            Ok(b) => b,
            Err(e) => {
                run.fatal(AuditError::NavigationFailure {
                    url: url.to_string(),
                    reason: format!("browser unavailable: {e}"),
                });
                return None;
            }
        };
        let mut session = PageSession::new(browser);
        match session.visit(url, &self.config).await {
            Ok(()) => {}
            Err(err @ AuditError::NavigationFailure { .. }) => {
                run.fatal(err);
                close(session).await;
                return None;
            }
            Err(err) => run.error(err),
        }

        let landed = session.landed_url().await;
        session.set_page_url(&landed);
        run.result.url_info.final_url = Some(landed);
        run.result.url_info.domain = session.page_domain().to_string();

        let mut errs = Vec::new();
        let state = capture_phase(
            &mut session,
            Phase::PreConsent,
            &self.registry,
            None,
            &self.config,
            &mut errs,
        )
        .await;
        run.result.page_landing = Some(state);
        run.errors(errs);
        run.advance(AuditStage::PreConsentCaptured);
        Some(session)
    }

    async fn consent_flow(&self, run: &mut Run, mut session: PageSession, url: &str) {
        let (detected, links) = self.evaluate_banner(run, &mut session).await;
        let Some(provider) = detected else {
            run.advance(AuditStage::NoBanner);
            run.skip(ConsentKind::Accept, "no consent banner detected");
            run.skip(ConsentKind::Reject, "no consent banner detected");
            close(session).await;
            return;
        };

        let flow = self
            .branch(run, &mut session, &provider, ConsentKind::Accept, &links)
            .await;
        run.result.accept_flow = flow;
        run.advance(AuditStage::AcceptBranchDone);

        // Accepted consent cannot be rolled back inside a session.
        close(session).await;
        let Some(mut session) = self.reset(run, url).await else {
            run.skip(ConsentKind::Reject, "browser reset failed");
            return;
        };

        match detect_banner(&mut session, &self.registry, &self.config).await {
            Ok(Some(_)) => {
                let flow = self
                    .branch(run, &mut session, &provider, ConsentKind::Reject, &links)
                    .await;
                run.result.reject_flow = flow;
                run.advance(AuditStage::RejectBranchDone);
            }
            Ok(None) => {
                run.error(AuditError::SessionResetFailure(
                    "consent banner did not reappear after reset".into(),
                ));
                run.skip(ConsentKind::Reject, "banner missing after reset");
            }
            Err(e) => {
                run.error(e);
                run.skip(ConsentKind::Reject, "banner detection failed after reset");
            }
        }
        close(session).await;
    }

    /// Detect the banner, sample links and probe accessibility. The links
    /// are handed to both branches as plain values.
    async fn evaluate_banner(
        &self,
        run: &mut Run,
        session: &mut PageSession,
    ) -> (Option<DetectedProvider>, SampleLinks) {
        let detected = match detect_banner(session, &self.registry, &self.config).await {
            Ok(d) => d,
            Err(e) => {
                run.error(e);
                None
            }
        };

        let banner_ids: &[String] = detected
            .as_ref()
            .map(|d| d.signature.banner_element_ids.as_slice())
            .unwrap_or_default();
        let found = find_sample_links(session, self.config.sample_link_limit, banner_ids).await;
        let mut errs = Vec::new();
        let report = check_accessibility(session, &found, &mut errs).await;
        run.errors(errs);

        let detection = &mut run.result.ccm_detection;
        detection.banner_found = detected.is_some();
        detection.provider_name = detected.as_ref().map(|d| d.signature.provider_name.clone());
        detection.provider_key = detected.as_ref().map(|d| d.key.clone());
        detection.accessibility = Some(report);

        // The landing capture ran before the platform was known.
        if let (Some(d), Some(state)) = (&detected, &mut run.result.page_landing) {
            let classifier =
                Classifier::new(&self.registry, session.page_domain(), Some(&d.signature));
            state.cookies = classifier.classify_cookies(&state.cookies);
            state.network = classifier.classify_network(&state.network);
        }

        run.record(Event::BannerDetected {
            provider: detected.as_ref().map(|d| d.signature.provider_name.clone()),
        });
        info!(
            banner_found = detected.is_some(),
            provider = ?detected.as_ref().map(|d| d.signature.provider_name.as_str()),
            sample_links = found.len(),
            "banner evaluated"
        );
        run.advance(AuditStage::BannerEvaluated);
        (detected, to_sample_links(&found))
    }

    /// Click one consent control, replay links, capture. A failed accept
    /// click skips the replay; reject always replays on the fresh page.
    async fn branch(
        &self,
        run: &mut Run,
        session: &mut PageSession,
        provider: &DetectedProvider,
        kind: ConsentKind,
        links: &SampleLinks,
    ) -> ConsentFlow {
        let mut flow = ConsentFlow::new(kind);
        flow.sample_links = links.clone();
        run.branch = Some(match kind {
            ConsentKind::Accept => AuditStage::AcceptBranchDone,
            ConsentKind::Reject => AuditStage::RejectBranchDone,
        });

        let (action, err) = click_consent(session.browser(), &provider.signature, kind).await;
        run.record(Event::ConsentAction {
            action: kind.to_string(),
            succeeded: action.succeeded,
            button_found: action.button_found,
        });
        if let Some(err) = err {
            run.error(err);
        }

        let mut errs = Vec::new();
        if action.succeeded || kind == ConsentKind::Reject {
            flow.interactions = replay_links(session, links, &self.config, &mut errs).await;
        }
        flow.consent = action;
        flow.final_state = Some(
            capture_phase(
                session,
                kind.phase(),
                &self.registry,
                Some(&provider.signature),
                &self.config,
                &mut errs,
            )
            .await,
        );
        run.errors(errs);
        run.branch = None;
        flow
    }

    /// Fresh session on the same URL. The old one is already closed.
    async fn reset(&self, run: &mut Run, url: &str) -> Option<PageSession> {
        let browser = match self.factory.launch().await {
            Ok(b) => b,
            Err(e) => {
                run.error(AuditError::SessionResetFailure(format!("relaunch: {e}")));
                run.record(Event::SessionReset { ok: false });
                return None;
            }
        };
        run.advance(AuditStage::BrowserReset);
        let mut session = PageSession::new(browser);
        match session.visit(url, &self.config).await {
            Ok(()) => {}
            Err(AuditError::NavigationFailure { reason, .. }) => {
                run.error(AuditError::SessionResetFailure(format!("re-navigation: {reason}")));
                run.record(Event::SessionReset { ok: false });
                close(session).await;
                return None;
            }
            Err(err) => run.error(err),
        }
        let landed = session.landed_url().await;
        session.set_page_url(&landed);
        run.record(Event::SessionReset { ok: true });
        info!("browser session reset");
        Some(session)
    }

    fn finalize(&self, mut run: Run) -> AuditResult {
        run.advance(AuditStage::Finalized);
        let fatal = run.result.has_fatal_error();
        run.record(Event::AuditFinalized {
            errors: run.result.errors.len(),
            fatal,
        });
        if let Some(dir) = &self.out_dir {
            if let Err(e) = save_result(dir, &run.result) {
                warn!(error = %e, "result not saved");
            }
        }
        info!(
            audit_id = %run.result.audit_id,
            errors = run.result.errors.len(),
            fatal,
            "audit finalized"
        );
        run.result
    }
}
