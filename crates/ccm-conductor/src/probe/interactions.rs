use std::time::Instant;

use ccm_core::{AuditError, InteractionResult, SampleLink, SampleLinks};
use tracing::{debug, warn};

use super::links::resolve_link;
use crate::browser::{BrowserError, BrowserSession, ElementHandle, WindowHandle};
use crate::config::AuditConfig;
use crate::session::PageSession;

pub const LINK_NOT_FOUND: &str = "link not found in current session";
pub const SAME_WINDOW_FAILED: &str = "Click failed or page load timeout";

/// Follow each sampled link once, in order, and come back to the page.
///
/// Links are looked up again by href and text in this session. Failures
/// are recorded per link and never stop the sequence.
pub async fn replay_links(
    session: &mut PageSession,
    links: &SampleLinks,
    config: &AuditConfig,
    errors: &mut Vec<AuditError>,
) -> Vec<InteractionResult> {
    let mut results = Vec::with_capacity(links.len());
    for link in links.iter() {
        let mut result = InteractionResult::for_link(link);
        result.before_click_url = Some(session.landed_url().await);

        let el = match resolve_link(session.browser(), link).await {
            Ok(Some(el)) => el,
            Ok(None) => {
                result.error = Some(LINK_NOT_FOUND.to_string());
                errors.push(AuditError::ElementNotFound(link.href.clone()));
                results.push(result);
                continue;
            }
            Err(e) => {
                result.error = Some(e.to_string());
                errors.push(e);
                results.push(result);
                continue;
            }
        };

        if link.opens_new_tab {
            follow_in_new_tab(session.browser(), el, link, config, &mut result, errors).await;
        } else {
            follow_in_same_window(session, el, config, &mut result, errors).await;
        }
        debug!(href = %link.href, success = result.success, "link replayed");
        results.push(result);
    }
    results
}

async fn follow_in_new_tab(
    browser: &mut dyn BrowserSession,
    el: ElementHandle,
    link: &SampleLink,
    config: &AuditConfig,
    result: &mut InteractionResult,
    errors: &mut Vec<AuditError>,
) {
    let original = match browser.current_window().await {
        Ok(w) => w,
        Err(e) => {
            result.error = Some(e.to_string());
            errors.push(e.into_audit(&link.href));
            return;
        }
    };

    let outcome = async {
        let before = browser.window_handles().await?;
        browser.click(el).await?;
        let opened = wait_for_new_window(browser, &before, config).await?;
        browser.switch_to_window(&opened).await?;
        let landed = browser.current_url().await?;
        browser.close_window().await?;
        browser.switch_to_window(&original).await?;
        Ok::<_, BrowserError>(landed)
    }
    .await;

    match outcome {
        Ok(landed) => {
            result.success = true;
            result.landed_on_url = Some(landed);
        }
        Err(e) => {
            result.error = Some(e.to_string());
            errors.push(e.into_audit(&format!("new tab for {}", link.href)));
            if let Err(e) = browser.switch_to_window(&original).await {
                warn!(error = %e, "could not return to the original window");
            }
        }
    }
}

/// Poll until a window that was not in `before` shows up.
async fn wait_for_new_window(
    browser: &mut dyn BrowserSession,
    before: &[WindowHandle],
    config: &AuditConfig,
) -> Result<WindowHandle, BrowserError> {
    let timeout = config.new_tab_timeout();
    let deadline = Instant::now() + timeout;
    loop {
        let handles = browser.window_handles().await?;
        if let Some(new) = handles.into_iter().find(|h| !before.contains(h)) {
            return Ok(new);
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::Timeout(timeout.as_millis() as u64));
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::sleep(config.poll_interval().min(remaining)).await;
    }
}

async fn follow_in_same_window(
    session: &mut PageSession,
    el: ElementHandle,
    config: &AuditConfig,
    result: &mut InteractionResult,
    errors: &mut Vec<AuditError>,
) {
    if let Err(e) = session.browser().click(el).await {
        result.error = Some(SAME_WINDOW_FAILED.to_string());
        errors.push(e.into_audit(&result.href));
        return;
    }
    if let Err(e) = session.wait_for_load(config).await {
        result.error = Some(SAME_WINDOW_FAILED.to_string());
        errors.push(e);
        return;
    }
    result.success = true;
    result.landed_on_url = session.browser().current_url().await.ok();

    if let Err(e) = session.browser().back().await {
        warn!(error = %e, "navigating back failed");
        errors.push(e.into_audit("navigate back"));
        return;
    }
    if let Err(e) = session.wait_for_load(config).await {
        debug!(error = %e, "load incomplete after navigating back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedBrowserFactory, SiteFixture};
    use crate::browser::BrowserFactory;
    use crate::probe::links::{find_sample_links, to_sample_links};
    use ccm_core::{ErrorKind, InteractionType};

    const PAGE: &str = r#"
url: https://example.com/
elements:
  - { id: about, href: "https://example.com/about", text: About }
  - { id: news, href: "https://news.example.com/", text: News, target: _blank }
  - { id: promo, href: "https://example.com/promo", text: Promo, lands_on: "https://example.com/promo?ref=home" }
"#;

    async fn session(yaml: &str) -> (ScriptedBrowserFactory, PageSession) {
        let factory = ScriptedBrowserFactory::new(SiteFixture::from_yaml(yaml).unwrap());
        let mut s = PageSession::new(factory.launch().await.unwrap());
        s.visit("https://example.com/", &AuditConfig::instant()).await.unwrap();
        (factory, s)
    }

    #[tokio::test]
    async fn replays_same_window_and_new_tab_links() {
        let (_f, mut s) = session(PAGE).await;
        let links = to_sample_links(&find_sample_links(&mut s, 3, &[]).await);
        let mut errors = Vec::new();
        let results = replay_links(&mut s, &links, &AuditConfig::instant(), &mut errors).await;

        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(results[0].interaction_type, InteractionType::SameWindow);
        assert_eq!(results[0].landed_on_url.as_deref(), Some("https://example.com/about"));
        assert_eq!(results[1].interaction_type, InteractionType::NewTab);
        assert_eq!(results[1].landed_on_url.as_deref(), Some("https://news.example.com/"));
        assert_eq!(
            results[2].landed_on_url.as_deref(),
            Some("https://example.com/promo?ref=home")
        );
        assert!(results
            .iter()
            .all(|r| r.before_click_url.as_deref() == Some("https://example.com/")));
        assert_eq!(s.browser().window_handles().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blocked_popup_times_out_and_returns_to_page() {
        let (_f, mut s) = session(
            r#"
url: https://example.com/
elements:
  - { id: news, href: "https://news.example.com/", text: News, target: _blank, popup_blocked: true }
  - { id: about, href: "https://example.com/about", text: About }
"#,
        )
        .await;
        let links = to_sample_links(&find_sample_links(&mut s, 3, &[]).await);
        let mut errors = Vec::new();
        let results = replay_links(&mut s, &links, &AuditConfig::instant(), &mut errors).await;

        assert!(!results[0].success);
        assert!(results[0].error.is_some());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind(), ErrorKind::Timeout);
        assert!(results[1].success);
    }

    #[tokio::test]
    async fn unresolvable_link_is_recorded() {
        let (_f, mut s) = session(PAGE).await;
        let links = SampleLinks(vec![SampleLink {
            href: "https://example.com/gone".into(),
            text: "Gone".into(),
            opens_new_tab: false,
        }]);
        let mut errors = Vec::new();
        let results = replay_links(&mut s, &links, &AuditConfig::instant(), &mut errors).await;
        assert_eq!(results[0].error.as_deref(), Some(LINK_NOT_FOUND));
        assert!(!results[0].success);
        assert_eq!(errors[0].kind(), ErrorKind::ElementNotFound);
    }

    #[tokio::test]
    async fn failed_click_uses_same_window_message() {
        let (_f, mut s) = session(
            r#"
url: https://example.com/
elements:
  - { id: about, href: "https://example.com/about", text: About, click_error: "element click intercepted" }
"#,
        )
        .await;
        let links = to_sample_links(&find_sample_links(&mut s, 3, &[]).await);
        let mut errors = Vec::new();
        let results = replay_links(&mut s, &links, &AuditConfig::instant(), &mut errors).await;
        assert_eq!(results[0].error.as_deref(), Some(SAME_WINDOW_FAILED));
        assert_eq!(errors.len(), 1);
    }
}
