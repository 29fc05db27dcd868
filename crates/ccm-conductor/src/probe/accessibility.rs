use ccm_core::{AccessibilityReport, AuditError, ElementStatus};
use serde_json::Value;

use super::links::FoundLink;
use super::scripts;
use crate::browser::{BrowserSession, ScriptArg};
use crate::session::PageSession;

pub const SCROLL_BLOCKED: &str = "Page scrolling is blocked (UX issue)";
pub const CLICKABLE_PRE_CONSENT: &str = "Element is clickable at pre-consent stage";

/// Script result, or `None` with the failure recorded.
async fn run(
    browser: &mut dyn BrowserSession,
    js: &str,
    args: &[ScriptArg],
    errors: &mut Vec<AuditError>,
) -> Option<Value> {
    match browser.execute_script(js, args).await {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e.into_audit("accessibility probe"));
            None
        }
    }
}

/// Whether the page can be scrolled and whether any sampled link can really
/// be clicked while the banner is up. Interactable means accessible.
pub async fn check_accessibility(
    session: &mut PageSession,
    links: &[FoundLink],
    errors: &mut Vec<AuditError>,
) -> AccessibilityReport {
    let browser = session.browser();
    let mut report = AccessibilityReport::default();

    let before = run(browser, scripts::SCROLL_OFFSET, &[], errors).await;
    run(browser, scripts::SCROLL_PROBE, &[], errors).await;
    let after = run(browser, scripts::SCROLL_OFFSET, &[], errors).await;
    report.can_scroll = before.is_some() && after.is_some() && before != after;
    if !report.can_scroll {
        report.issues.push(SCROLL_BLOCKED.to_string());
    }

    let mut clickable = 0;
    for found in links {
        let mut status = ElementStatus {
            text: found.link.text.clone(),
            href: Some(found.link.href.clone()),
            is_clickable: false,
            error: None,
        };
        match browser
            .execute_script(scripts::HIT_TEST, &[ScriptArg::Element(found.handle)])
            .await
        {
            Ok(Value::Bool(true)) => {
                clickable += 1;
                status.is_clickable = true;
                status.error = Some(CLICKABLE_PRE_CONSENT.to_string());
            }
            Ok(_) => {}
            Err(e) => {
                status.error = Some(e.to_string());
                errors.push(e.into_audit("hit test"));
            }
        }
        report.elements.push(status);
    }

    report.can_interact = clickable > 0;
    report.is_accessible = report.can_interact;
    if report.can_interact {
        report.issues.push(CLICKABLE_PRE_CONSENT.to_string());
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{ScriptedBrowserFactory, SiteFixture};
    use crate::browser::BrowserFactory;
    use crate::config::AuditConfig;
    use crate::probe::links::find_sample_links;

    async fn probe(yaml: &str) -> (AccessibilityReport, Vec<AuditError>) {
        let factory = ScriptedBrowserFactory::new(SiteFixture::from_yaml(yaml).unwrap());
        let mut s = PageSession::new(factory.launch().await.unwrap());
        s.visit("https://example.com/", &AuditConfig::instant()).await.unwrap();
        let links = find_sample_links(&mut s, 3, &[]).await;
        let mut errors = Vec::new();
        let report = check_accessibility(&mut s, &links, &mut errors).await;
        (report, errors)
    }

    #[tokio::test]
    async fn blocked_page() {
        let (report, errors) = probe(
            r#"
url: https://example.com/
scrollable: false
elements:
  - { id: a1, href: "https://example.com/a", text: A }
"#,
        )
        .await;
        assert!(!report.can_scroll);
        assert!(!report.can_interact);
        assert!(!report.is_accessible);
        assert_eq!(report.issues, vec![SCROLL_BLOCKED.to_string()]);
        assert_eq!(report.elements.len(), 1);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn interactable_page_is_flagged() {
        let (report, _) = probe(
            r#"
url: https://example.com/
elements:
  - { id: a1, href: "https://example.com/a", text: A, clickable: true }
  - { id: a2, href: "https://example.com/b", text: B }
"#,
        )
        .await;
        assert!(report.can_scroll);
        assert!(report.can_interact);
        assert!(report.is_accessible);
        assert_eq!(report.issues, vec![CLICKABLE_PRE_CONSENT.to_string()]);
        assert!(report.elements[0].is_clickable);
        assert!(!report.elements[1].is_clickable);
    }

    #[tokio::test]
    async fn script_failures_count_as_no_value() {
        let (report, errors) = probe(
            r#"
url: https://example.com/
failures: { scripts: true }
elements:
  - { id: a1, href: "https://example.com/a", text: A, clickable: true }
"#,
        )
        .await;
        assert!(!report.can_scroll);
        assert!(!report.can_interact);
        assert!(report.elements[0].error.is_some());
        assert_eq!(errors.len(), 4);
        assert!(errors
            .iter()
            .all(|e| e.kind() == ccm_core::ErrorKind::ScriptExecutionFailure));
    }
}
