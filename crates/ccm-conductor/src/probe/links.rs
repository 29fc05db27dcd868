use ccm_core::{AuditError, SampleLink, SampleLinks};

use crate::browser::{BrowserSession, ElementHandle};
use crate::session::PageSession;

/// A sampled link together with its handle in the session that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct FoundLink {
    pub link: SampleLink,
    pub handle: ElementHandle,
}

pub fn to_sample_links(found: &[FoundLink]) -> SampleLinks {
    SampleLinks(found.iter().map(|f| f.link.clone()).collect())
}

fn is_meaningful_href(href: &str, current_url: &str) -> bool {
    !href.is_empty()
        && href != current_url
        && !href.starts_with("javascript:")
        && !href.starts_with('#')
}

async fn inside_any(
    browser: &mut dyn BrowserSession,
    el: ElementHandle,
    roots: &[ElementHandle],
) -> bool {
    for root in roots {
        if matches!(browser.element_within(el, *root).await, Ok(true)) {
            return true;
        }
    }
    false
}

/// Up to `limit` visible, enabled anchors with a real outbound href that are
/// not part of the consent banner. Anchors that error while being inspected
/// are skipped.
pub async fn find_sample_links(
    session: &mut PageSession,
    limit: usize,
    banner_ids: &[String],
) -> Vec<FoundLink> {
    let current_url = session.landed_url().await;
    let browser = session.browser();

    let mut banners = Vec::new();
    for id in banner_ids {
        if let Ok(Some(el)) = browser.find_element_by_id(id).await {
            banners.push(el);
        }
    }

    let anchors = browser.find_elements_by_tag("a").await.unwrap_or_default();
    let mut found = Vec::new();
    for el in anchors {
        if found.len() >= limit {
            break;
        }
        let visible = matches!(browser.element_displayed(el).await, Ok(true))
            && matches!(browser.element_enabled(el).await, Ok(true));
        if !visible || inside_any(browser, el, &banners).await {
            continue;
        }
        let Ok(Some(href)) = browser.element_attribute(el, "href").await else {
            continue;
        };
        if !is_meaningful_href(&href, &current_url) {
            continue;
        }
        let target = browser.element_attribute(el, "target").await.ok().flatten();
        let text = browser.element_text(el).await.unwrap_or_default();
        found.push(FoundLink {
            link: SampleLink {
                href,
                text: text.trim().to_string(),
                opens_new_tab: target.as_deref() == Some("_blank"),
            },
            handle: el,
        });
    }
    found
}

/// Find the anchor matching `link` by href and text in the current session.
pub async fn resolve_link(
    browser: &mut dyn BrowserSession,
    link: &SampleLink,
) -> Result<Option<ElementHandle>, AuditError> {
    let anchors = browser
        .find_elements_by_tag("a")
        .await
        .map_err(|e| e.into_audit("anchor lookup"))?;
    for el in anchors {
        let Ok(Some(href)) = browser.element_attribute(el, "href").await else {
            continue;
        };
        if href != link.href {
            continue;
        }
        let text = browser.element_text(el).await.unwrap_or_default();
        if text.trim() != link.text {
            continue;
        }
        if matches!(browser.element_displayed(el).await, Ok(true))
            && matches!(browser.element_enabled(el).await, Ok(true))
        {
            return Ok(Some(el));
        }
    }
    Ok(None)
}
