use ccm_core::{AuditError, ProviderRegistry, ProviderSignature};
use tracing::debug;

use crate::config::AuditConfig;
use crate::session::PageSession;

/// A consent platform whose banner is present and visible.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedProvider {
    pub key: String,
    pub signature: ProviderSignature,
}

/// Identify the consent platform from the markup, then confirm that one of
/// its banner elements is displayed in the live DOM.
///
/// A markup match without a visible banner is not a detection.
pub async fn detect_banner(
    session: &mut PageSession,
    registry: &ProviderRegistry,
    config: &AuditConfig,
) -> Result<Option<DetectedProvider>, AuditError> {
    if let Err(e) = session.wait_for_load(config).await {
        debug!(error = %e, "load incomplete before banner detection");
    }
    tokio::time::sleep(config.settle_delay()).await;

    let markup = session
        .browser()
        .page_source()
        .await
        .map_err(|e| e.into_audit("page source"))?;
    let Some((key, signature)) = registry.identify_consent_provider(&markup) else {
        return Ok(None);
    };

    for id in &signature.banner_element_ids {
        let browser = session.browser();
        let Ok(Some(el)) = browser.find_element_by_id(id).await else {
            continue;
        };
        if matches!(browser.element_displayed(el).await, Ok(true)) {
            debug!(provider = %signature.provider_name, banner = %id, "banner visible");
            return Ok(Some(DetectedProvider {
                key: key.to_string(),
                signature: signature.clone(),
            }));
        }
    }
    debug!(provider = %signature.provider_name, "markup matched but no banner is visible");
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{FixtureElement, ScriptedBrowserFactory, SiteFixture};
    use crate::browser::BrowserFactory;

    fn banner(id: &str, displayed: bool) -> FixtureElement {
        let yaml = format!("{{id: {id}, tag: div, banner: true, displayed: {displayed}}}");
        serde_yaml::from_str(&yaml).unwrap()
    }

    async fn detect(fixture: SiteFixture) -> Option<DetectedProvider> {
        let factory = ScriptedBrowserFactory::new(fixture);
        let mut session = PageSession::new(factory.launch().await.unwrap());
        let cfg = AuditConfig::instant();
        session.visit("https://example.com/", &cfg).await.unwrap();
        detect_banner(&mut session, &ProviderRegistry::with_defaults(), &cfg)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn visible_onetrust_banner_detected() {
        let found = detect(SiteFixture {
            url: "https://example.com/".into(),
            elements: vec![banner("onetrust-banner-sdk", true)],
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(found.key, "onetrust");
        assert_eq!(found.signature.provider_name, "OneTrust");
    }

    #[tokio::test]
    async fn hidden_banner_is_not_a_detection() {
        let found = detect(SiteFixture {
            url: "https://example.com/".into(),
            elements: vec![banner("onetrust-banner-sdk", false)],
            ..Default::default()
        })
        .await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn markup_only_mention_is_not_a_detection() {
        let found = detect(SiteFixture {
            url: "https://example.com/".into(),
            markup: Some("<script src=\"/onetrust-banner-sdk.js\"></script>".into()),
            ..Default::default()
        })
        .await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn no_markup_no_provider() {
        let found = detect(SiteFixture {
            url: "https://example.com/".into(),
            ..Default::default()
        })
        .await;
        assert!(found.is_none());
    }
}
