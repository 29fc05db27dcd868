use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::result::ConsentKind;

/// Element ids and domains identifying one consent-management platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderSignature {
    pub provider_name: String,
    pub provider_base_domain: String,
    /// Other registrable domains the platform serves from.
    #[serde(default)]
    pub related_domains: Vec<String>,
    pub banner_element_ids: Vec<String>,
    #[serde(default)]
    pub accept_element_ids: Vec<String>,
    #[serde(default)]
    pub reject_element_ids: Vec<String>,
    #[serde(default)]
    pub manage_element_ids: Vec<String>,
}

impl ProviderSignature {
    /// Any banner id occurs in `lowered_markup`, which must already be lowercase.
    pub fn matches_markup(&self, lowered_markup: &str) -> bool {
        self.banner_element_ids
            .iter()
            .any(|id| lowered_markup.contains(&id.to_lowercase()))
    }

    pub fn element_ids(&self, kind: ConsentKind) -> &[String] {
        match kind {
            ConsentKind::Accept => &self.accept_element_ids,
            ConsentKind::Reject => &self.reject_element_ids,
        }
    }

    /// Base domain first, then related domains.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.provider_base_domain.as_str())
            .chain(self.related_domains.iter().map(String::as_str))
    }

    pub fn owns_domain(&self, domain: &str) -> bool {
        self.domains()
            .any(|d| crate::domain::same_registrable_domain(domain, d))
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.banner_element_ids.iter().all(|id| id.trim().is_empty()) {
            return Err(RegistryError::NoBannerIds(self.provider_name.clone()));
        }
        if self.provider_base_domain.trim().is_empty() {
            return Err(RegistryError::NoDomains(self.provider_name.clone()));
        }
        Ok(())
    }
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ── Built-in platforms ──

pub fn trustarc() -> ProviderSignature {
    ProviderSignature {
        provider_name: "TrustArc".into(),
        provider_base_domain: "trustarc.com".into(),
        related_domains: ids(&["truste.com"]),
        banner_element_ids: ids(&[
            "truste-consent-track",
            "truste-consent-button",
            "truste-cookie-button",
        ]),
        accept_element_ids: ids(&["truste-consent-button", "truste-cookie-accept"]),
        reject_element_ids: ids(&[
            "reject-all-cookies",
            "truste-cookie-reject",
            "truste-consent-required",
        ]),
        manage_element_ids: ids(&[
            "truste-show-options",
            "truste-cookie-preferences",
            "truste-show-consent",
        ]),
    }
}

pub fn onetrust() -> ProviderSignature {
    ProviderSignature {
        provider_name: "OneTrust".into(),
        provider_base_domain: "onetrust.com".into(),
        related_domains: ids(&["cookielaw.org", "onetrust.io"]),
        banner_element_ids: ids(&["onetrust-banner-sdk", "onetrust-consent-sdk"]),
        accept_element_ids: ids(&["onetrust-accept-btn-handler", "accept-all-cookies-button"]),
        reject_element_ids: ids(&["onetrust-reject-all-handler", "reject-all-cookies-button"]),
        manage_element_ids: ids(&["onetrust-pc-btn-handler", "cookie-settings-button"]),
    }
}

pub fn cookiebot() -> ProviderSignature {
    ProviderSignature {
        provider_name: "Cookiebot".into(),
        provider_base_domain: "cookiebot.com".into(),
        related_domains: ids(&["cookiebot.eu"]),
        banner_element_ids: ids(&["CybotCookiebotDialog"]),
        accept_element_ids: ids(&[
            "CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
            "CybotCookiebotDialogBodyButtonAccept",
        ]),
        reject_element_ids: ids(&[
            "CybotCookiebotDialogBodyButtonDecline",
            "CybotCookiebotDialogBodyLevelButtonLevelOptinDeclineAll",
        ]),
        manage_element_ids: ids(&["CybotCookiebotDialogBodyLevelButtonCustomize"]),
    }
}

pub fn didomi() -> ProviderSignature {
    ProviderSignature {
        provider_name: "Didomi".into(),
        provider_base_domain: "didomi.io".into(),
        related_domains: ids(&["privacy-center.org"]),
        banner_element_ids: ids(&["didomi-notice", "didomi-host"]),
        accept_element_ids: ids(&["didomi-notice-agree-button"]),
        reject_element_ids: ids(&["didomi-notice-disagree-button"]),
        manage_element_ids: ids(&["didomi-notice-learn-more-button"]),
    }
}

pub fn usercentrics() -> ProviderSignature {
    ProviderSignature {
        provider_name: "Usercentrics".into(),
        provider_base_domain: "usercentrics.eu".into(),
        related_domains: ids(&["usercentrics.com"]),
        banner_element_ids: ids(&["usercentrics-root", "usercentrics-cmp"]),
        accept_element_ids: ids(&["uc-accept-all-button"]),
        reject_element_ids: ids(&["uc-deny-all-button"]),
        manage_element_ids: ids(&["uc-more-button"]),
    }
}

pub fn quantcast() -> ProviderSignature {
    ProviderSignature {
        provider_name: "Quantcast Choice".into(),
        provider_base_domain: "quantcast.com".into(),
        related_domains: ids(&["quantcount.com"]),
        banner_element_ids: ids(&["qc-cmp2-container", "qc-cmp2-ui"]),
        accept_element_ids: ids(&["qc-cmp2-accept-all"]),
        reject_element_ids: ids(&["qc-cmp2-reject-all"]),
        manage_element_ids: ids(&["qc-cmp2-more-options"]),
    }
}

/// Registry keys and signatures in detection order.
pub fn builtin() -> Vec<(&'static str, ProviderSignature)> {
    vec![
        ("trustarc", trustarc()),
        ("onetrust", onetrust()),
        ("cookiebot", cookiebot()),
        ("didomi", didomi()),
        ("usercentrics", usercentrics()),
        ("quantcast", quantcast()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_signatures_validate() {
        for (key, sig) in builtin() {
            assert!(sig.validate().is_ok(), "{key} invalid");
            assert!(!sig.accept_element_ids.is_empty(), "{key} has no accept ids");
            assert!(!sig.reject_element_ids.is_empty(), "{key} has no reject ids");
        }
    }

    #[test]
    fn markup_match_is_case_insensitive_on_ids() {
        let sig = cookiebot();
        let markup = r#"<div id="CybotCookiebotDialog" class="x">"#.to_lowercase();
        assert!(sig.matches_markup(&markup));
        assert!(!onetrust().matches_markup(&markup));
    }

    #[test]
    fn related_domains_belong_to_provider() {
        let sig = onetrust();
        assert!(sig.owns_domain("cdn.cookielaw.org"));
        assert!(sig.owns_domain("geolocation.onetrust.com"));
        assert!(!sig.owns_domain("example.com"));
    }

    #[test]
    fn validate_rejects_empty_banner_ids() {
        let mut sig = didomi();
        sig.banner_element_ids = vec!["  ".into()];
        assert!(matches!(sig.validate(), Err(RegistryError::NoBannerIds(_))));
        let mut sig = didomi();
        sig.provider_base_domain.clear();
        assert!(matches!(sig.validate(), Err(RegistryError::NoDomains(_))));
    }

    #[test]
    fn element_ids_by_kind() {
        let sig = onetrust();
        assert_eq!(sig.element_ids(ConsentKind::Accept)[0], "onetrust-accept-btn-handler");
        assert_eq!(sig.element_ids(ConsentKind::Reject)[0], "onetrust-reject-all-handler");
    }
}
