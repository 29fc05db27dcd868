use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::matches_domain_list;
use crate::error::RegistryError;

/// Domain and URL patterns separating an analytics library load from its
/// tracking beacons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyticsProviderSignature {
    pub provider_name: String,
    pub container_domains: Vec<String>,
    pub container_url_patterns: Vec<String>,
    #[serde(default)]
    pub event_domains: Vec<String>,
    #[serde(default)]
    pub event_url_patterns: Vec<String>,
}

/// A signature with its patterns compiled (case-insensitive).
#[derive(Debug, Clone)]
pub struct AnalyticsMatcher {
    signature: AnalyticsProviderSignature,
    container: Vec<Regex>,
    event: Vec<Regex>,
}

impl AnalyticsMatcher {
    pub fn compile(signature: AnalyticsProviderSignature) -> Result<Self, RegistryError> {
        if signature.container_domains.is_empty() {
            return Err(RegistryError::NoDomains(signature.provider_name.clone()));
        }
        let container = compile_all(&signature.provider_name, &signature.container_url_patterns)?;
        let event = compile_all(&signature.provider_name, &signature.event_url_patterns)?;
        Ok(Self {
            signature,
            container,
            event,
        })
    }

    pub fn signature(&self) -> &AnalyticsProviderSignature {
        &self.signature
    }

    pub fn name(&self) -> &str {
        &self.signature.provider_name
    }

    fn matches_event_pattern(&self, url: &str) -> bool {
        self.event.iter().any(|re| re.is_match(url))
    }

    /// Library load: container domain, container pattern, and no event pattern.
    pub fn is_container_load(&self, url: &str, domain: &str) -> bool {
        matches_domain_list(domain, &self.signature.container_domains)
            && self.container.iter().any(|re| re.is_match(url))
            && !self.matches_event_pattern(url)
    }

    pub fn is_event(&self, url: &str, domain: &str) -> bool {
        matches_domain_list(domain, &self.signature.event_domains)
            && self.matches_event_pattern(url)
    }
}

fn compile_all(provider: &str, patterns: &[String]) -> Result<Vec<Regex>, RegistryError> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(&format!("(?i){p}")).map_err(|source| RegistryError::InvalidPattern {
                provider: provider.to_string(),
                pattern: p.clone(),
                source,
            })
        })
        .collect()
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ── Built-in providers ──

pub fn builtin_signatures() -> Vec<(&'static str, AnalyticsProviderSignature)> {
    vec![
        (
            "google_analytics",
            AnalyticsProviderSignature {
                provider_name: "Google Analytics".into(),
                container_domains: strings(&["googletagmanager.com", "google-analytics.com"]),
                container_url_patterns: strings(&[
                    r"/gtm\.js",
                    r"/gtag/js",
                    r"/analytics\.js",
                    r"/ga\.js",
                ]),
                event_domains: strings(&[
                    "google-analytics.com",
                    "analytics.google.com",
                    "stats.g.doubleclick.net",
                ]),
                event_url_patterns: strings(&[
                    r"/g/collect",
                    r"/j/collect",
                    r"/r/collect",
                    r"/collect\?",
                ]),
            },
        ),
        (
            "adobe_analytics",
            AnalyticsProviderSignature {
                provider_name: "Adobe Analytics".into(),
                container_domains: strings(&["adobedtm.com"]),
                container_url_patterns: strings(&[r"/launch-", r"satelliteLib", r"AppMeasurement"]),
                event_domains: strings(&["omtrdc.net", "2o7.net", "adobedc.net"]),
                event_url_patterns: strings(&[r"/b/ss/"]),
            },
        ),
        (
            "meta_pixel",
            AnalyticsProviderSignature {
                provider_name: "Meta Pixel".into(),
                container_domains: strings(&["connect.facebook.net"]),
                container_url_patterns: strings(&[r"/fbevents\.js", r"/signals/config/"]),
                event_domains: strings(&["facebook.com"]),
                event_url_patterns: strings(&[r"/tr(/|\?|$)"]),
            },
        ),
        (
            "hubspot",
            AnalyticsProviderSignature {
                provider_name: "HubSpot".into(),
                container_domains: strings(&["hs-scripts.com", "hs-analytics.net"]),
                container_url_patterns: strings(&[r"/\d+\.js", r"/analytics/"]),
                event_domains: strings(&["hubspot.com"]),
                event_url_patterns: strings(&[r"/__ptq\.gif"]),
            },
        ),
    ]
}

/// Built-in matchers compiled once. A signature that fails to compile is
/// left out with a warning.
pub static BUILTIN: LazyLock<Vec<(String, AnalyticsMatcher)>> = LazyLock::new(|| {
    builtin_signatures()
        .into_iter()
        .filter_map(|(key, sig)| match AnalyticsMatcher::compile(sig) {
            Ok(m) => Some((key.to_string(), m)),
            Err(e) => {
                tracing::warn!(provider = key, error = %e, "skipping analytics signature");
                None
            }
        })
        .collect()
});
