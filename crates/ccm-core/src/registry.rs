use std::collections::BTreeMap;

use crate::analytics::{self, AnalyticsMatcher, AnalyticsProviderSignature};
use crate::error::RegistryError;
use crate::provider::{self, ProviderSignature};

/// Catalog of consent-platform and analytics signatures.
///
/// Filled at startup and read-only while an audit runs. Insertion order is
/// detection order.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    consent: Vec<(String, ProviderSignature)>,
    analytics: Vec<(String, AnalyticsMatcher)>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let consent = provider::builtin()
            .into_iter()
            .map(|(k, sig)| (k.to_string(), sig))
            .collect();
        Self {
            consent,
            analytics: analytics::BUILTIN.clone(),
        }
    }

    /// Register (or replace) a consent platform under a case-insensitive key.
    pub fn add_provider(
        &mut self,
        key: &str,
        signature: ProviderSignature,
    ) -> Result<(), RegistryError> {
        signature.validate()?;
        let key = key.to_lowercase();
        match self.consent.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = signature,
            None => self.consent.push((key, signature)),
        }
        Ok(())
    }

    pub fn add_analytics_provider(
        &mut self,
        key: &str,
        signature: AnalyticsProviderSignature,
    ) -> Result<(), RegistryError> {
        let matcher = AnalyticsMatcher::compile(signature)?;
        let key = key.to_lowercase();
        match self.analytics.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = matcher,
            None => self.analytics.push((key, matcher)),
        }
        Ok(())
    }

    /// First platform (in registration order) with any banner id present in
    /// the page markup. Returns the key alongside the signature.
    pub fn identify_consent_provider(
        &self,
        page_markup: &str,
    ) -> Option<(&str, &ProviderSignature)> {
        let lowered = page_markup.to_lowercase();
        self.consent
            .iter()
            .find(|(_, sig)| sig.matches_markup(&lowered))
            .map(|(k, sig)| (k.as_str(), sig))
    }

    pub fn get_provider(&self, key: &str) -> Option<&ProviderSignature> {
        let key = key.to_lowercase();
        self.consent.iter().find(|(k, _)| *k == key).map(|(_, s)| s)
    }

    pub fn providers(&self) -> impl Iterator<Item = (&str, &ProviderSignature)> {
        self.consent.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn analytics_providers(&self) -> impl Iterator<Item = (&str, &AnalyticsProviderSignature)> {
        self.analytics.iter().map(|(k, m)| (k.as_str(), m.signature()))
    }

    /// `{provider_key: is_container_load}` for every analytics provider.
    pub fn classify_container_load(&self, url: &str, domain: &str) -> BTreeMap<String, bool> {
        self.analytics
            .iter()
            .map(|(k, m)| (k.clone(), m.is_container_load(url, domain)))
            .collect()
    }

    /// `{provider_key: is_event}` for every analytics provider.
    pub fn classify_event(&self, url: &str, domain: &str) -> BTreeMap<String, bool> {
        self.analytics
            .iter()
            .map(|(k, m)| (k.clone(), m.is_event(url, domain)))
            .collect()
    }

    /// Display name of the first analytics provider whose container this is.
    pub fn container_provider(&self, url: &str, domain: &str) -> Option<&str> {
        self.analytics
            .iter()
            .find(|(_, m)| m.is_container_load(url, domain))
            .map(|(_, m)| m.name())
    }
}
