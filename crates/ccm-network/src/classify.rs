use ccm_core::domain::same_registrable_domain;
use ccm_core::{
    CookieRecord, NetworkRequestRecord, NetworkState, PartyClass, ProviderRegistry,
    ProviderSignature, RequestClassification,
};

/// Party classification against one page and (optionally) one detected
/// consent platform.
///
/// Decision order: consent platform, then first party, then third party.
/// Every method returns classified copies; inputs are never modified.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    registry: &'a ProviderRegistry,
    page_domain: &'a str,
    provider: Option<&'a ProviderSignature>,
}

impl<'a> Classifier<'a> {
    pub fn new(
        registry: &'a ProviderRegistry,
        page_domain: &'a str,
        provider: Option<&'a ProviderSignature>,
    ) -> Self {
        Self {
            registry,
            page_domain,
            provider,
        }
    }

    /// Unparseable domains end up third-party.
    pub fn party(&self, domain: &str) -> PartyClass {
        if self.provider.is_some_and(|p| p.owns_domain(domain)) {
            PartyClass::CcmProvider
        } else if same_registrable_domain(domain, self.page_domain) {
            PartyClass::FirstParty
        } else {
            PartyClass::ThirdParty
        }
    }

    pub fn classify_cookies(&self, cookies: &[CookieRecord]) -> Vec<CookieRecord> {
        cookies
            .iter()
            .map(|c| CookieRecord {
                classification: Some(self.party(&c.domain)),
                ..c.clone()
            })
            .collect()
    }

    pub fn classify_request(&self, request: &NetworkRequestRecord) -> NetworkRequestRecord {
        let class = self.party(&request.domain);
        let classification = match class {
            PartyClass::ThirdParty => self
                .registry
                .container_provider(&request.url, &request.domain)
                .map(RequestClassification::analytics_container)
                .unwrap_or_else(|| RequestClassification::party(class)),
            _ => RequestClassification::party(class),
        };
        let mut out = request.clone();
        out.classification = classification;
        for cookie in &mut out.sets_cookies {
            cookie.classification = Some(self.party(&cookie.domain));
        }
        out
    }

    pub fn classify_requests(
        &self,
        requests: &[NetworkRequestRecord],
    ) -> Vec<NetworkRequestRecord> {
        requests.iter().map(|r| self.classify_request(r)).collect()
    }

    pub fn classify_network(&self, network: &NetworkState) -> NetworkState {
        NetworkState {
            requests: self.classify_requests(&network.requests),
            chains: network.chains.clone(),
        }
    }
}

/// Classify one phase's cookies and requests.
pub fn classify(
    cookies: &[CookieRecord],
    requests: &[NetworkRequestRecord],
    page_domain: &str,
    provider: Option<&ProviderSignature>,
    registry: &ProviderRegistry,
) -> (Vec<CookieRecord>, Vec<NetworkRequestRecord>) {
    let c = Classifier::new(registry, page_domain, provider);
    (c.classify_cookies(cookies), c.classify_requests(requests))
}
