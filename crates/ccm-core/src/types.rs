use serde::{Deserialize, Serialize};

/// Chain edge source used when a script initiator carries no call stack.
pub const UNKNOWN_SOURCE: &str = "unknown";

// ── Party classification ──

/// Terminal classification of a cookie or request. Exactly one applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PartyClass {
    FirstParty,
    ThirdParty,
    CcmProvider,
}

// ── Cookies ──

/// A cookie as the browser's cookie store reports it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawCookie {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, alias = "expiry")]
    pub expires: Option<f64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

/// A cookie in a phase snapshot. Identity is `(name, domain)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CookieRecord {
    pub name: String,
    pub domain: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<f64>,
    pub secure: bool,
    #[serde(rename = "httpOnly")]
    pub http_only: bool,
    #[serde(rename = "sameSite")]
    pub same_site: String,
    #[serde(default)]
    pub classification: Option<PartyClass>,
}

impl CookieRecord {
    pub fn from_raw(raw: &RawCookie) -> Self {
        Self {
            name: raw.name.clone(),
            domain: raw.domain.to_lowercase(),
            path: if raw.path.is_empty() {
                "/".to_string()
            } else {
                raw.path.clone()
            },
            expiry: raw.expires.filter(|e| *e > 0.0),
            secure: raw.secure,
            http_only: raw.http_only,
            same_site: raw.same_site.clone().unwrap_or_else(|| "None".to_string()),
            classification: None,
        }
    }

    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.domain)
    }

    pub fn is(&self, class: PartyClass) -> bool {
        self.classification == Some(class)
    }
}

/// A cookie set by a response header, attached to the request that carried it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CookieSetEvent {
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub classification: Option<PartyClass>,
}

// ── Network requests ──

/// What caused a request to be issued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Initiator {
    #[default]
    None,
    Parser {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Script {
        /// URL of the top frame of the initiating call stack.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        top_frame_url: Option<String>,
    },
}

/// Classification flags of a request. Built only through the constructors so
/// that `{first_party, third_party, ccm_provider}` stay mutually exclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RequestClassification {
    pub is_first_party: bool,
    pub is_third_party: bool,
    pub is_ccm_provider: bool,
    /// Sub-flag of `is_third_party`.
    pub is_analytics_container: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics_provider: Option<String>,
}

impl RequestClassification {
    pub fn party(class: PartyClass) -> Self {
        Self {
            is_first_party: class == PartyClass::FirstParty,
            is_third_party: class == PartyClass::ThirdParty,
            is_ccm_provider: class == PartyClass::CcmProvider,
            is_analytics_container: false,
            analytics_provider: None,
        }
    }

    pub fn analytics_container(provider_name: &str) -> Self {
        Self {
            is_analytics_container: true,
            analytics_provider: Some(provider_name.to_string()),
            ..Self::party(PartyClass::ThirdParty)
        }
    }

    pub fn class(&self) -> Option<PartyClass> {
        match (self.is_first_party, self.is_third_party, self.is_ccm_provider) {
            (true, false, false) => Some(PartyClass::FirstParty),
            (false, true, false) => Some(PartyClass::ThirdParty),
            (false, false, true) => Some(PartyClass::CcmProvider),
            _ => None,
        }
    }

    pub fn is_classified(&self) -> bool {
        self.class().is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkRequestRecord {
    pub request_id: String,
    pub url: String,
    pub domain: String,
    #[serde(default)]
    pub initiator: Initiator,
    pub timestamp: f64,
    #[serde(default)]
    pub classification: RequestClassification,
    #[serde(default)]
    pub sets_cookies: Vec<CookieSetEvent>,
}

impl NetworkRequestRecord {
    /// Third-party and not an analytics container load.
    pub fn is_plain_third_party(&self) -> bool {
        self.classification.is_third_party && !self.classification.is_analytics_container
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Script,
    Parser,
    Unknown,
}

/// Initiating resource -> requested resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestChainEdge {
    pub source_url: String,
    pub target_url: String,
    pub edge_type: EdgeType,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkState {
    pub requests: Vec<NetworkRequestRecord>,
    pub chains: Vec<RequestChainEdge>,
}

// ── Phases ──

/// Presence of an analytics implementation on the live page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyticsTag {
    pub kind: String,
    pub present: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreConsent,
    PostAccept,
    PostReject,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::PreConsent, Phase::PostAccept, Phase::PostReject];

    /// Selector string used by report renderers.
    pub fn label(self) -> &'static str {
        match self {
            Phase::PreConsent => "Pre-consent",
            Phase::PostAccept => "Post-consent; Cookies Accepted",
            Phase::PostReject => "Post-consent; Cookies Rejected",
        }
    }

    pub fn from_label(label: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| p.label() == label)
    }
}

/// Everything captured at one point of the consent flow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhaseState {
    pub phase: Phase,
    pub cookies: Vec<CookieRecord>,
    pub network: NetworkState,
    #[serde(default)]
    pub analytics_tags_detected: Vec<AnalyticsTag>,
    /// Performance log entries skipped because they did not decode.
    #[serde(default)]
    pub log_parse_errors: usize,
    pub timestamp: String,
}

impl PhaseState {
    pub fn empty(phase: Phase) -> Self {
        Self {
            phase,
            cookies: Vec::new(),
            network: NetworkState::default(),
            analytics_tags_detected: Vec::new(),
            log_parse_errors: 0,
            timestamp: crate::now_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn party_constructor_sets_exactly_one_flag() {
        for class in [
            PartyClass::FirstParty,
            PartyClass::ThirdParty,
            PartyClass::CcmProvider,
        ] {
            let c = RequestClassification::party(class);
            let set = [c.is_first_party, c.is_third_party, c.is_ccm_provider]
                .iter()
                .filter(|b| **b)
                .count();
            assert_eq!(set, 1);
            assert_eq!(c.class(), Some(class));
        }
    }

    #[test]
    fn analytics_container_is_third_party() {
        let c = RequestClassification::analytics_container("Google Analytics");
        assert_eq!(c.class(), Some(PartyClass::ThirdParty));
        assert!(c.is_analytics_container);
        assert_eq!(c.analytics_provider.as_deref(), Some("Google Analytics"));
    }

    #[test]
    fn default_classification_is_unclassified() {
        assert!(!RequestClassification::default().is_classified());
    }

    #[test]
    fn cookie_from_raw_normalizes() {
        let raw: RawCookie = serde_json::from_str(
            r#"{"name":"_ga","value":"x","domain":".Google-Analytics.com","expires":-1,"httpOnly":true}"#,
        )
        .unwrap();
        let rec = CookieRecord::from_raw(&raw);
        assert_eq!(rec.domain, ".google-analytics.com");
        assert_eq!(rec.path, "/");
        assert_eq!(rec.expiry, None);
        assert!(rec.http_only);
        assert_eq!(rec.same_site, "None");
        assert_eq!(rec.classification, None);
    }

    #[test]
    fn cookie_record_uses_browser_field_names() {
        let rec = CookieRecord::from_raw(&RawCookie {
            name: "session".into(),
            domain: "example.com".into(),
            ..Default::default()
        });
        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.contains(r#""httpOnly":false"#));
        assert!(json.contains(r#""sameSite":"None""#));
    }

    #[test]
    fn initiator_tagged_serialization() {
        let init = Initiator::Script {
            top_frame_url: Some("https://example.com/app.js".into()),
        };
        let json = serde_json::to_string(&init).unwrap();
        assert!(json.contains(r#""type":"script""#));
        let back: Initiator = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert_eq!(back, Initiator::None);
    }

    #[test]
    fn phase_labels_roundtrip() {
        for p in Phase::ALL {
            assert_eq!(Phase::from_label(p.label()), Some(p));
        }
        assert_eq!(Phase::from_label("bogus"), None);
    }
}
