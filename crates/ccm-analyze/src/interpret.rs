//! Fixed reference table pairing each flag value with its meaning.

use ccm_core::Phase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    HasFirstPartyCookies,
    HasCcmProviderCookies,
    NoThirdPartyCookies,
    HasFirstPartyRequests,
    HasCcmProviderRequests,
    NoThirdPartyRequests,
    HasAnalyticsLibraryLoads,
    /// Pre-consent only: a sampled link could be clicked behind the banner.
    PageInteractable,
}

impl Flag {
    pub fn as_str(self) -> &'static str {
        match self {
            Flag::HasFirstPartyCookies => "has_first_party_cookies",
            Flag::HasCcmProviderCookies => "has_ccm_provider_cookies",
            Flag::NoThirdPartyCookies => "no_third_party_cookies",
            Flag::HasFirstPartyRequests => "has_first_party_requests",
            Flag::HasCcmProviderRequests => "has_ccm_provider_requests",
            Flag::NoThirdPartyRequests => "no_third_party_requests",
            Flag::HasAnalyticsLibraryLoads => "has_analytics_library_loads",
            Flag::PageInteractable => "page_interactable",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outlook {
    Positive,
    Negative,
    Neutral,
}

/// Phases a rule applies to.
#[derive(Debug, Clone, Copy)]
enum Applies {
    Any,
    Pre,
    Accepted,
    /// Before consent or after it was refused.
    WithoutConsent,
}

impl Applies {
    fn covers(self, phase: Phase) -> bool {
        match self {
            Applies::Any => true,
            Applies::Pre => phase == Phase::PreConsent,
            Applies::Accepted => phase == Phase::PostAccept,
            Applies::WithoutConsent => phase != Phase::PostAccept,
        }
    }
}

struct Rule {
    flag: Flag,
    value: bool,
    applies: Applies,
    meaning: &'static str,
    outlook: Outlook,
}

const fn rule(
    flag: Flag,
    value: bool,
    applies: Applies,
    meaning: &'static str,
    outlook: Outlook,
) -> Rule {
    Rule {
        flag,
        value,
        applies,
        meaning,
        outlook,
    }
}

use Applies::*;
use Outlook::*;

// First match wins; order specific phases before `Any`.
const RULES: &[Rule] = &[
    rule(Flag::HasFirstPartyCookies, true, Any, "The site sets its own cookies", Neutral),
    rule(Flag::HasFirstPartyCookies, false, Any, "No first-party cookies are set", Neutral),
    rule(
        Flag::HasCcmProviderCookies,
        true,
        Pre,
        "The consent platform stores cookies before a choice is made",
        Neutral,
    ),
    rule(
        Flag::HasCcmProviderCookies,
        true,
        Any,
        "The consent platform records the visitor's choice",
        Positive,
    ),
    rule(Flag::HasCcmProviderCookies, false, Pre, "No consent platform cookies yet", Neutral),
    rule(
        Flag::HasCcmProviderCookies,
        false,
        Any,
        "The consent choice is not stored in a platform cookie",
        Neutral,
    ),
    rule(Flag::NoThirdPartyCookies, true, Any, "No third-party cookies are set", Positive),
    rule(
        Flag::NoThirdPartyCookies,
        false,
        WithoutConsent,
        "Third-party cookies are set without consent",
        Negative,
    ),
    rule(
        Flag::NoThirdPartyCookies,
        false,
        Accepted,
        "Third-party cookies are set after consent was given",
        Neutral,
    ),
    rule(Flag::HasFirstPartyRequests, true, Any, "The page loads its own resources", Neutral),
    rule(Flag::HasFirstPartyRequests, false, Any, "No first-party requests were observed", Neutral),
    rule(Flag::HasCcmProviderRequests, true, Any, "The consent platform is loaded", Neutral),
    rule(
        Flag::HasCcmProviderRequests,
        false,
        Any,
        "No requests to the consent platform were observed",
        Neutral,
    ),
    rule(Flag::NoThirdPartyRequests, true, Any, "No third-party requests are made", Positive),
    rule(
        Flag::NoThirdPartyRequests,
        false,
        WithoutConsent,
        "Third-party requests are made without consent",
        Negative,
    ),
    rule(
        Flag::NoThirdPartyRequests,
        false,
        Accepted,
        "Third-party requests are made after consent was given",
        Neutral,
    ),
    rule(
        Flag::HasAnalyticsLibraryLoads,
        true,
        WithoutConsent,
        "Analytics libraries load without consent",
        Negative,
    ),
    rule(
        Flag::HasAnalyticsLibraryLoads,
        true,
        Accepted,
        "Analytics libraries load after consent was given",
        Neutral,
    ),
    rule(
        Flag::HasAnalyticsLibraryLoads,
        false,
        WithoutConsent,
        "No analytics libraries load without consent",
        Positive,
    ),
    rule(
        Flag::HasAnalyticsLibraryLoads,
        false,
        Accepted,
        "No analytics libraries load after consent",
        Neutral,
    ),
    rule(
        Flag::PageInteractable,
        true,
        Pre,
        "The page can be used while the banner is shown",
        Negative,
    ),
    rule(
        Flag::PageInteractable,
        false,
        Pre,
        "The page is inert until a consent choice is made",
        Positive,
    ),
];

const UNINTERPRETED: &str = "No interpretation for this phase";

/// Meaning and outlook of `flag == value` in `phase`. Total: combinations
/// absent from the table are neutral.
pub fn interpret(flag: Flag, value: bool, phase: Phase) -> (&'static str, Outlook) {
    RULES
        .iter()
        .find(|r| r.flag == flag && r.value == value && r.applies.covers(phase))
        .map(|r| (r.meaning, r.outlook))
        .unwrap_or((UNINTERPRETED, Neutral))
}
