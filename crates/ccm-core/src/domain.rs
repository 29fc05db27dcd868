//! Registrable-domain comparison backed by the public suffix list.

use std::net::IpAddr;

use crate::error::AuditError;

/// Lowercase a host, drop surrounding dots and any `:port`, and reject
/// obviously malformed input.
pub fn normalize_domain(input: &str) -> Result<String, AuditError> {
    let trimmed = input.trim();
    let fail = || AuditError::DomainParseFailure(input.to_string());

    // Bracketed IPv6 literal, optionally with a port.
    if let Some(rest) = trimmed.strip_prefix('[') {
        let end = rest.find(']').ok_or_else(fail)?;
        let addr: IpAddr = rest[..end].parse().map_err(|_| fail())?;
        return Ok(addr.to_string());
    }
    if let Ok(addr) = trimmed.parse::<IpAddr>() {
        return Ok(addr.to_string());
    }

    let host = match trimmed.rsplit_once(':') {
        Some((h, port)) if port.chars().all(|c| c.is_ascii_digit()) => h,
        Some(_) => return Err(fail()),
        None => trimmed,
    };
    let host = host.trim_matches('.').to_ascii_lowercase();

    if host.is_empty()
        || host.chars().any(|c| c.is_whitespace() || c == '/')
        || host.split('.').any(str::is_empty)
    {
        return Err(fail());
    }
    Ok(host)
}

/// Public-suffix-aware base domain: `sub.example.co.uk` -> `example.co.uk`.
///
/// IP addresses are their own registrable domain.
pub fn registrable_domain(input: &str) -> Result<String, AuditError> {
    let host = normalize_domain(input)?;
    if host.parse::<IpAddr>().is_ok() {
        return Ok(host);
    }
    psl::domain_str(&host)
        .map(str::to_string)
        .ok_or_else(|| AuditError::DomainParseFailure(input.to_string()))
}

/// Same-site test. Never errors: anything unparseable compares unequal,
/// which callers read as third-party.
pub fn same_registrable_domain(a: &str, b: &str) -> bool {
    let (Ok(na), Ok(nb)) = (normalize_domain(a), normalize_domain(b)) else {
        return false;
    };
    if na == nb {
        return true;
    }
    match (registrable_domain(&na), registrable_domain(&nb)) {
        (Ok(ra), Ok(rb)) => ra == rb,
        _ => false,
    }
}

/// Host part of a URL, lowercased.
pub fn domain_of_url(raw: &str) -> Option<String> {
    let parsed = url::Url::parse(raw).ok()?;
    let host = parsed.host_str()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    Some(host.to_ascii_lowercase())
}

/// Exact match or subdomain of any entry in `list`.
pub fn matches_domain_list(domain: &str, list: &[String]) -> bool {
    let Ok(domain) = normalize_domain(domain) else {
        return false;
    };
    list.iter().any(|entry| {
        let entry = entry.trim_matches('.').to_ascii_lowercase();
        domain == entry || domain.ends_with(&format!(".{entry}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn normalizes_cookie_style_domains() {
        assert_eq!(
            normalize_domain(".Google-Analytics.com").unwrap(),
            "google-analytics.com"
        );
        assert_eq!(normalize_domain("example.com:8443").unwrap(), "example.com");
        assert_eq!(normalize_domain("[::1]:80").unwrap(), "::1");
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", "   ", "a..b", "exa mple.com", "example.com:abc", "a/b.com"] {
            assert!(normalize_domain(bad).is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn uses_public_suffix_list() {
        assert_eq!(
            registrable_domain("sub.example.co.uk").unwrap(),
            "example.co.uk"
        );
        assert_eq!(registrable_domain("www.example.com").unwrap(), "example.com");
        assert!(same_registrable_domain("a.example.co.uk", "b.example.co.uk"));
        // naive last-two-labels would call these the same site
        assert!(!same_registrable_domain("foo.co.uk", "bar.co.uk"));
    }

    #[test]
    fn ip_is_its_own_site() {
        assert!(same_registrable_domain("127.0.0.1", "127.0.0.1"));
        assert!(!same_registrable_domain("127.0.0.1", "127.0.0.2"));
    }

    #[test]
    fn malformed_fails_closed() {
        assert!(!same_registrable_domain("", ""));
        assert!(!same_registrable_domain("exa mple.com", "example.com"));
    }

    #[test]
    fn url_host_extraction() {
        assert_eq!(
            domain_of_url("https://WWW.Example.com:8080/path?q=1").as_deref(),
            Some("www.example.com")
        );
        assert_eq!(domain_of_url("not a url"), None);
    }

    #[test]
    fn domain_list_matching() {
        let list = vec!["googletagmanager.com".to_string()];
        assert!(matches_domain_list("googletagmanager.com", &list));
        assert!(matches_domain_list("www.googletagmanager.com", &list));
        assert!(!matches_domain_list("evilgoogletagmanager.com", &list));
    }

    fn label() -> impl Strategy<Value = String> {
        // prefixed so no generated label collides with a private suffix like us.com
        "zq[a-z0-9]{1,8}"
    }

    fn tld() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("com"), Just("org"), Just("net"), Just("co.uk"), Just("de")]
    }

    proptest! {
        #[test]
        fn equal_after_lowercasing_is_same_site(name in label(), t in tld()) {
            let domain = format!("{name}.{t}");
            prop_assert!(same_registrable_domain(&domain.to_uppercase(), &domain));
        }

        #[test]
        fn subdomain_is_same_site(sub in label(), name in label(), t in tld()) {
            let base = format!("{name}.{t}");
            let host = format!("{sub}.{base}");
            prop_assert!(same_registrable_domain(&host, &base));
        }

        #[test]
        fn siblings_are_third_party(x in label(), y in label(), t in tld()) {
            prop_assume!(x != y);
            let left = format!("{x}.{t}");
            let right = format!("{y}.{t}");
            prop_assert!(!same_registrable_domain(&left, &right));
        }
    }
}
