use ccm_core::CookieSetEvent;

use crate::event::Header;

/// Cookies set by a response's `Set-Cookie` headers.
///
/// The header name is matched case-insensitively. Each value may hold
/// several cookies separated by newlines. A cookie without a `Domain`
/// attribute belongs to `request_domain`.
pub fn cookies_from_headers(headers: &[Header], request_domain: &str) -> Vec<CookieSetEvent> {
    headers
        .iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
        .flat_map(|(_, values)| values.iter())
        .flat_map(|value| value.split('\n'))
        .filter_map(|line| parse_line(line, request_domain))
        .collect()
}

fn parse_line(line: &str, request_domain: &str) -> Option<CookieSetEvent> {
    let mut parts = line.split(';');
    let pair = parts.next()?.trim();
    let (name, _) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let domain = parts
        .filter_map(|attr| attr.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("domain"))
        .map(|(_, v)| v.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| request_domain.to_ascii_lowercase());

    Some(CookieSetEvent {
        name: name.to_string(),
        domain,
        classification: None,
    })
}
