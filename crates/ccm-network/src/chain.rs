use std::collections::{HashMap, HashSet};

use ccm_core::domain::domain_of_url;
use ccm_core::{
    EdgeType, Initiator, NetworkRequestRecord, NetworkState, RequestChainEdge, UNKNOWN_SOURCE,
};
use serde_json::Value;

use crate::event::{decode_entry, Header, NetworkEvent};
use crate::set_cookie::cookies_from_headers;

/// Requests and initiator edges reconstructed from one session's log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainBuild {
    pub requests: Vec<NetworkRequestRecord>,
    pub chains: Vec<RequestChainEdge>,
    /// Entries skipped because they did not decode.
    pub parse_errors: usize,
}

impl ChainBuild {
    pub fn into_network(self) -> (NetworkState, usize) {
        (
            NetworkState {
                requests: self.requests,
                chains: self.chains,
            },
            self.parse_errors,
        )
    }
}

/// Build request records and chain edges from raw performance-log entries.
///
/// Requests are created from request events (first one per id wins), then
/// enriched with cookies from response events (last one carrying cookie
/// headers wins). Malformed entries are counted and skipped.
pub fn build(entries: &[Value], root_url: &str) -> ChainBuild {
    let mut parse_errors = 0;
    let mut events = Vec::with_capacity(entries.len());
    for entry in entries {
        match decode_entry(entry) {
            Ok(Some(ev)) => events.push(ev),
            Ok(None) => {}
            Err(e) => {
                tracing::debug!(error = %e, "skipping log entry");
                parse_errors += 1;
            }
        }
    }

    // First pass: identity.
    let mut requests: Vec<NetworkRequestRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for ev in &events {
        if let NetworkEvent::RequestInitiated {
            request_id,
            url,
            initiator,
            timestamp,
        } = ev
        {
            if index.contains_key(request_id) {
                continue;
            }
            index.insert(request_id.clone(), requests.len());
            requests.push(NetworkRequestRecord {
                request_id: request_id.clone(),
                url: url.clone(),
                domain: domain_of_url(url).unwrap_or_default(),
                initiator: initiator.clone(),
                timestamp: *timestamp,
                classification: Default::default(),
                sets_cookies: Vec::new(),
            });
        }
    }

    // Second pass: cookie-setting headers.
    for ev in &events {
        if let NetworkEvent::ResponseReceived {
            request_id,
            headers,
        } = ev
        {
            let Some(&i) = index.get(request_id) else {
                continue;
            };
            attach_cookies(&mut requests[i], headers);
        }
    }

    let chains = edges(&requests, root_url);
    ChainBuild {
        requests,
        chains,
        parse_errors,
    }
}

fn attach_cookies(record: &mut NetworkRequestRecord, headers: &[Header]) {
    let cookies = cookies_from_headers(headers, &record.domain);
    if !cookies.is_empty() {
        record.sets_cookies = cookies;
    }
}

/// One script edge per script-initiated request. Sources that are neither a
/// captured request nor the page itself collapse to the unknown sentinel.
fn edges(requests: &[NetworkRequestRecord], root_url: &str) -> Vec<RequestChainEdge> {
    let known: HashSet<&str> = requests
        .iter()
        .map(|r| r.url.as_str())
        .chain(std::iter::once(root_url))
        .collect();

    requests
        .iter()
        .filter_map(|r| match &r.initiator {
            Initiator::Script { top_frame_url } => {
                let source = top_frame_url
                    .as_deref()
                    .filter(|u| known.contains(u))
                    .unwrap_or(UNKNOWN_SOURCE);
                Some(RequestChainEdge {
                    source_url: source.to_string(),
                    target_url: r.url.clone(),
                    edge_type: EdgeType::Script,
                    timestamp: r.timestamp,
                })
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ROOT: &str = "https://example.com/";

    fn request(id: &str, url: &str, initiator: Value) -> Value {
        json!({
            "method": "Network.requestWillBeSent",
            "params": {"requestId": id, "request": {"url": url}, "initiator": initiator, "timestamp": 1.0}
        })
    }

    fn response(id: &str, set_cookie: &str) -> Value {
        json!({
            "method": "Network.responseReceived",
            "params": {"requestId": id, "response": {"headers": {"Set-Cookie": set_cookie}}}
        })
    }

    fn script_from(url: &str) -> Value {
        json!({"type": "script", "stack": {"callFrames": [{"url": url}]}})
    }

    #[test]
    fn no_responses_means_no_cookies() {
        let log = vec![
            request("1", ROOT, json!({"type": "other"})),
            request("2", "https://cdn.example.net/a.js", json!({"type": "parser", "url": ROOT})),
        ];
        let built = build(&log, ROOT);
        assert_eq!(built.requests.len(), 2);
        assert!(built.requests.iter().all(|r| r.sets_cookies.is_empty()));
        assert!(built.chains.is_empty());
        assert_eq!(built.parse_errors, 0);
    }

    #[test]
    fn script_requests_produce_edges() {
        let log = vec![
            request("1", ROOT, json!({"type": "other"})),
            request("2", "https://example.com/app.js", json!({"type": "parser", "url": ROOT})),
            request(
                "3",
                "https://tracker.example.org/t.js",
                script_from("https://example.com/app.js"),
            ),
            request("4", "https://x.example.org/p", json!({"type": "script"})),
        ];
        let built = build(&log, ROOT);
        assert_eq!(built.chains.len(), 2);
        assert_eq!(built.chains[0].source_url, "https://example.com/app.js");
        assert_eq!(built.chains[0].target_url, "https://tracker.example.org/t.js");
        assert_eq!(built.chains[0].edge_type, EdgeType::Script);
        assert_eq!(built.chains[1].source_url, UNKNOWN_SOURCE);
    }

    #[test]
    fn edges_reference_only_known_urls() {
        let log = vec![
            request("1", "https://a.example.org/x", script_from(ROOT)),
            request(
                "2",
                "https://b.example.org/y",
                script_from("https://never-requested.example/z.js"),
            ),
        ];
        let built = build(&log, ROOT);
        let urls: HashSet<&str> = built.requests.iter().map(|r| r.url.as_str()).collect();
        for edge in &built.chains {
            assert!(
                edge.source_url == ROOT
                    || edge.source_url == UNKNOWN_SOURCE
                    || urls.contains(edge.source_url.as_str())
            );
            assert!(urls.contains(edge.target_url.as_str()));
        }
        assert_eq!(built.chains[1].source_url, UNKNOWN_SOURCE);
    }

    #[test]
    fn duplicate_ids_keep_first_identity_and_last_cookies() {
        let log = vec![
            request("1", "https://example.com/first", json!({"type": "other"})),
            request("1", "https://example.com/second", json!({"type": "other"})),
            response("1", "a=1"),
            response("1", "b=2"),
            json!({"method": "Network.responseReceived", "params": {"requestId": "1", "response": {"headers": {}}}}),
        ];
        let built = build(&log, ROOT);
        assert_eq!(built.requests.len(), 1);
        assert_eq!(built.requests[0].url, "https://example.com/first");
        assert_eq!(built.requests[0].sets_cookies.len(), 1);
        assert_eq!(built.requests[0].sets_cookies[0].name, "b");
    }

    #[test]
    fn response_before_request_still_attaches() {
        let log = vec![
            response("9", "late=1"),
            request("9", "https://example.com/x", json!({"type": "other"})),
        ];
        let built = build(&log, ROOT);
        assert_eq!(built.requests[0].sets_cookies[0].name, "late");
    }

    #[test]
    fn malformed_entries_are_counted() {
        let log = vec![
            json!({"nonsense": true}),
            json!({"message": "{broken"}),
            json!({"method": "Page.frameNavigated", "params": {}}),
            request("1", ROOT, json!({"type": "other"})),
            response("unknown-id", "a=1"),
        ];
        let built = build(&log, ROOT);
        assert_eq!(built.parse_errors, 2);
        assert_eq!(built.requests.len(), 1);
    }
}
