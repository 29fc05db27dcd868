//! Decoding of browser performance-log entries into network events.
//!
//! Accepts both the minimal `{method, params}` shape and the wrapped shape
//! `{"message": "<json>"}` whose inner object is `{"message": {method, params}}`.

use ccm_core::{AuditError, Initiator};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const REQUEST_WILL_BE_SENT: &str = "Network.requestWillBeSent";
pub const RESPONSE_RECEIVED: &str = "Network.responseReceived";
pub const RESPONSE_RECEIVED_EXTRA_INFO: &str = "Network.responseReceivedExtraInfo";

/// Header name with all of its values, in log order.
pub type Header = (String, Vec<String>);

#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    RequestInitiated {
        request_id: String,
        url: String,
        initiator: Initiator,
        timestamp: f64,
    },
    ResponseReceived {
        request_id: String,
        headers: Vec<Header>,
    },
}

impl NetworkEvent {
    pub fn request_id(&self) -> &str {
        match self {
            NetworkEvent::RequestInitiated { request_id, .. }
            | NetworkEvent::ResponseReceived { request_id, .. } => request_id,
        }
    }
}

// ── Wire shapes ──

#[derive(Debug, Deserialize)]
struct RawLogEntry {
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequestWillBeSent {
    request_id: String,
    request: RequestInfo,
    #[serde(default)]
    initiator: Option<RawInitiator>,
    #[serde(default)]
    timestamp: f64,
}

#[derive(Debug, Deserialize)]
struct RequestInfo {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawInitiator {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    stack: Option<StackTrace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StackTrace {
    #[serde(default)]
    call_frames: Vec<CallFrame>,
    #[serde(default)]
    parent: Option<Box<StackTrace>>,
}

#[derive(Debug, Deserialize)]
struct CallFrame {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseReceived {
    request_id: String,
    response: ResponseInfo,
}

#[derive(Debug, Deserialize)]
struct ResponseInfo {
    #[serde(default)]
    headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseExtraInfo {
    request_id: String,
    #[serde(default)]
    headers: Map<String, Value>,
}

impl StackTrace {
    /// First frame with a URL, walking into async parents when the
    /// synchronous part is empty.
    fn top_frame_url(&self) -> Option<String> {
        self.call_frames
            .iter()
            .map(|f| f.url.trim())
            .find(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| self.parent.as_ref().and_then(|p| p.top_frame_url()))
    }
}

impl From<RawInitiator> for Initiator {
    fn from(raw: RawInitiator) -> Self {
        match raw.kind.as_str() {
            "parser" => Initiator::Parser { url: raw.url },
            "script" => Initiator::Script {
                top_frame_url: raw.stack.as_ref().and_then(StackTrace::top_frame_url),
            },
            _ => Initiator::None,
        }
    }
}

fn header_list(headers: Map<String, Value>) -> Vec<Header> {
    headers
        .into_iter()
        .map(|(name, value)| {
            let values = match value {
                Value::String(s) => vec![s],
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
                _ => Vec::new(),
            };
            (name, values)
        })
        .collect()
}

// ── Decoding ──

fn unwrap_entry(entry: &Value) -> Result<RawLogEntry, AuditError> {
    let fail = |why: &str| AuditError::LogParseFailure(why.to_string());

    let inner = match entry.get("message") {
        Some(Value::String(s)) => {
            serde_json::from_str::<Value>(s)
                .map_err(|e| fail(&format!("message is not json: {e}")))?
        }
        Some(obj @ Value::Object(_)) => obj.clone(),
        Some(_) => return Err(fail("message has unexpected type")),
        None => entry.clone(),
    };
    // The browser nests a second `message` inside the decoded one.
    let inner = match inner.get("message") {
        Some(obj @ Value::Object(_)) => obj.clone(),
        _ => inner,
    };
    serde_json::from_value(inner).map_err(|e| fail(&format!("missing method: {e}")))
}

fn params<T: for<'de> Deserialize<'de>>(method: &str, params: Value) -> Result<T, AuditError> {
    serde_json::from_value(params)
        .map_err(|e| AuditError::LogParseFailure(format!("{method}: {e}")))
}

/// Decode one log entry. `Ok(None)` for methods the chain builder ignores.
pub fn decode_entry(entry: &Value) -> Result<Option<NetworkEvent>, AuditError> {
    let raw = unwrap_entry(entry)?;
    let event = match raw.method.as_str() {
        REQUEST_WILL_BE_SENT => {
            let p: RequestWillBeSent = params(&raw.method, raw.params)?;
            NetworkEvent::RequestInitiated {
                request_id: p.request_id,
                url: p.request.url,
                initiator: p.initiator.map(Initiator::from).unwrap_or_default(),
                timestamp: p.timestamp,
            }
        }
        RESPONSE_RECEIVED => {
            let p: ResponseReceived = params(&raw.method, raw.params)?;
            NetworkEvent::ResponseReceived {
                request_id: p.request_id,
                headers: header_list(p.response.headers),
            }
        }
        RESPONSE_RECEIVED_EXTRA_INFO => {
            let p: ResponseExtraInfo = params(&raw.method, raw.params)?;
            NetworkEvent::ResponseReceived {
                request_id: p.request_id,
                headers: header_list(p.headers),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}
