use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

// The caller's request as seen by the proxy. Header names are lower-cased on
// construction so lookups are case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    headers: HashMap<String, String>,
    body: Bytes,
}

impl InboundRequest {
    pub fn new<I, K, V>(headers: I, body: impl Into<Bytes>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.as_ref().to_lowercase(), value.into()))
                .collect(),
            body: body.into(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

// One outbound call, built per request by an adapter
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub timeout: Duration,
}

// What the backend answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status_code: u16,
    pub body: Bytes,
}

// What the caller gets back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status_code: u16,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn new(status_code: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    /// Answer given while the proxy is administratively disabled
    pub fn not_found() -> Self {
        Self::new(404, Bytes::new())
    }

    /// Answer given for any transport failure; nothing from the backend leaks through
    pub fn internal_error() -> Self {
        Self::new(500, Bytes::new())
    }
}

impl From<TransportResponse> for ProxyResponse {
    fn from(result: TransportResponse) -> Self {
        Self {
            status_code: result.status_code,
            body: result.body,
        }
    }
}

/// Parsed auth token header, e.g. `token=abc&secret=xyz`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(BTreeMap<String, String>);

impl AuthToken {
    /// Parse URL-encoded pairs. Pairs with blank values are dropped and an
    /// empty header counts as no token at all.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let pairs = form_urlencoded::parse(raw.as_bytes())
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        Some(Self(pairs))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Re-encode as `application/x-www-form-urlencoded`, keys sorted
    pub fn to_urlencoded(&self) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AuthToken {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

// Per-call record for debug logging; carries no payloads or header values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallLog {
    pub timestamp: DateTime<Utc>,
    pub service: String,
    pub adapter: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub error_kind: Option<String>,
    pub elapsed_ms: u64,
}
