//! Outbound transport
//!
//! One POST per call, bounded by the call's timeout. Certificate validation is
//! left at the client's defaults and cannot be switched off from configuration.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::HttpClientConfig;
use crate::error::{Error, Result, TransportError, TransportErrorKind};
use crate::models::{OutboundCall, TransportResponse};

/// Performs the single outbound attempt for a prepared call
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, call: &OutboundCall) -> std::result::Result<TransportResponse, TransportError>;
}

/// Reqwest-based transport sharing one pooled client across requests
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        info!("🚀 Initializing outbound HTTPS client");
        info!("   Connect timeout: {}s", config.connect_timeout_secs);
        info!("   Max idle connections per host: {}", config.max_idle_per_host);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .user_agent(format!("credential-proxy/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, call: &OutboundCall) -> std::result::Result<TransportResponse, TransportError> {
        let headers = convert_headers(&call.headers)?;
        let request = self
            .client
            .post(&call.url)
            .headers(headers)
            .body(call.body.clone());

        // The timeout covers the response body too, so a backend that stalls
        // mid-body is cut off like one that never answers.
        let exchange = async {
            let response = request.send().await?;
            let status_code = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(TransportResponse { status_code, body })
        };

        match tokio::time::timeout(call.timeout, exchange).await {
            Ok(Ok(response)) => {
                debug!(status = response.status_code, bytes = response.body.len(), "Backend responded");
                Ok(response)
            }
            Ok(Err(e)) => Err(TransportError::new(classify(&e), e.to_string())),
            Err(_) => Err(TransportError::timeout(format!(
                "no response within {}ms",
                call.timeout.as_millis()
            ))),
        }
    }
}

/// Map a reqwest failure onto the proxy's transport error kinds
fn classify(err: &reqwest::Error) -> TransportErrorKind {
    if err.is_timeout() {
        TransportErrorKind::Timeout
    } else if err.is_builder() {
        TransportErrorKind::InvalidRequest
    } else if is_tls_failure(err) {
        TransportErrorKind::TlsFailure
    } else {
        TransportErrorKind::ConnectionFailed
    }
}

/// Walk the cause chain looking for a rustls error. The TLS stream reports
/// handshake and certificate failures as `io::Error`s wrapping one.
fn is_tls_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.downcast_ref::<rustls::Error>().is_some() {
            return true;
        }
        if let Some(inner) = e.downcast_ref::<std::io::Error>().and_then(|io| io.get_ref()) {
            if inner.downcast_ref::<rustls::Error>().is_some() {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// Convert HashMap headers to reqwest::header::HeaderMap
fn convert_headers(
    headers: &HashMap<String, String>,
) -> std::result::Result<reqwest::header::HeaderMap, TransportError> {
    let mut header_map = reqwest::header::HeaderMap::new();

    for (key, value) in headers {
        let header_name = reqwest::header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
            TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("Invalid header name '{}': {}", key, e),
            )
        })?;
        // Values may carry credentials, so only the name goes into the message
        let header_value = reqwest::header::HeaderValue::from_str(value).map_err(|_| {
            TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("Invalid header value for '{}'", key),
            )
        })?;
        header_map.insert(header_name, header_value);
    }

    Ok(header_map)
}
