//! Proxy dispatcher: route, prepare, call, relay

use std::sync::Arc;
use tracing::{error, info};

use crate::error::{Error, Result, TransportError};
use crate::logging::log_call;
use crate::metrics::{Metrics, OUTCOME_RESPONDED};
use crate::models::{CallLog, InboundRequest, OutboundCall, ProxyResponse, TransportResponse};
use crate::proxy::core::{BackendAdapter, Route};
use crate::proxy::registry::EndpointRegistry;
use crate::proxy::transport::Transport;
use crate::utils::{duration_to_ms, parse_url, Timer};

/// Drives one backend family. Holds no per-request state, so a single
/// instance is shared by every concurrent request.
pub struct Dispatcher {
    enabled: bool,
    adapter: Arc<dyn BackendAdapter>,
    registry: Arc<EndpointRegistry>,
    transport: Arc<dyn Transport>,
    metrics: Metrics,
}

impl Dispatcher {
    pub fn new(
        enabled: bool,
        adapter: Arc<dyn BackendAdapter>,
        registry: Arc<EndpointRegistry>,
        transport: Arc<dyn Transport>,
        metrics: Metrics,
    ) -> Self {
        Self {
            enabled,
            adapter,
            registry,
            transport,
            metrics,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    /// Handle one inbound request.
    ///
    /// Routing and body errors are returned to the caller. Transport failures
    /// never are: they become a bare 500 response.
    pub async fn handle(&self, inbound: &InboundRequest) -> Result<ProxyResponse> {
        if !self.enabled {
            return Ok(ProxyResponse::not_found());
        }

        let (service, url) = self.resolve(inbound)?;
        let call = self.adapter.prepare(inbound, &url)?;
        let response = self.call(&service, call).await;

        Ok(self.adapter.postprocess(response))
    }

    /// Find the physical URL for this request, along with the name it is logged under
    fn resolve(&self, inbound: &InboundRequest) -> Result<(String, String)> {
        let route = self.adapter.route();
        let value = inbound.header(route.header()).ok_or_else(|| {
            let mut present: Vec<&str> = inbound.headers().keys().map(String::as_str).collect();
            present.sort_unstable();
            error!(
                header = route.header(),
                present = %present.join(", "),
                "Missing routing header"
            );
            Error::MissingRouteHeader(route.header().to_string())
        })?;

        match route {
            Route::Registry { .. } => {
                let url = self.registry.lookup(value)?;
                Ok((value.to_string(), url.to_string()))
            }
            Route::Direct { .. } => {
                let service = parse_url(value)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
                    .unwrap_or_else(|| "direct".to_string());
                Ok((service, value.to_string()))
            }
        }
    }

    async fn call(&self, service: &str, call: OutboundCall) -> ProxyResponse {
        let adapter = self.adapter.name();
        info!(service = %service, adapter = adapter, "Calling service");

        let timer = Timer::start();
        let result = self.transport.send(&call).await;
        let elapsed = timer.elapsed();
        let elapsed_ms = duration_to_ms(elapsed);

        let outcome = match &result {
            Ok(_) => OUTCOME_RESPONDED,
            Err(e) => e.kind.as_str(),
        };
        self.metrics.record_call(service, adapter, elapsed.as_secs_f64(), outcome);
        info!(service = %service, adapter = adapter, outcome, elapsed_ms, "Backend call finished");

        log_call(&CallLog {
            timestamp: chrono::Utc::now(),
            service: service.to_string(),
            adapter: adapter.to_string(),
            url: call.url.clone(),
            status_code: result.as_ref().ok().map(|r| r.status_code),
            error_kind: result.as_ref().err().map(|e| e.kind.to_string()),
            elapsed_ms,
        });

        relay(adapter, result)
    }
}

/// Copy a backend answer verbatim, or fail closed
fn relay(adapter: &str, result: std::result::Result<TransportResponse, TransportError>) -> ProxyResponse {
    match result {
        Ok(response) => response.into(),
        Err(e) => {
            error!(adapter = adapter, kind = %e.kind, "Outbound call failed");
            ProxyResponse::internal_error()
        }
    }
}
