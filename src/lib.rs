//! Credential Proxy - forwards internal service calls to third-party
//! payment backends, attaching the credentials callers must never hold.
//!
//! Two backend families are supported: a token-authenticated JSON API
//! (paypal-style) routed through a service registry, and an XML API
//! (bango-style) whose credentials are written into the request document.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod proxy;
pub mod utils;

use std::sync::Arc;

// Re-export commonly used items
pub use auth::{AuthHeaderBuilder, StaticAuthHeaders};
pub use config::ProxyConfig;
pub use error::{Error, Result, TransportError, TransportErrorKind};
pub use logging::{init_logger, log_error, log_info};
pub use metrics::Metrics;
pub use models::{AuthToken, InboundRequest, OutboundCall, ProxyResponse};
pub use proxy::{Dispatcher, ProxyServer, Routes};

/// Path prefix served by the token-authenticated backend
pub const PAYPAL_PREFIX: &str = "/paypal";

/// Path prefix served by the XML-credential backend
pub const BANGO_PREFIX: &str = "/bango";

/// Build both dispatchers from configuration, sharing one registry, one
/// outbound client and the global meter.
pub fn build_routes(config: &ProxyConfig) -> Result<Routes> {
    let auth: Arc<dyn AuthHeaderBuilder> = Arc::new(StaticAuthHeaders::from_config(&config.paypal));
    build_routes_with(config, auth, Metrics::global())
}

/// Like [`build_routes`], with a caller-supplied auth header builder and metrics
pub fn build_routes_with(
    config: &ProxyConfig,
    auth: Arc<dyn AuthHeaderBuilder>,
    metrics: Metrics,
) -> Result<Routes> {
    let registry = Arc::new(proxy::EndpointRegistry::new(
        config.services.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )?);
    let transport: Arc<dyn proxy::Transport> = Arc::new(proxy::ReqwestTransport::new(&config.http_client)?);

    let paypal = proxy::TokenAuthAdapter::new(&config.headers, &config.paypal, auth);
    let bango = proxy::XmlCredentialAdapter::new(&config.headers, &config.bango);

    Ok(Routes::new()
        .add(
            PAYPAL_PREFIX,
            Arc::new(Dispatcher::new(
                config.enabled,
                Arc::new(paypal),
                Arc::clone(&registry),
                Arc::clone(&transport),
                metrics.clone(),
            )),
        )
        .add(
            BANGO_PREFIX,
            Arc::new(Dispatcher::new(config.enabled, Arc::new(bango), registry, transport, metrics)),
        ))
}
