//! Token-authenticated (paypal-style) backend adapter

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::auth::AuthHeaderBuilder;
use crate::config::{HeaderNames, PaypalConfig};
use crate::error::Result;
use crate::models::{AuthToken, InboundRequest, OutboundCall};
use crate::proxy::core::{BackendAdapter, Route};

/// Passes the body through and lets the injected builder produce all headers
pub struct TokenAuthAdapter {
    route: Route,
    token_header: String,
    timeout: Duration,
    auth: Arc<dyn AuthHeaderBuilder>,
}

impl TokenAuthAdapter {
    pub fn new(
        headers: &HeaderNames,
        config: &PaypalConfig,
        auth: Arc<dyn AuthHeaderBuilder>,
    ) -> Self {
        Self {
            route: Route::Registry {
                selector_header: headers.service.clone(),
            },
            token_header: headers.token.clone(),
            timeout: config.timeout(),
            auth,
        }
    }
}

impl BackendAdapter for TokenAuthAdapter {
    fn name(&self) -> &'static str {
        "paypal"
    }

    fn route(&self) -> &Route {
        &self.route
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn prepare(&self, inbound: &InboundRequest, url: &str) -> Result<OutboundCall> {
        let token = inbound.header(&self.token_header).and_then(AuthToken::parse);
        debug!(has_token = token.is_some(), "Building auth headers");

        let headers = self.auth.headers(url, token.as_ref())?;

        Ok(OutboundCall {
            url: url.to_string(),
            headers,
            body: inbound.body().clone(),
            timeout: self.timeout,
        })
    }
}
