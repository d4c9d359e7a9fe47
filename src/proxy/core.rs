//! Core proxy abstractions
//!
//! Each backend family plugs into the dispatcher through [`BackendAdapter`]:
//! the adapter says how a request is routed, how the outbound call is built
//! and how the relayed response is post-processed.

use std::time::Duration;

use crate::error::Result;
use crate::models::{InboundRequest, OutboundCall, ProxyResponse};

/// How a backend family finds its physical URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// The named header selects a logical service looked up in the registry
    Registry { selector_header: String },
    /// The named header carries the physical URL itself
    Direct { url_header: String },
}

impl Route {
    pub fn header(&self) -> &str {
        match self {
            Route::Registry { selector_header } => selector_header,
            Route::Direct { url_header } => url_header,
        }
    }
}

/// Per-backend request/response transformation
pub trait BackendAdapter: Send + Sync {
    /// Short name used in logs and timing metrics
    fn name(&self) -> &'static str;

    fn route(&self) -> &Route;

    /// Outbound timeout for this backend
    fn timeout(&self) -> Duration;

    /// Build the outbound call for `url` from the caller's request
    fn prepare(&self, inbound: &InboundRequest, url: &str) -> Result<OutboundCall>;

    /// Post-process the relayed response
    fn postprocess(&self, response: ProxyResponse) -> ProxyResponse {
        response
    }
}
