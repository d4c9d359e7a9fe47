//! Logical service name -> physical backend URL mapping

use std::collections::HashMap;
use tracing::warn;

use crate::error::{Error, Result};
use crate::utils::{is_https, parse_url};

/// Read-only lookup table built once at startup
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashMap<String, String>,
}

impl EndpointRegistry {
    /// Build the registry, rejecting entries that are not valid URLs.
    /// Plain-HTTP endpoints are accepted but logged.
    pub fn new<I, K, V>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut endpoints = HashMap::new();

        for (service, url) in entries {
            let service = service.into();
            let url = url.into();
            let parsed = parse_url(&url).map_err(|e| {
                Error::Config(format!("Invalid URL for service '{}': {}", service, e))
            })?;
            if !is_https(&parsed) {
                warn!(service = %service, "Registered endpoint does not use HTTPS");
            }
            endpoints.insert(service, url);
        }

        Ok(Self { endpoints })
    }

    /// Exact, case-sensitive lookup
    pub fn lookup(&self, service: &str) -> Result<&str> {
        self.endpoints
            .get(service)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownService(service.to_string()))
    }
}
