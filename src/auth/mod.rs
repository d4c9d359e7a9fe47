//! Auth header builders for token-authenticated backends

use std::collections::HashMap;

use crate::config::PaypalConfig;
use crate::error::Result;
use crate::models::AuthToken;

pub const HEADER_USER_ID: &str = "X-PAYPAL-SECURITY-USERID";
pub const HEADER_PASSWORD: &str = "X-PAYPAL-SECURITY-PASSWORD";
pub const HEADER_SIGNATURE: &str = "X-PAYPAL-SECURITY-SIGNATURE";
pub const HEADER_APPLICATION_ID: &str = "X-PAYPAL-APPLICATION-ID";
pub const HEADER_REQUEST_FORMAT: &str = "X-PAYPAL-REQUEST-DATA-FORMAT";
pub const HEADER_RESPONSE_FORMAT: &str = "X-PAYPAL-RESPONSE-DATA-FORMAT";
pub const HEADER_AUTHORIZATION: &str = "X-PAYPAL-AUTHORIZATION";

/// Produces the complete outbound header set for a call to `url`.
///
/// Implementations own whatever signing scheme the backend needs; the proxy
/// only hands over the target URL and the caller's parsed token.
pub trait AuthHeaderBuilder: Send + Sync {
    fn headers(&self, url: &str, token: Option<&AuthToken>) -> Result<HashMap<String, String>>;
}

/// Attaches the configured API credentials verbatim
#[derive(Debug, Clone)]
pub struct StaticAuthHeaders {
    user_id: String,
    password: String,
    signature: String,
    application_id: String,
}

impl StaticAuthHeaders {
    pub fn from_config(config: &PaypalConfig) -> Self {
        Self {
            user_id: config.user_id.clone(),
            password: config.password.clone(),
            signature: config.signature.clone(),
            application_id: config.application_id.clone(),
        }
    }
}

impl AuthHeaderBuilder for StaticAuthHeaders {
    fn headers(&self, _url: &str, token: Option<&AuthToken>) -> Result<HashMap<String, String>> {
        let mut headers = HashMap::from([
            (HEADER_USER_ID.to_string(), self.user_id.clone()),
            (HEADER_PASSWORD.to_string(), self.password.clone()),
            (HEADER_SIGNATURE.to_string(), self.signature.clone()),
            (HEADER_APPLICATION_ID.to_string(), self.application_id.clone()),
            (HEADER_REQUEST_FORMAT.to_string(), "JSON".to_string()),
            (HEADER_RESPONSE_FORMAT.to_string(), "JSON".to_string()),
        ]);

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.insert(HEADER_AUTHORIZATION.to_string(), token.to_urlencoded());
        }

        Ok(headers)
    }
}
