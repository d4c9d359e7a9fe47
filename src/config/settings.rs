//! Proxy configuration settings

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use anyhow::{Context, Result};

/// Default outbound timeout for every backend, in seconds
pub const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 10;

/// Namespaces the bango billing schemas put credential fields under
pub const DEFAULT_BANGO_NAMESPACES: [&str; 2] = [
    "com.bango.webservices.billingconfiguration",
    "com.bango.webservices.mozillaexporter",
];

/// Main configuration for the credential proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Server listening address
    pub listen_addr: SocketAddr,

    /// Log level configuration
    pub log_level: String,

    /// Administrative switch; a disabled proxy answers 404 to everything
    pub enabled: bool,

    /// Maximum inbound request body size in bytes
    pub max_body_size: usize,

    /// Names of the routing headers read from inbound requests
    pub headers: HeaderNames,

    /// Logical service name -> physical backend URL
    pub services: HashMap<String, String>,

    /// Token-authenticated (paypal-style) backend
    pub paypal: PaypalConfig,

    /// XML-credential (bango-style) backend
    pub bango: BangoConfig,

    /// Outbound HTTP client configuration
    pub http_client: HttpClientConfig,
}

/// Inbound header names, stored lower-case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderNames {
    /// Selects a logical service from the registry
    pub service: String,

    /// Optional URL-encoded auth token
    pub token: String,

    /// Physical URL for per-call routed backends
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaypalConfig {
    /// Outbound timeout in seconds
    pub timeout_secs: u64,

    pub user_id: String,
    pub password: String,
    pub signature: String,
    pub application_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BangoConfig {
    /// Outbound timeout in seconds
    pub timeout_secs: u64,

    /// Substituted into username elements
    pub username: String,

    /// Substituted into password elements
    pub password: String,

    /// Namespaces in which credential elements are recognized
    pub namespaces: Vec<String>,

    pub username_tag: String,
    pub password_tag: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum idle connections per host
    pub max_idle_per_host: usize,

    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            log_level: "info".to_string(),
            enabled: false,
            max_body_size: 1024 * 1024, // 1MB
            headers: HeaderNames::default(),
            services: HashMap::new(),
            paypal: PaypalConfig::default(),
            bango: BangoConfig::default(),
            http_client: HttpClientConfig::default(),
        }
    }
}

impl Default for HeaderNames {
    fn default() -> Self {
        Self {
            service: "x-proxy-service".to_string(),
            token: "x-proxy-token".to_string(),
            url: "x-proxy-url".to_string(),
        }
    }
}

impl Default for PaypalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
            user_id: String::new(),
            password: String::new(),
            signature: String::new(),
            application_id: String::new(),
        }
    }
}

impl Default for BangoConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_BACKEND_TIMEOUT_SECS,
            username: String::new(),
            password: String::new(),
            namespaces: DEFAULT_BANGO_NAMESPACES.iter().map(|ns| ns.to_string()).collect(),
            username_tag: "username".to_string(),
            password_tag: "password".to_string(),
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            max_idle_per_host: 50,
            idle_timeout_secs: 90,
        }
    }
}

impl PaypalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl BangoConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ProxyConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let mut config: ProxyConfig = serde_yaml::from_str(contents)?;
        config.normalize();
        Ok(config)
    }

    /// Load configuration from YAML file with environment variable overrides.
    /// A missing file yields the defaults, which keep the proxy disabled.
    /// This runs before logging is set up, so callers report the fallback.
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::from_yaml_file(path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override settings from environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("PROXY_LISTEN_ADDR") {
            self.listen_addr = addr
                .parse()
                .with_context(|| format!("Invalid PROXY_LISTEN_ADDR '{}'", addr))?;
        }

        if let Ok(log_level) = std::env::var("RUST_LOG") {
            self.log_level = log_level;
        }

        if let Ok(enabled) = std::env::var("PROXY_ENABLED") {
            self.enabled = enabled.to_lowercase() == "true";
        }

        if let Ok(timeout) = std::env::var("PAYPAL_TIMEOUT") {
            self.paypal.timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid PAYPAL_TIMEOUT '{}'", timeout))?;
        }

        if let Ok(timeout) = std::env::var("BANGO_TIMEOUT") {
            self.bango.timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid BANGO_TIMEOUT '{}'", timeout))?;
        }

        if let Ok(username) = std::env::var("BANGO_USERNAME") {
            self.bango.username = username;
        }

        if let Ok(password) = std::env::var("BANGO_PASSWORD") {
            self.bango.password = password;
        }

        Ok(())
    }

    /// Header lookups are case-insensitive, so names are kept lower-case
    fn normalize(&mut self) {
        self.headers.service = self.headers.service.to_lowercase();
        self.headers.token = self.headers.token.to_lowercase();
        self.headers.url = self.headers.url.to_lowercase();
    }
}
