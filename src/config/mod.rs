//! Configuration loading

pub mod settings;

pub use settings::{BangoConfig, HeaderNames, HttpClientConfig, PaypalConfig, ProxyConfig};
