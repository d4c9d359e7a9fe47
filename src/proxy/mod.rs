//! Credential-injecting proxy

pub mod core;
pub mod dispatcher;
pub mod registry;
pub mod server;
pub mod token_auth;
pub mod transport;
pub mod xml_credential;

// Re-exports
pub use core::{BackendAdapter, Route};
pub use dispatcher::Dispatcher;
pub use registry::EndpointRegistry;
pub use server::{ProxyServer, Routes};
pub use token_auth::TokenAuthAdapter;
pub use transport::{ReqwestTransport, Transport};
pub use xml_credential::XmlCredentialAdapter;
