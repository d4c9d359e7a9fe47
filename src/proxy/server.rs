//! Inbound HTTP server
//!
//! Converts hyper requests into [`InboundRequest`]s, picks the dispatcher by
//! path prefix and maps dispatcher errors onto HTTP statuses.

use anyhow::Result;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::models::{InboundRequest, ProxyResponse};
use crate::proxy::dispatcher::Dispatcher;
use crate::utils::{build_error_response, headers_to_map};

/// Path prefix -> dispatcher table
#[derive(Default)]
pub struct Routes {
    entries: Vec<(String, Arc<Dispatcher>)>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `prefix` (e.g. "/paypal") and everything below it with `dispatcher`
    pub fn add(mut self, prefix: impl Into<String>, dispatcher: Arc<Dispatcher>) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        self.entries.push((prefix, dispatcher));
        self
    }

    pub fn find(&self, path: &str) -> Option<&Arc<Dispatcher>> {
        self.entries
            .iter()
            .find(|(prefix, _)| {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .map(|(_, dispatcher)| dispatcher)
    }
}

pub struct ProxyServer {
    listen_addr: SocketAddr,
    max_body_size: usize,
    routes: Arc<Routes>,
}

impl ProxyServer {
    pub fn new(listen_addr: SocketAddr, max_body_size: usize, routes: Routes) -> Self {
        Self {
            listen_addr,
            max_body_size,
            routes: Arc::new(routes),
        }
    }

    /// Serve until Ctrl-C
    pub async fn start(self) -> Result<()> {
        info!("Starting credential proxy on {}", self.listen_addr);

        let routes = Arc::clone(&self.routes);
        let max_body_size = self.max_body_size;
        let make_svc = make_service_fn(move |conn: &hyper::server::conn::AddrStream| {
            let routes = Arc::clone(&routes);
            debug!("New connection from: {}", conn.remote_addr());

            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let routes = Arc::clone(&routes);
                    async move { handle_request(req, routes, max_body_size).await }
                }))
            }
        });

        let server = Server::try_bind(&self.listen_addr)?
            .serve(make_svc)
            .with_graceful_shutdown(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                info!("🛑 Shutting down credential proxy");
            });

        server.await?;
        Ok(())
    }
}

/// Handle one inbound HTTP request
pub async fn handle_request(
    req: Request<Body>,
    routes: Arc<Routes>,
    max_body_size: usize,
) -> std::result::Result<Response<Body>, Infallible> {
    let path = req.uri().path().to_string();
    let dispatcher = match routes.find(&path) {
        Some(dispatcher) => Arc::clone(dispatcher),
        None => return Ok(build_error_response(StatusCode::NOT_FOUND, "Not Found")),
    };

    if !dispatcher.is_enabled() {
        return Ok(to_http_response(ProxyResponse::not_found()));
    }

    // Backends are only ever called with POST
    if req.method() != Method::POST {
        return Ok(build_error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"));
    }

    let declared_length = req
        .headers()
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared_length.is_some_and(|len| len > max_body_size) {
        return Ok(build_error_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"));
    }

    let (parts, body) = req.into_parts();
    let body = match hyper::body::to_bytes(body).await {
        Ok(body) if body.len() > max_body_size => {
            return Ok(build_error_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large"));
        }
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Ok(build_error_response(StatusCode::BAD_REQUEST, "Unreadable request body"));
        }
    };

    let inbound = InboundRequest::new(headers_to_map(&parts.headers), body);
    debug!(path = %path, adapter = dispatcher.adapter_name(), "Dispatching request");

    let response = match dispatcher.handle(&inbound).await {
        Ok(response) => to_http_response(response),
        Err(e) => error_response(&e),
    };
    Ok(response)
}

fn to_http_response(response: ProxyResponse) -> Response<Body> {
    let status = StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut http_response = Response::new(Body::from(response.body));
    *http_response.status_mut() = status;
    http_response
}

/// Map dispatcher errors onto HTTP statuses
pub fn error_response(err: &Error) -> Response<Body> {
    match err {
        Error::MissingRouteHeader(_) | Error::MalformedBody(_) => {
            build_error_response(StatusCode::BAD_REQUEST, &err.to_string())
        }
        Error::UnknownService(_) => build_error_response(StatusCode::NOT_FOUND, &err.to_string()),
        _ => {
            error!(error = %err, "Request handling failed");
            build_error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticAuthHeaders;
    use crate::config::{BangoConfig, HeaderNames, HttpClientConfig, PaypalConfig};
    use crate::metrics::Metrics;
    use crate::proxy::registry::EndpointRegistry;
    use crate::proxy::token_auth::TokenAuthAdapter;
    use crate::proxy::transport::ReqwestTransport;
    use crate::proxy::xml_credential::XmlCredentialAdapter;

    fn routes(enabled: bool) -> Arc<Routes> {
        let headers = HeaderNames::default();
        let registry = Arc::new(
            EndpointRegistry::new([("get-pay-key", "https://svcs.paypal.com/AdaptivePayments/Pay")])
                .unwrap(),
        );
        let transport = Arc::new(ReqwestTransport::new(&HttpClientConfig::default()).unwrap());
        let paypal = TokenAuthAdapter::new(
            &headers,
            &PaypalConfig::default(),
            Arc::new(StaticAuthHeaders::from_config(&PaypalConfig::default())),
        );
        let bango = XmlCredentialAdapter::new(&headers, &BangoConfig::default());

        Arc::new(
            Routes::new()
                .add(
                    "/paypal",
                    Arc::new(Dispatcher::new(
                        enabled,
                        Arc::new(paypal),
                        registry.clone(),
                        transport.clone(),
                        Metrics::global(),
                    )),
                )
                .add(
                    "/bango/",
                    Arc::new(Dispatcher::new(enabled, Arc::new(bango), registry, transport, Metrics::global())),
                ),
        )
    }

    fn post(path: &str, headers: &[(&str, &str)], body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_route_matching() {
        let routes = routes(true);
        assert_eq!(routes.find("/paypal").unwrap().adapter_name(), "paypal");
        assert_eq!(routes.find("/paypal/pay").unwrap().adapter_name(), "paypal");
        assert_eq!(routes.find("/bango/").unwrap().adapter_name(), "bango");
        assert!(routes.find("/paypalx").is_none());
        assert!(routes.find("/").is_none());
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let response = handle_request(post("/stripe", &[], ""), routes(true), 1024).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_is_405() {
        let request = Request::builder()
            .method("GET")
            .uri("/paypal/")
            .body(Body::empty())
            .unwrap();
        let response = handle_request(request, routes(true), 1024).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_missing_header_is_400() {
        let response = handle_request(post("/paypal/", &[], "{}"), routes(true), 1024)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("x-proxy-service"));
    }

    #[tokio::test]
    async fn test_unknown_service_is_404() {
        let request = post("/paypal/", &[("X-Proxy-Service", "refund")], "{}");
        let response = handle_request(request, routes(true), 1024).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_xml_is_400() {
        let request = post("/bango/", &[("X-Proxy-Url", "https://webservices.bango.com/")], "<a>");
        let response = handle_request(request, routes(true), 1024).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let request = post("/bango/", &[("X-Proxy-Url", "https://webservices.bango.com/")], "<a></a>");
        let response = handle_request(request, routes(true), 4).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_disabled_proxy_is_404() {
        let request = post("/paypal/", &[("X-Proxy-Service", "get-pay-key")], "{}");
        let response = handle_request(request, routes(false), 1024).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_proxy_is_404_before_method_and_size_checks() {
        let get = Request::builder()
            .method("GET")
            .uri("/bango/")
            .body(Body::empty())
            .unwrap();
        let response = handle_request(get, routes(false), 1024).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let oversized = post("/paypal/", &[("X-Proxy-Service", "get-pay-key")], "{\"amount\": \"1.00\"}");
        let response = handle_request(oversized, routes(false), 4).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_utf8_selector_is_looked_up_not_missing() {
        let request = Request::builder()
            .method("POST")
            .uri("/paypal/")
            .header("x-proxy-service", hyper::header::HeaderValue::from_bytes(b"pay\xff").unwrap())
            .body(Body::from("{}"))
            .unwrap();
        let response = handle_request(request, routes(true), 1024).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_text(response).await.contains("Unknown service"));
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = error_response(&Error::Auth("key file /etc/secret missing".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
