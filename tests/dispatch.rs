//! End-to-end dispatch against a local mock backend

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use credential_proxy::proxy::server::handle_request;
use credential_proxy::{build_routes, InboundRequest, ProxyConfig, ProxyResponse, Routes};
use httpmock::Method::POST;
use httpmock::MockServer;

const BANGO_NS: &str = "com.bango.webservices.billingconfiguration";

fn config(services: HashMap<String, String>) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.enabled = true;
    config.services = services;
    config.paypal.user_id = "merchant".into();
    config.paypal.password = "paypal-pass".into();
    config.paypal.signature = "paypal-sig".into();
    config.paypal.application_id = "APP-1".into();
    config.bango.username = "bango-user".into();
    config.bango.password = "bango-pass".into();
    config
}

fn routes(config: &ProxyConfig) -> Routes {
    build_routes(config).unwrap()
}

async fn refused_url() -> String {
    // Bind a listener, capture its port, then drop it so connections are refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/pay", port)
}

fn bango_body() -> String {
    format!(
        r#"<ns0:getPackage xmlns:ns0="{ns}"><ns0:username>x</ns0:username><ns0:password>y</ns0:password><ns0:name>shop</ns0:name></ns0:getPackage>"#,
        ns = BANGO_NS
    )
}

#[tokio::test]
async fn paypal_call_reaches_registered_url_with_credentials() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/AdaptivePayments/Pay")
                .header("x-paypal-security-userid", "merchant")
                .header("x-paypal-security-signature", "paypal-sig")
                .header("x-paypal-application-id", "APP-1")
                .header("x-paypal-request-data-format", "JSON")
                .body(r#"{"amount": "1.00"}"#);
            then.status(201).body(r#"{"payKey": "AP-1"}"#);
        })
        .await;

    let config = config(HashMap::from([(
        "get-pay-key".to_string(),
        server.url("/AdaptivePayments/Pay"),
    )]));
    let routes = routes(&config);
    let dispatcher = routes.find("/paypal").unwrap();
    let inbound = InboundRequest::new([("X-Proxy-Service", "get-pay-key")], r#"{"amount": "1.00"}"#);

    let response = dispatcher.handle(&inbound).await.unwrap();

    assert_eq!(response, ProxyResponse::new(201, r#"{"payKey": "AP-1"}"#));
    mock.assert_async().await;
}

#[tokio::test]
async fn paypal_token_is_forwarded_as_authorization() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/pay")
                .header("x-paypal-authorization", "token=abc&verifier=def");
            then.status(200).body("ok");
        })
        .await;

    let config = config(HashMap::from([("pay".to_string(), server.url("/pay"))]));
    let routes = routes(&config);
    let inbound = InboundRequest::new(
        [("x-proxy-service", "pay"), ("x-proxy-token", "verifier=def&token=abc")],
        "{}",
    );

    let response = routes.find("/paypal").unwrap().handle(&inbound).await.unwrap();

    assert_eq!(response.status_code, 200);
    mock.assert_async().await;
}

#[tokio::test]
async fn backend_error_status_is_relayed() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.any_request();
            then.status(503).body("service unavailable");
        })
        .await;

    let config = config(HashMap::from([("pay".to_string(), server.url("/pay"))]));
    let routes = routes(&config);
    let inbound = InboundRequest::new([("x-proxy-service", "pay")], "{}");

    let response = routes.find("/paypal").unwrap().handle(&inbound).await.unwrap();

    assert_eq!(response, ProxyResponse::new(503, "service unavailable"));
}

#[tokio::test]
async fn bango_credentials_are_substituted() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/billing")
                .header("content-type", "text/xml; charset=utf-8")
                .body_contains("<ns0:username>bango-user</ns0:username>")
                .body_contains("<ns0:password>bango-pass</ns0:password>")
                .body_contains("<ns0:name>shop</ns0:name>");
            then.status(200).body("<ok/>");
        })
        .await;

    let config = config(HashMap::new());
    let routes = routes(&config);
    let url = server.url("/billing");
    let inbound = InboundRequest::new([("x-proxy-url", url.as_str())], bango_body());

    let response = routes.find("/bango").unwrap().handle(&inbound).await.unwrap();

    assert_eq!(response, ProxyResponse::new(200, "<ok/>"));
    mock.assert_async().await;
}

#[tokio::test]
async fn malformed_xml_never_reaches_backend() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200).body("should not reach here");
        })
        .await;

    let config = config(HashMap::new());
    let routes = routes(&config);
    let url = server.url("/billing");
    let inbound = InboundRequest::new([("x-proxy-url", url.as_str())], "<getPackage>");

    let err = routes.find("/bango").unwrap().handle(&inbound).await.unwrap_err();

    assert!(matches!(err, credential_proxy::Error::MalformedBody(_)));
    assert_eq!(mock.hits_async().await, 0);
}

#[tokio::test]
async fn refused_connection_becomes_bare_500() {
    let url = refused_url().await;
    let config = config(HashMap::from([("pay".to_string(), url.clone())]));
    let routes = routes(&config);

    let paypal = InboundRequest::new([("x-proxy-service", "pay")], "{}");
    let response = routes.find("/paypal").unwrap().handle(&paypal).await.unwrap();
    assert_eq!(response, ProxyResponse::internal_error());
    assert!(response.body.is_empty());

    let bango = InboundRequest::new([("x-proxy-url", url.as_str())], bango_body());
    let response = routes.find("/bango").unwrap().handle(&bango).await.unwrap();
    assert_eq!(response, ProxyResponse::internal_error());
}

#[tokio::test]
async fn slow_backend_times_out_as_500() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.any_request();
            then.status(200).body("too late").delay(Duration::from_secs(3));
        })
        .await;

    let mut config = config(HashMap::new());
    config.bango.timeout_secs = 1;
    let routes = routes(&config);
    let url = server.url("/billing");
    let inbound = InboundRequest::new([("x-proxy-url", url.as_str())], bango_body());

    let started = std::time::Instant::now();
    let response = routes.find("/bango").unwrap().handle(&inbound).await.unwrap();

    assert_eq!(response, ProxyResponse::internal_error());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn http_layer_relays_backend_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/pay");
            then.status(202).body("accepted");
        })
        .await;

    let config = config(HashMap::from([("pay".to_string(), server.url("/pay"))]));
    let routes = Arc::new(routes(&config));
    let request = hyper::Request::builder()
        .method("POST")
        .uri("/paypal/pay")
        .header("X-Proxy-Service", "pay")
        .body(hyper::Body::from("{}"))
        .unwrap();

    let response = handle_request(request, routes, config.max_body_size).await.unwrap();

    assert_eq!(response.status(), hyper::StatusCode::ACCEPTED);
    let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
    assert_eq!(body.as_ref(), b"accepted");
}
