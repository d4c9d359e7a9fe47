//! HTTP utility functions

use hyper::{header::HeaderValue, Body, HeaderMap, Response, StatusCode};
use std::collections::HashMap;

/// Convert HeaderMap to HashMap<String, String>. Values that are not
/// visible ASCII are decoded as ISO-8859-1 so no header goes missing.
pub fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();

    for (name, value) in headers {
        let value_str = match value.to_str() {
            Ok(value_str) => value_str.to_string(),
            Err(_) => value.as_bytes().iter().map(|&b| char::from(b)).collect(),
        };
        map.insert(name.to_string().to_lowercase(), value_str);
    }

    map
}

/// Build a response with a plain-text body
pub fn build_error_response(status: StatusCode, message: &str) -> Response<Body> {
    let mut response = Response::new(Body::from(message.to_string()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
