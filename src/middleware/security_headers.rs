// Fixed security response headers
// Applied to every response. HSTS only makes sense over TLS, so it is keyed
// on the production flag (TLS terminates in front of the service there).

use axum::{
    body::Body,
    http::{header::HeaderValue, Request},
    middleware::Next,
    response::Response,
};

pub async fn security_headers_middleware(request: Request<Body>, next: Next) -> Response {
    let is_production = request
        .extensions()
        .get::<SecurityHeadersConfig>()
        .map(|c| c.hsts)
        .unwrap_or(false);

    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "x-xss-protection",
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'self'"),
    );
    headers.insert(
        "referrer-policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if is_production {
        headers.insert(
            "strict-transport-security",
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

/// Marker extension carrying the HSTS decision from the composition root
#[derive(Debug, Clone, Copy)]
pub struct SecurityHeadersConfig {
    pub hsts: bool,
}
