// Request source metadata for rate limiting and the audit journal

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Source identity attached to security events
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_parts(headers: &HeaderMap, addr: &SocketAddr) -> Self {
        Self {
            ip: Some(extract_client_ip(headers, addr)),
            user_agent: headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
        }
    }
}

/// Client IP for rate-limit keys: the first X-Forwarded-For entry when a
/// proxy supplied one, the peer address otherwise
pub fn extract_client_ip(headers: &HeaderMap, addr: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| addr.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn addr() -> SocketAddr {
        "192.168.1.50:44312".parse().unwrap()
    }

    #[test]
    fn test_peer_address_without_forwarding() {
        let headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers, &addr()), "192.168.1.50");
    }

    #[test]
    fn test_first_forwarded_entry_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.2, 10.0.0.3"),
        );
        assert_eq!(extract_client_ip(&headers, &addr()), "203.0.113.9");
    }

    #[test]
    fn test_blank_forwarded_header_falls_back() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));
        assert_eq!(extract_client_ip(&headers, &addr()), "192.168.1.50");
    }

    #[test]
    fn test_meta_captures_user_agent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("curl/8.0"),
        );

        let meta = RequestMeta::from_parts(&headers, &addr());
        assert_eq!(meta.ip.as_deref(), Some("192.168.1.50"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
    }
}
