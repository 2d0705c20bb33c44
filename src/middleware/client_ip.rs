//! Client IP address extraction.
//!
//! Reads standard proxy headers (`CF-Connecting-IP`, `X-Real-IP`,
//! `X-Forwarded-For`) and falls back to the socket peer address from
//! `ConnectInfo`. Used for the consent audit trail.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use http::request::Parts;
use http::{Extensions, HeaderMap};

/// Header priority for IP extraction (highest to lowest).
const IP_HEADERS: &[&str] = &[
    "cf-connecting-ip", // Cloudflare
    "x-real-ip",        // Nginx
    "x-forwarded-for",  // first IP in the chain
];

/// Best-effort client IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl ClientIp {
    /// Resolve from headers, then from the connection.
    #[must_use]
    pub fn resolve(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let from_headers = IP_HEADERS.iter().find_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        });

        Self(from_headers.or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip())
        }))
    }

    #[inline]
    #[must_use]
    pub const fn ip(&self) -> Option<IpAddr> {
        self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(&parts.headers, &parts.extensions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(req: &http::Request<()>) -> Option<IpAddr> {
        ClientIp::resolve(req.headers(), req.extensions()).ip()
    }

    #[test]
    fn takes_first_forwarded_address() {
        let req = http::Request::builder()
            .header("x-forwarded-for", "203.0.113.195, 70.41.3.18, 150.172.238.178")
            .body(())
            .unwrap();
        assert_eq!(resolve(&req), Some("203.0.113.195".parse().unwrap()));
    }

    #[test]
    fn cloudflare_header_wins() {
        let req = http::Request::builder()
            .header("x-forwarded-for", "203.0.113.195")
            .header("cf-connecting-ip", "198.51.100.9")
            .body(())
            .unwrap();
        assert_eq!(resolve(&req), Some("198.51.100.9".parse().unwrap()));
    }

    #[test]
    fn garbage_header_falls_through() {
        let req = http::Request::builder()
            .header("x-real-ip", "not-an-ip")
            .header("x-forwarded-for", "2001:db8::1")
            .body(())
            .unwrap();
        assert_eq!(resolve(&req), Some("2001:db8::1".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_connect_info() {
        let mut req = http::Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo("192.0.2.10:54321".parse::<SocketAddr>().unwrap()));
        assert_eq!(resolve(&req), Some("192.0.2.10".parse().unwrap()));
    }

    #[test]
    fn none_without_any_source() {
        let req = http::Request::builder().body(()).unwrap();
        assert_eq!(resolve(&req), None);
    }
}
