//! Client metadata captured for the consent audit trail.

use std::convert::Infallible;
use std::net::IpAddr;

use axum::extract::FromRequestParts;
use http::request::Parts;
use ipnetwork::IpNetwork;
use medlens_core::StrExt;

use crate::middleware::ClientIp;

/// Maximum stored user-agent length (characters).
pub const MAX_USER_AGENT_LEN: usize = 500;

/// IP address and user agent of the caller.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientContext {
    ip_address: Option<IpAddr>,
    user_agent: Option<String>,
}

impl ClientContext {
    #[must_use]
    pub fn with_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.ip_address = ip;
        self
    }

    /// Set the user agent, blank-as-none and truncated to [`MAX_USER_AGENT_LEN`].
    #[must_use]
    pub fn with_user_agent(mut self, ua: Option<&str>) -> Self {
        self.user_agent = ua
            .and_then(str::to_opt)
            .map(|ua| ua.truncate_chars(MAX_USER_AGENT_LEN).to_string());
        self
    }

    #[must_use]
    pub const fn ip_address(&self) -> Option<IpAddr> {
        self.ip_address
    }

    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// IP as a host network for the `inet` column.
    #[must_use]
    pub fn ip_network(&self) -> Option<IpNetwork> {
        self.ip_address.map(IpNetwork::from)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = ClientIp::resolve(&parts.headers, &parts.extensions);
        let user_agent = parts
            .headers
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok());

        Ok(Self::default().with_ip(ip.ip()).with_user_agent(user_agent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_is_truncated() {
        let long = "x".repeat(MAX_USER_AGENT_LEN + 20);
        let ctx = ClientContext::default().with_user_agent(Some(&long));
        assert_eq!(ctx.user_agent().unwrap().len(), MAX_USER_AGENT_LEN);
    }

    #[test]
    fn blank_user_agent_is_none() {
        let ctx = ClientContext::default().with_user_agent(Some("   "));
        assert_eq!(ctx.user_agent(), None);
    }

    #[tokio::test]
    async fn extracts_from_request() {
        let (mut parts, ()) = http::Request::builder()
            .header("x-real-ip", "192.0.2.44")
            .header("user-agent", "Mozilla/5.0")
            .body(())
            .unwrap()
            .into_parts();

        let ctx = ClientContext::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(ctx.ip_address(), Some("192.0.2.44".parse().unwrap()));
        assert_eq!(ctx.user_agent(), Some("Mozilla/5.0"));
        assert!(ctx.ip_network().is_some_and(|net| net.prefix() == 32));
    }
}
