//! Custom Axum extractors.
//!
//! - `CorrelationId`: the request's correlation ID
//! - `ClientIp`: client address from the connection, or from forwarding
//!   headers set by a trusted proxy
//! - `UserAgent`: the `User-Agent` header
//! - `RequestDevice`: the two above folded into a [`DeviceMeta`]
//!
//! None of them reject a request; missing values are `None`.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use paddock_auth::DeviceMeta;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use uuid::Uuid;

use crate::middleware::CORRELATION_ID_HEADER;

/// Correlation ID for request tracing.
///
/// Taken from the correlation middleware when installed, otherwise from the
/// `X-Correlation-ID` header, otherwise freshly generated.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Self>()
            .copied()
            .unwrap_or_else(|| Self::from_headers(&parts.headers)))
    }
}

impl CorrelationId {
    /// ID from a well-formed `X-Correlation-ID` header, otherwise a fresh
    /// one.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self(
            headers
                .get(CORRELATION_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| Uuid::parse_str(s).ok())
                .unwrap_or_else(Uuid::new_v4),
        )
    }
}

/// Proxies whose forwarding headers are believed.
///
/// Empty by default: the client address is then always the connection's
/// peer, and `X-Forwarded-For` / `X-Real-IP` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedProxies(Arc<[IpAddr]>);

impl TrustedProxies {
    /// Trust the given proxy addresses.
    #[must_use]
    pub fn new(proxies: impl IntoIterator<Item = IpAddr>) -> Self {
        Self(proxies.into_iter().collect())
    }

    /// Returns `true` if `ip` is a trusted proxy.
    #[must_use]
    pub fn is_trusted(&self, ip: IpAddr) -> bool {
        self.0.contains(&ip)
    }

    /// Number of trusted proxies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no proxy is trusted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve the client address of a request that arrived from `peer`.
    ///
    /// Headers are read only when `peer` is trusted. `X-Forwarded-For` is
    /// walked from the right, skipping trusted hops; the first untrusted
    /// hop is the client. A malformed hop yields `None`.
    #[must_use]
    pub fn client_ip(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
        let peer = peer?;
        if !self.is_trusted(peer) {
            return Some(peer);
        }

        let forwarded: Vec<&str> = headers
            .get_all("X-Forwarded-For")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();

        for hop in forwarded.iter().rev() {
            match hop.parse::<IpAddr>() {
                Ok(ip) if self.is_trusted(ip) => {}
                Ok(ip) => return Some(ip),
                Err(_) => return None,
            }
        }

        headers
            .get("X-Real-IP")
            .and_then(|v| v.to_str().ok())
            .and_then(|ip| ip.trim().parse::<IpAddr>().ok())
            .or(Some(peer))
    }
}

/// Client IP address.
///
/// The connection's peer address, unless the peer is one of the
/// [`TrustedProxies`] in the router state; see
/// [`TrustedProxies::client_ip`]. `None` when the server runs without
/// connect info.
#[derive(Debug, Clone, Copy)]
pub struct ClientIp(pub Option<IpAddr>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    TrustedProxies: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        Ok(Self(TrustedProxies::from_ref(state).client_ip(&parts.headers, peer)))
    }
}

/// User-Agent header.
#[derive(Debug, Clone)]
pub struct UserAgent(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for UserAgent
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        Ok(Self(user_agent))
    }
}

/// Device metadata recorded with a new session.
#[derive(Debug, Clone)]
pub struct RequestDevice(pub DeviceMeta);

#[async_trait]
impl<S> FromRequestParts<S> for RequestDevice
where
    TrustedProxies: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ClientIp(ip) = ClientIp::from_request_parts(parts, state).await?;
        let UserAgent(user_agent) = UserAgent::from_request_parts(parts, state).await?;
        Ok(Self(DeviceMeta::from_request(ip, user_agent)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{Request, header};

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    #[tokio::test]
    async fn test_correlation_id_from_header() {
        let uuid = Uuid::new_v4();
        let req = Request::builder()
            .header(CORRELATION_ID_HEADER, uuid.to_string())
            .body(())
            .expect("Valid request");

        let mut parts = parts(req);
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    #[tokio::test]
    async fn test_correlation_id_prefers_extension() {
        let uuid = Uuid::new_v4();
        let mut req = Request::builder()
            .header(CORRELATION_ID_HEADER, Uuid::new_v4().to_string())
            .body(())
            .expect("Valid request");
        req.extensions_mut().insert(CorrelationId(uuid));

        let mut parts = parts(req);
        let correlation_id = CorrelationId::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(correlation_id.0, uuid);
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn from_peer(peer: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder();
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo::<SocketAddr>(format!("{peer}:51234").parse().unwrap()));
        parts(req)
    }

    async fn client_ip(proxies: &TrustedProxies, mut parts: Parts) -> Option<IpAddr> {
        ClientIp::from_request_parts(&mut parts, proxies).await.unwrap().0
    }

    #[tokio::test]
    async fn test_untrusted_peer_ignores_forwarding_headers() {
        let parts = from_peer(
            "192.0.2.7",
            &[("X-Forwarded-For", "203.0.113.1"), ("X-Real-IP", "203.0.113.2")],
        );
        assert_eq!(
            client_ip(&TrustedProxies::default(), parts).await,
            Some(ip("192.0.2.7"))
        );
    }

    #[tokio::test]
    async fn test_trusted_proxy_yields_rightmost_untrusted_hop() {
        let proxies = TrustedProxies::new([ip("10.0.0.1"), ip("10.0.0.2")]);
        // The leftmost entry is whatever the client claimed.
        let parts = from_peer(
            "10.0.0.1",
            &[("X-Forwarded-For", "6.6.6.6, 198.51.100.7, 10.0.0.2")],
        );
        assert_eq!(client_ip(&proxies, parts).await, Some(ip("198.51.100.7")));
    }

    #[tokio::test]
    async fn test_trusted_proxy_with_malformed_hop() {
        let proxies = TrustedProxies::new([ip("10.0.0.1")]);
        let parts = from_peer("10.0.0.1", &[("X-Forwarded-For", "198.51.100.7, garbage")]);
        assert_eq!(client_ip(&proxies, parts).await, None);
    }

    #[tokio::test]
    async fn test_trusted_proxy_falls_back_to_x_real_ip_then_peer() {
        let proxies = TrustedProxies::new([ip("10.0.0.1")]);

        let parts = from_peer("10.0.0.1", &[("X-Real-IP", "198.51.100.42")]);
        assert_eq!(client_ip(&proxies, parts).await, Some(ip("198.51.100.42")));

        let parts = from_peer("10.0.0.1", &[]);
        assert_eq!(client_ip(&proxies, parts).await, Some(ip("10.0.0.1")));
    }

    #[tokio::test]
    async fn test_client_ip_absent_without_connect_info() {
        let req = Request::builder()
            .header("X-Forwarded-For", "203.0.113.1")
            .body(())
            .unwrap();
        assert_eq!(client_ip(&TrustedProxies::default(), parts(req)).await, None);
    }

    #[tokio::test]
    async fn test_request_device() {
        let parts = &mut from_peer(
            "198.51.100.42",
            &[(header::USER_AGENT.as_str(), "Mozilla/5.0 (iPad; CPU OS 17_0)")],
        );
        let RequestDevice(device) = RequestDevice::from_request_parts(parts, &TrustedProxies::default())
            .await
            .expect("Should extract");

        assert_eq!(device.device_type, "tablet");
        assert_eq!(device.ip_address, Some(ip("198.51.100.42")));
        assert!(device.user_agent.is_some());
    }
}
