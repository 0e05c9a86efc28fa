//! Custom Axum extractors for the gateway.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, FromRequestParts, Request},
    http::{request::Parts, Extensions, HeaderMap},
};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use tracing::debug;

use crate::error::ApiError;

/// Key used when nothing identifies the client
pub const FALLBACK_CLIENT_KEY: &str = "127.0.0.1";

/// Client identity used as the rate-limit key.
///
/// Resolved from the first `X-Forwarded-For` entry, then `X-Real-IP`, then
/// the connection peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(client_key(&parts.headers, &parts.extensions)))
    }
}

/// Resolve the client key from request headers and extensions
#[must_use]
pub fn client_key(headers: &HeaderMap, extensions: &Extensions) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(String::from)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| FALLBACK_CLIENT_KEY.to_string())
}

/// JSON body extractor with a JSON error response
#[derive(Debug)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = axum::body::Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {e}")))?;

        let value: T = serde_json::from_slice(&bytes).map_err(|e| {
            debug!(error = %e, "JSON parse error");
            ApiError::bad_request(format!("Invalid JSON: {e}"))
        })?;

        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> String {
        let (mut parts, _body) = request.into_parts();
        ClientIp::from_request_parts(&mut parts, &()).await.unwrap().0
    }

    #[tokio::test]
    async fn test_forwarded_for_first_entry_wins() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .header("x-real-ip", "198.51.100.4")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, "203.0.113.9");
    }

    #[tokio::test]
    async fn test_real_ip_fallback() {
        let request = Request::builder()
            .header("x-real-ip", "198.51.100.4")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, "198.51.100.4");
    }

    #[tokio::test]
    async fn test_peer_address_fallback() {
        let mut request = Request::builder().body(()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 7], 51000))));
        assert_eq!(extract(request).await, "192.0.2.7");
    }

    #[tokio::test]
    async fn test_default_key() {
        let request = Request::builder()
            .header("x-forwarded-for", "")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await, FALLBACK_CLIENT_KEY);
    }
}
