//! API error responses.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::GatewayError;
use serde_json::{json, Map, Value};

/// Error returned by handlers, rendered as a JSON body
#[derive(Debug, Clone)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Machine-readable error type
    pub error_type: &'static str,
    /// Human-readable message
    pub message: String,
    /// `Retry-After` in whole seconds
    pub retry_after: Option<u64>,
    /// Extra fields merged into the body
    pub details: Map<String, Value>,
}

impl ApiError {
    /// Create an error
    #[must_use]
    pub fn new(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type,
            message: message.into(),
            retry_after: None,
            details: Map::new(),
        }
    }

    /// 400
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    /// 404
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// 503
    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
    }

    /// 500
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// Attach an extra body field
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        let status = StatusCode::from_u16(error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut api = Self::new(status, error.error_type(), error.to_string());
        api.retry_after = error
            .retry_after()
            .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0));

        match error {
            GatewayError::UpstreamHttp { status, .. } => api.with_detail("upstream_status", status),
            GatewayError::UpstreamUnavailable { attempts, .. } => api.with_detail("attempts", attempts),
            GatewayError::AdmissionDenied { .. } => match api.retry_after {
                Some(secs) => api.with_detail("retry_after", secs),
                None => api,
            },
            _ => api,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = self.details;
        body.insert("error".to_string(), json!(self.message));
        body.insert("type".to_string(), json!(self.error_type));

        let mut response = (self.status, Json(Value::Object(body))).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
