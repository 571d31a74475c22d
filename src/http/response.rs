//! Response envelopes and error mapping.
//!
//! # Responsibilities
//! - Wrap successful payloads in `{success: true, ...}`
//! - Map every domain error to a status code and `{success: false, message}`
//!
//! # Design Decisions
//! - One error type for the HTTP surface; handlers return `Result<_, ApiError>`
//! - Store failures are logged in full but answered with a generic message

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::director::DirectorError;
use crate::registry::RegistryError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        missing: Vec<&'static str>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("No hot nodes available at this time")]
    NoCandidates,

    #[error("All hot nodes are currently unavailable. Please try again later.")]
    NoEligible,

    #[error("{message}")]
    Throttled { message: String, retry_after_secs: u64 },

    #[error("Authentication required. Provide X-API-Secret header or Authorization Bearer token.")]
    Unauthenticated,

    #[error("Invalid API secret")]
    Forbidden,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NoCandidates | ApiError::NoEligible => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = json!({ "success": false, "message": self.to_string() });
        if let ApiError::Validation { missing, .. } = &self {
            body["missingFields"] = json!(missing);
        }

        let mut response = (status, Json(body)).into_response();
        if let ApiError::Throttled { retry_after_secs, .. } = self {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<DirectorError> for ApiError {
    fn from(err: DirectorError) -> Self {
        match err {
            DirectorError::NoCandidates => ApiError::NoCandidates,
            DirectorError::NoEligible => ApiError::NoEligible,
            DirectorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            DirectorError::Validation { ref missing } => ApiError::Validation {
                missing: missing.clone(),
                message: err.to_string(),
            },
            DirectorError::StoreUnavailable(reason) => {
                tracing::error!(error = %reason, "Node store unavailable");
                ApiError::Internal("Node store unavailable".into())
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        DirectorError::from(err).into()
    }
}

/// `{success: true, <extra fields>}` with the given status.
pub fn success(status: StatusCode, fields: Value) -> Response {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    if let Value::Object(extra) = fields {
        body.extend(extra);
    }
    (status, Json(Value::Object(body))).into_response()
}

/// `{success: true, data}` with status 200.
pub fn data<T: Serialize>(data: T) -> Response {
    match serde_json::to_value(data) {
        Ok(value) => success(StatusCode::OK, json!({ "data": value })),
        Err(e) => ApiError::Internal(format!("Failed to encode response: {}", e)).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::NoCandidates.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::NoEligible.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ApiError::Unauthenticated.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(RegistryError::StoreUnavailable("disk full".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::from(RegistryError::NotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_throttled_sets_retry_after() {
        let response = ApiError::Throttled {
            message: "slow down".into(),
            retry_after_secs: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "42");
    }

    #[test]
    fn test_validation_lists_missing_fields() {
        let err = ApiError::from(RegistryError::Validation {
            missing: vec!["name", "url"],
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().contains("name, url"));
    }
}
