//! Shared-secret authentication for write endpoints.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::ApiError;

/// Header carrying the API secret.
pub const X_API_SECRET: &str = "x-api-secret";

/// Holds the currently configured API secret.
pub struct ApiAuth {
    secret: ArcSwap<String>,
}

impl ApiAuth {
    pub fn new(secret: String) -> Self {
        if secret.is_empty() {
            tracing::warn!("No API secret configured, write endpoints will refuse every request");
        }
        Self {
            secret: ArcSwap::from_pointee(secret),
        }
    }

    pub fn reconfigure(&self, secret: String) {
        self.secret.store(Arc::new(secret));
    }

    /// Check the credential carried by `headers`.
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let presented = presented_secret(headers).ok_or(ApiError::Unauthenticated)?;
        let expected = self.secret.load();

        if !expected.is_empty() && constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
            Ok(())
        } else {
            Err(ApiError::Forbidden)
        }
    }
}

/// The secret from `X-API-Secret`, else from `Authorization: Bearer`.
fn presented_secret(headers: &HeaderMap) -> Option<&str> {
    if let Some(secret) = headers.get(X_API_SECRET).and_then(|v| v.to_str().ok()) {
        return Some(secret);
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Middleware rejecting requests without the configured API secret.
pub async fn require_api_secret(
    State(auth): State<Arc<ApiAuth>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match auth.verify(request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), status = %e.status(), "Rejected write request");
            e.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_accepts_either_header() {
        let auth = ApiAuth::new("s3cret".into());
        assert!(auth.verify(&headers(X_API_SECRET, "s3cret")).is_ok());
        assert!(auth.verify(&headers("authorization", "Bearer s3cret")).is_ok());
    }

    #[test]
    fn test_missing_vs_wrong_secret() {
        let auth = ApiAuth::new("s3cret".into());
        assert!(matches!(auth.verify(&HeaderMap::new()), Err(ApiError::Unauthenticated)));
        assert!(matches!(
            auth.verify(&headers(X_API_SECRET, "guess")),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn test_empty_configured_secret_refuses_all() {
        let auth = ApiAuth::new(String::new());
        assert!(matches!(
            auth.verify(&headers("authorization", "Bearer anything")),
            Err(ApiError::Forbidden)
        ));

        auth.reconfigure("rotated".into());
        assert!(auth.verify(&headers(X_API_SECRET, "rotated")).is_ok());
    }
}
