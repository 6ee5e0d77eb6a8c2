// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API key middleware for the gateway.
//!
//! The key is accepted from `X-Api-Key: <key>` or `Authorization: Bearer <key>`.
//! When no key is configured, all requests are rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Authentication configuration for the gateway.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected API key. `None` rejects every request.
    pub api_key: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Pulls the presented key out of the request headers, `X-Api-Key` first.
fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
        })
        .map(str::trim)
}

/// Middleware that lets a request through only with the configured API key.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = auth.api_key.as_deref().filter(|k| !k.is_empty()) else {
        tracing::error!("gateway has no api_key configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    };

    match presented_key(request.headers()) {
        Some(key) if key == expected => Ok(next.run(request).await),
        Some(_) => {
            tracing::debug!("rejected request with wrong api key");
            Err(StatusCode::UNAUTHORIZED)
        }
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn auth_config_debug_redacts_key() {
        let config = AuthConfig {
            api_key: Some("secret-key".to_string()),
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("secret-key"));
        assert!(debug_output.contains("[redacted]"));
    }

    #[test]
    fn x_api_key_wins_over_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("from-header"));
        headers.insert("authorization", HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(presented_key(&headers), Some("from-header"));
    }

    #[test]
    fn bearer_is_accepted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok"));
        assert_eq!(presented_key(&headers), Some("tok"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(presented_key(&headers), None);
    }
}
