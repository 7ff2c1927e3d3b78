//! Rate Limiting Middleware
//!
//! Applies the fixed-window limiter to every request, keyed by client IP.
//! Proxy headers are consulted before the connection address so limits
//! follow the real client through load balancers. Rejected requests get a
//! 429 with a Retry-After header and never reach the handler stack.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error type for rate limit middleware.
#[derive(Debug)]
pub struct RateLimitError {
    /// Seconds until the window has room again.
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let error = ApiError::too_many_requests(Some(self.retry_after));

        let mut response = (StatusCode::TOO_MANY_REQUESTS, axum::Json(error)).into_response();
        response.headers_mut().insert(
            axum::http::header::RETRY_AFTER,
            HeaderValue::from_str(&self.retry_after.to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("60")),
        );
        response
    }
}

// ============================================================================
// CLIENT IDENTIFICATION
// ============================================================================

/// Extract the client identifier, considering proxy headers.
fn extract_client_key(request: &Request, fallback: Option<SocketAddr>) -> String {
    // X-Forwarded-For can contain multiple IPs, take the first one
    if let Some(forwarded_for) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        if let Some(first_ip) = forwarded_for.split(',').next() {
            let first_ip = first_ip.trim();
            if !first_ip.is_empty() {
                return first_ip.to_string();
            }
        }
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
    {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    match fallback {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Rate limiting middleware.
///
/// Admitted responses carry an X-RateLimit-Limit header; rejected requests
/// return 429 Too Many Requests with Retry-After.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    if !state.config.rate_limit_enabled {
        return Ok(next.run(request).await);
    }

    let key = extract_client_key(&request, connect_info.map(|ConnectInfo(addr)| addr));

    match state.limiter.allow(&key) {
        crate::ratelimiter::RateLimitDecision::Allowed => {
            let limit = state.config.rate_limit_requests;
            let mut response = next.run(request).await;
            response.headers_mut().insert(
                axum::http::header::HeaderName::from_static("x-ratelimit-limit"),
                HeaderValue::from_str(&limit.to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("20")),
            );
            Ok(response)
        }
        crate::ratelimiter::RateLimitDecision::Limited { retry_after } => {
            tracing::debug!(client = %key, "Request rate limited");
            Err(RateLimitError {
                retry_after: retry_after.as_secs().max(1),
            })
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::config::ApiConfig;
    use crate::mailer::mock::MockMailer;
    use crate::state::AppState;
    use axum::{body::Body, http::Request as HttpRequest, middleware, routing::get, Router};
    use gather_store::mocks::{MockComments, MockPosts, MockUserCache, MockUsers};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(requests: u32, enabled: bool) -> AppState {
        let config = ApiConfig {
            rate_limit_enabled: enabled,
            rate_limit_requests: requests,
            rate_limit_window: Duration::from_secs(60),
            ..ApiConfig::default()
        };
        AppState::new(
            Arc::new(MockUsers::new()),
            Arc::new(MockPosts::new()),
            Arc::new(MockComments::new()),
            Some(Arc::new(MockUserCache::new())),
            Arc::new(MockMailer::new()),
            config,
            AuthConfig::default(),
        )
    }

    fn test_app(state: AppState) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
    }

    #[tokio::test]
    async fn test_requests_beyond_limit_rejected() -> Result<(), String> {
        let app = test_app(test_state(2, true));

        for _ in 0..2 {
            let request = HttpRequest::builder()
                .uri("/ping")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
                .map_err(|e| e.to_string())?;
            let response = app
                .clone()
                .oneshot(request)
                .await
                .map_err(|e| format!("Request failed: {:?}", e))?;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().contains_key("x-ratelimit-limit"));
        }

        let request = HttpRequest::builder()
            .uri("/ping")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .map_err(|e| e.to_string())?;
        let response = app
            .oneshot(request)
            .await
            .map_err(|e| format!("Request failed: {:?}", e))?;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        Ok(())
    }

    #[tokio::test]
    async fn test_limits_are_per_client() -> Result<(), String> {
        let app = test_app(test_state(1, true));

        for ip in ["203.0.113.1", "203.0.113.2", "203.0.113.3"] {
            let request = HttpRequest::builder()
                .uri("/ping")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .map_err(|e| e.to_string())?;
            let response = app
                .clone()
                .oneshot(request)
                .await
                .map_err(|e| format!("Request failed: {:?}", e))?;
            assert_eq!(response.status(), StatusCode::OK);
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_disabled_limiter_admits_everything() -> Result<(), String> {
        let app = test_app(test_state(1, false));

        for _ in 0..5 {
            let request = HttpRequest::builder()
                .uri("/ping")
                .header("x-forwarded-for", "203.0.113.9")
                .body(Body::empty())
                .map_err(|e| e.to_string())?;
            let response = app
                .clone()
                .oneshot(request)
                .await
                .map_err(|e| format!("Request failed: {:?}", e))?;
            assert_eq!(response.status(), StatusCode::OK);
        }
        Ok(())
    }

    #[test]
    fn test_forwarded_for_takes_first_ip() {
        let request = HttpRequest::builder()
            .uri("/")
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_key(&request, None), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let request = HttpRequest::builder()
            .uri("/")
            .header("x-real-ip", "203.0.113.8")
            .body(Body::empty())
            .unwrap();
        assert_eq!(extract_client_key(&request, None), "203.0.113.8");
    }

    #[test]
    fn test_connection_address_fallback() {
        let request = HttpRequest::builder().uri("/").body(Body::empty()).unwrap();
        let addr: SocketAddr = "192.0.2.4:5555".parse().unwrap();
        assert_eq!(extract_client_key(&request, Some(addr)), "192.0.2.4");
        assert_eq!(extract_client_key(&request, None), "unknown");
    }
}
