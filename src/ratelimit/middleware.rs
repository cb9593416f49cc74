//! Rate Limit Middleware Module
//!
//! Axum layer that meters requests against one bucket before they reach
//! a handler. Wrap each route group with [`apply`] and the bucket it
//! should draw from; admitted responses carry the client's remaining
//! quota in `X-RateLimit-*` headers, blocked requests get a 429 with a
//! `Retry-After`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tracing::warn;

use crate::timing::unix_now;

use super::client_key::derive_client_key;
use super::limiter::{Quota, RateLimiter};

// == Policy State ==
/// The limiter and bucket one mounted middleware instance enforces.
#[derive(Clone)]
pub struct RateLimitPolicy {
    limiter: Arc<RateLimiter>,
    bucket: String,
}

impl RateLimitPolicy {
    pub fn new(limiter: Arc<RateLimiter>, bucket: impl Into<String>) -> Self {
        Self {
            limiter,
            bucket: bucket.into(),
        }
    }
}

// == Mounting ==
/// Wraps `router` so every route in it draws from `bucket`.
pub fn apply<S>(router: Router<S>, limiter: Arc<RateLimiter>, bucket: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(
        RateLimitPolicy::new(limiter, bucket),
        rate_limit_middleware,
    ))
}

// == Middleware ==
/// Admission check in front of a handler.
///
/// The quota headers are read back after the decision, so the values a
/// client sees reflect the request it just made.
pub async fn rate_limit_middleware(
    State(policy): State<RateLimitPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let peer_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let client_key = derive_client_key(request.headers(), peer_ip);

    if !policy.limiter.is_allowed(&client_key, &policy.bucket).await {
        let quota = policy
            .limiter
            .get_remaining(&client_key, &policy.bucket)
            .await;
        warn!(
            bucket = %policy.bucket,
            client = %client_key,
            "rate limit exceeded"
        );
        return rejection(&quota);
    }

    let quota = policy
        .limiter
        .get_remaining(&client_key, &policy.bucket)
        .await;
    let mut response = next.run(request).await;
    attach_quota_headers(response.headers_mut(), &quota);
    response
}

/// 429 response for a blocked request.
fn rejection(quota: &Quota) -> Response {
    let retry_after = quota
        .reset_at
        .saturating_sub(unix_now() as u64)
        .max(1);
    let body = Json(json!({
        "error": "Rate limit exceeded",
        "message": format!(
            "Too many requests. Limit: {} requests per {} seconds",
            quota.limit, quota.window_seconds
        ),
        "retry_after": retry_after,
    }));

    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    attach_quota_headers(response.headers_mut(), quota);
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

fn attach_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert("x-ratelimit-limit", HeaderValue::from(quota.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(quota.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(quota.reset_at));
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::config::LimitConfig;
    use axum::body::Body;
    use axum::routing::get;
    use std::collections::HashMap;
    use tower::ServiceExt;

    fn test_app(requests: u32) -> Router {
        let limiter = Arc::new(RateLimiter::with_limits(
            None,
            HashMap::from([("api".to_string(), LimitConfig::new(requests, 60))]),
        ));
        apply(
            Router::new().route("/data", get(|| async { "ok" })),
            limiter,
            "api",
        )
    }

    fn request() -> Request {
        Request::builder()
            .uri("/data")
            .header("x-forwarded-for", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_admitted_request_carries_quota_headers() {
        let app = test_app(5);
        let response = app.oneshot(request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-limit"], "5");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
        assert!(response.headers().contains_key("x-ratelimit-reset"));
    }

    #[tokio::test]
    async fn test_over_limit_returns_429() {
        let app = test_app(1);
        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()["x-ratelimit-remaining"], "0");
        assert!(second.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn test_clients_metered_separately() {
        let app = test_app(1);
        let first = app.clone().oneshot(request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let other_client = Request::builder()
            .uri("/data")
            .header("x-forwarded-for", "198.51.100.7")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(other_client).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
