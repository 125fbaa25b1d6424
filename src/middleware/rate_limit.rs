// General API admission
// The login and registration handlers consume their own stricter buckets;
// everything behind the bearer wall shares the general class, keyed by
// source IP. A denied request never reaches the downstream handler.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::app::AppState;
use crate::services::rate_limit::{api_key, BucketConfig};
use crate::utils::auth_errors::AuthError;
use crate::utils::request_info::extract_client_ip;

pub async fn api_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => extract_client_ip(request.headers(), addr),
        None => "unknown".to_string(),
    };

    let bucket = BucketConfig::api(&state.config.rate_limits);
    if !state.rate_limiter.try_consume(&api_key(&ip), &bucket, 1) {
        return AuthError::RateLimited.into_response();
    }

    next.run(request).await
}
