use std::sync::Arc;

use crate::{
    AppState,
    config::RateLimit,
    error::{ApiError, ConfigError},
    handlers,
};
use axum::{
    Router, middleware,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};

/// Public Router Module
///
/// Endpoints reachable without a token. The article reads use the optional
/// `MaybeAuthUser` extractor, so a valid token still widens what is visible.
pub fn public_routes(auth_limit: &RateLimit) -> Result<Router<AppState>, ConfigError> {
    let router = Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /api/articles?page=&limit=&status=&authorId=&search=
        .route("/api/articles", get(handlers::list_articles))
        // GET /api/articles/{id}
        // Hidden drafts answer 404, same as a missing id.
        .route("/api/articles/{id}", get(handlers::get_article))
        .merge(credential_routes(auth_limit)?);

    Ok(router)
}

/// Register and login share one per-IP budget so password guessing is throttled
/// across both endpoints.
fn credential_routes(limit: &RateLimit) -> Result<Router<AppState>, ConfigError> {
    let governor = GovernorConfigBuilder::default()
        .period(limit.replenish_period())
        .burst_size(limit.max_requests)
        .finish()
        .ok_or_else(|| ConfigError::Invalid {
            key: "AUTH_RATE_LIMIT_MAX",
            reason: "rate limiter rejected the configured budget".to_string(),
        })?;

    let router = Router::new()
        // POST /api/auth/register
        // New accounts always start as VIEWER.
        .route("/api/auth/register", post(handlers::register_user))
        // POST /api/auth/login
        .route("/api/auth/login", post(handlers::login_user))
        .route_layer(GovernorLayer {
            config: Arc::new(governor),
        })
        .route_layer(middleware::map_response(rate_limit_envelope));

    Ok(router)
}

/// Re-renders the limiter's plain-text 429 in the error envelope, keeping its
/// retry headers.
async fn rate_limit_envelope(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }

    let (parts, _) = response.into_parts();
    let mut enveloped = ApiError::RateLimited.into_response();
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            enveloped.headers_mut().insert(name.clone(), value.clone());
        }
    }
    enveloped
}
