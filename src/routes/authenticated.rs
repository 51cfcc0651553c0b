use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind the `auth_middleware` layer, so requests
/// without a valid bearer token are rejected with 401 before any handler or
/// storage access. Role and ownership checks happen in the orchestrator.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/auth/me
        .route("/api/auth/me", get(handlers::get_me))
        // POST /api/articles
        // ADMIN and EDITOR only.
        .route("/api/articles", post(handlers::create_article))
        // PUT /api/articles/{id}  (owner or ADMIN)
        // DELETE /api/articles/{id}  (ADMIN only)
        .route(
            "/api/articles/{id}",
            put(handlers::update_article).delete(handlers::delete_article),
        )
}
