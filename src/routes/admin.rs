use crate::{AppState, handlers};
use axum::{Router, routing::put};

/// Admin Router Module
///
/// Nested under `/api/admin`. Handlers authenticate through the `AuthUser`
/// extractor and the orchestrator rejects any non-ADMIN caller with 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // PUT /api/admin/users/{id}/role
        // Promotes or demotes a user, e.g. VIEWER -> EDITOR.
        .route("/users/{id}/role", put(handlers::assign_role))
}
