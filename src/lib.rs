use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core engine: credentials, tokens, policy and the orchestrator tying them together.
pub mod access;
pub mod password;
pub mod policy;
pub mod token;

// Persistence, shared data types and configuration.
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod seed;

// HTTP surface.
pub mod auth;
pub mod extract;
pub mod handlers;
pub mod routes;
use auth::AuthUser;
use error::ConfigError;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use access::AccessControl;
pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every `#[utoipa::path]` handler, served at
/// `/api-docs/openapi.json` and browsable under `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_user, handlers::login_user, handlers::get_me,
        handlers::list_articles, handlers::get_article, handlers::create_article,
        handlers::update_article, handlers::delete_article, handlers::assign_role
    ),
    components(
        schemas(
            models::Role, models::ArticleStatus, models::Identity, models::Article,
            models::CreateArticleRequest, models::UpdateArticleRequest,
            models::RegisterRequest, models::LoginRequest, models::AssignRoleRequest,
            models::AuthResponse, models::UserData, models::ArticleData, models::ArticleList,
            models::PaginationMeta, models::MessageResponse,
            error::ErrorBody, error::ErrorDetail,
        )
    ),
    tags(
        (name = "content-gate", description = "Role-gated article API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared by every request. The orchestrator owns the repository, hasher and
/// token service; handlers pull it out through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub access: AccessControl,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(access: AccessControl, config: AppConfig) -> Self {
        Self { access, config }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AccessControl {
    fn from_ref(app_state: &AppState) -> AccessControl {
        app_state.access.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Rejects the request with 401 unless `AuthUser` resolves, so no handler
/// behind it runs for anonymous callers.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// One configured origin, or any origin when unset or unparsable.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match config.cors_origin.as_deref() {
        Some(origin) => match HeaderValue::from_str(origin) {
            Ok(value) => base.allow_origin(value),
            Err(e) => {
                tracing::warn!("CORS_ORIGIN {:?} unusable ({}), allowing any origin", origin, e);
                base.allow_origin(Any)
            }
        },
        None => base.allow_origin(Any),
    }
}

/// create_router
///
/// Assembles the full routing tree, applies scoped and global middleware, and
/// registers the application state. The router must be served with
/// `into_make_service_with_connect_info::<SocketAddr>()`; the credential
/// endpoints rate-limit by peer address.
pub fn create_router(state: AppState) -> Result<Router, ConfigError> {
    let cors = cors_layer(&state.config);
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes(&state.config.auth_rate_limit)?)
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // Role checks for these happen in the orchestrator, after `AuthUser` resolves.
        .nest("/api/admin", admin::admin_routes())
        .fallback(handlers::route_not_found)
        .with_state(state);

    let router = base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                )),
        )
        .layer(cors);

    Ok(router)
}

/// trace_span_logger
///
/// Span per request carrying method, URI and the `x-request-id` so every log
/// line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
