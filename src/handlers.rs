use crate::{
    access::AccessControl,
    auth::{AuthUser, MaybeAuthUser},
    error::{ApiError, ErrorBody, ErrorDetail},
    extract::{ApiJson, ApiPath, ApiQuery},
    models::{
        ApiResponse, Article, ArticleData, ArticleList, ArticleQuery, AssignRoleRequest,
        AuthResponse, CreateArticleRequest, LoginRequest, MessageResponse, RegisterRequest,
        UpdateArticleRequest, UserData,
    },
};
use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

// Every success body is wrapped as {"success": true, "data": ...}; the schemas
// referenced below describe the `data` member.

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates a VIEWER account and returns it with a session token.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthResponse),
        (status = 400, description = "Duplicate email or invalid input", body = ErrorBody)
    )
)]
pub async fn register_user(
    State(access): State<AccessControl>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), ApiError> {
    let auth = access.register(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(auth))))
}

/// login_user
///
/// [Public Route] Exchanges email and password for a session token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid email or password", body = ErrorBody)
    )
)]
pub async fn login_user(
    State(access): State<AccessControl>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<AuthResponse>>, ApiError> {
    let auth = access.login(payload).await?;
    Ok(Json(ApiResponse::ok(auth)))
}

/// get_me
///
/// [Authenticated Route] Returns the identity resolved from the bearer token.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Profile", body = UserData),
        (status = 401, description = "Missing or invalid token", body = ErrorBody)
    )
)]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<ApiResponse<UserData>> {
    Json(ApiResponse::ok(UserData { user }))
}

// --- Article Handlers ---

/// list_articles
///
/// [Public Route, optional auth] Paginated listing. Anonymous callers see
/// published articles, signed-in non-admins also see their own drafts, admins
/// see everything. An explicit `status` replaces those defaults.
#[utoipa::path(
    get,
    path = "/api/articles",
    params(ArticleQuery),
    responses((status = 200, description = "Visible articles", body = ArticleList))
)]
pub async fn list_articles(
    MaybeAuthUser(identity): MaybeAuthUser,
    State(access): State<AccessControl>,
    ApiQuery(query): ApiQuery<ArticleQuery>,
) -> Result<Json<ApiResponse<ArticleList>>, ApiError> {
    let list = access.list_articles(identity.as_ref(), query).await?;
    Ok(Json(ApiResponse::ok(list)))
}

/// get_article
///
/// [Public Route, optional auth] A draft the caller may not see is reported
/// exactly like a missing article.
#[utoipa::path(
    get,
    path = "/api/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = ArticleData),
        (status = 404, description = "Not found or hidden", body = ErrorBody)
    )
)]
pub async fn get_article(
    MaybeAuthUser(identity): MaybeAuthUser,
    State(access): State<AccessControl>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<ApiResponse<ArticleData>>, ApiError> {
    let article = access.get_article(identity.as_ref(), id).await?;
    Ok(Json(ApiResponse::ok(ArticleData { article })))
}

/// create_article
///
/// [Authenticated Route] ADMIN or EDITOR. The author is always the caller.
#[utoipa::path(
    post,
    path = "/api/articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Created", body = ArticleData),
        (status = 403, description = "Role may not create", body = ErrorBody)
    )
)]
pub async fn create_article(
    AuthUser(identity): AuthUser,
    State(access): State<AccessControl>,
    ApiJson(payload): ApiJson<CreateArticleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ArticleData>>), ApiError> {
    let article: Article = access.create_article(&identity, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ArticleData { article })),
    ))
}

/// update_article
///
/// [Authenticated Route] The author or an ADMIN.
#[utoipa::path(
    put,
    path = "/api/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated", body = ArticleData),
        (status = 403, description = "Not the owner", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn update_article(
    AuthUser(identity): AuthUser,
    State(access): State<AccessControl>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateArticleRequest>,
) -> Result<Json<ApiResponse<ArticleData>>, ApiError> {
    let article = access.update_article(&identity, id, payload).await?;
    Ok(Json(ApiResponse::ok(ArticleData { article })))
}

/// delete_article
///
/// [Authenticated Route] ADMIN only, whoever the author is.
#[utoipa::path(
    delete,
    path = "/api/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "Not found", body = ErrorBody)
    )
)]
pub async fn delete_article(
    AuthUser(identity): AuthUser,
    State(access): State<AccessControl>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    access.delete_article(&identity, id).await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Article deleted successfully".to_string(),
    }))
}

// --- Admin Handlers ---

/// assign_role
///
/// [Admin Route] Changes a user's role. Takes effect on that user's next
/// request since identities are reloaded per request.
#[utoipa::path(
    put,
    path = "/api/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = AssignRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserData),
        (status = 403, description = "Not an admin", body = ErrorBody),
        (status = 404, description = "No such user", body = ErrorBody)
    )
)]
pub async fn assign_role(
    AuthUser(actor): AuthUser,
    State(access): State<AccessControl>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AssignRoleRequest>,
) -> Result<Json<ApiResponse<UserData>>, ApiError> {
    let user = access.assign_role(&actor, id, payload.role).await?;
    Ok(Json(ApiResponse::ok(UserData { user })))
}

/// route_not_found
///
/// Fallback for unmatched routes, in the same error envelope as every other failure.
pub async fn route_not_found(method: Method, uri: Uri) -> Response {
    let body = ErrorBody {
        success: false,
        error: ErrorDetail {
            message: format!("Route {} {} not found", method, uri.path()),
            code: ApiError::NotFound.code().to_string(),
        },
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
