use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;

// --- Enumerations (Mapped to Postgres enum types) ---

/// Role
///
/// The privilege class of an identity. Decisions match on this exhaustively;
/// there is no rank ordering between variants.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    ToSchema,
    sqlx::Type,
    Default,
)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Editor,
    #[default]
    Viewer,
}

/// ArticleStatus
///
/// Drafts are hidden from everyone but their author and admins.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    TS,
    ToSchema,
    sqlx::Type,
    Default,
)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "article_status", rename_all = "UPPERCASE")]
pub enum ArticleStatus {
    #[default]
    Draft,
    Published,
}

// --- Identity & Credentials ---

/// Identity
///
/// The resolved profile of an authenticated actor. Loaded once per request
/// from the `users` table and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Credential
///
/// A `users` row including the password digest. Only the orchestrator's login
/// path reads this, and only to hand the digest to the credential hasher.
#[derive(Clone, FromRow)]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

impl Credential {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            role: self.role,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

/// Input for `Repository::create_identity`. The email must already be normalized.
#[derive(Clone)]
pub struct NewIdentity {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub password_hash: String,
}

/// Lowercases and trims an email so lookups and storage agree.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// --- Articles ---

/// Article
///
/// A row from the `articles` table joined with its author's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub status: ArticleStatus,
    /// Set at creation; there is no transfer operation.
    pub author_id: Uuid,
    /// Loaded via a JOIN on `users`.
    #[sqlx(default)]
    pub author_name: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn access(&self) -> ArticleAccess {
        ArticleAccess {
            author_id: self.author_id,
            status: self.status,
        }
    }
}

/// ArticleAccess
///
/// The minimal projection the authorization engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct ArticleAccess {
    pub author_id: Uuid,
    pub status: ArticleStatus,
}

/// Input for `Repository::create_article`.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub status: ArticleStatus,
    pub author_id: Uuid,
}

// --- Request Payloads (Input Schemas) ---

const TITLE_MIN: usize = 3;
const TITLE_MAX: usize = 200;
const CONTENT_MIN: usize = 10;
const SEARCH_MAX: usize = 100;
const PASSWORD_MIN: usize = 8;

fn validate_title(title: &str) -> Result<(), ApiError> {
    let len = title.chars().count();
    if len < TITLE_MIN {
        return Err(ApiError::Validation(format!(
            "Title must be at least {TITLE_MIN} characters"
        )));
    }
    if len > TITLE_MAX {
        return Err(ApiError::Validation(format!(
            "Title must not exceed {TITLE_MAX} characters"
        )));
    }
    Ok(())
}

fn validate_content(content: &str) -> Result<(), ApiError> {
    if content.chars().count() < CONTENT_MIN {
        return Err(ApiError::Validation(format!(
            "Content must be at least {CONTENT_MIN} characters"
        )));
    }
    Ok(())
}

/// CreateArticleRequest
///
/// Input payload for POST /api/articles. Status defaults to `DRAFT`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ArticleStatus>,
}

impl CreateArticleRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        validate_title(&self.title)?;
        validate_content(&self.content)
    }
}

/// UpdateArticleRequest
///
/// Partial update payload for PUT /api/articles/{id}. At least one field is required.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateArticleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ArticleStatus>,
}

impl UpdateArticleRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.title.is_none() && self.content.is_none() && self.status.is_none() {
            return Err(ApiError::Validation(
                "At least one field must be provided for update".to_string(),
            ));
        }
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(content) = &self.content {
            validate_content(content)?;
        }
        Ok(())
    }
}

/// ArticleQuery
///
/// Query parameters accepted by GET /api/articles.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams, Default)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ArticleQuery {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size, clamped to 1..=100 (default 10).
    pub limit: Option<u32>,
    /// Explicit status filter. Replaces the default visibility rules.
    pub status: Option<ArticleStatus>,
    /// Restrict to a single author.
    pub author_id: Option<Uuid>,
    /// Case-insensitive match against title or content.
    pub search: Option<String>,
}

impl ArticleQuery {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(search) = &self.search {
            if search.chars().count() > SEARCH_MAX {
                return Err(ApiError::Validation(format!(
                    "Search query must not exceed {SEARCH_MAX} characters"
                )));
            }
        }
        Ok(())
    }

    pub fn page(&self) -> Page {
        Page::normalize(self.page, self.limit)
    }
}

/// RegisterRequest
///
/// Input payload for POST /api/auth/register. The role is never client-chosen.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::Validation("Invalid email address".to_string()));
        }
        if self.password.chars().count() < PASSWORD_MIN {
            return Err(ApiError::Validation(format!(
                "Password must be at least {PASSWORD_MIN} characters"
            )));
        }
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("Name is required".to_string()));
        }
        Ok(())
    }
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    /// Only presence is checked; password rules apply at registration.
    pub fn validate(&self) -> Result<(), ApiError> {
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(ApiError::Validation("Invalid email address".to_string()));
        }
        if self.password.is_empty() {
            return Err(ApiError::Validation("Password is required".to_string()));
        }
        Ok(())
    }
}

/// AssignRoleRequest
///
/// Input payload for PUT /api/admin/users/{id}/role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AssignRoleRequest {
    pub role: Role,
}

// --- Pagination ---

const DEFAULT_LIMIT: u32 = 10;
const MAX_LIMIT: u32 = 100;

/// Page
///
/// Normalized pagination parameters: `page >= 1`, `1 <= limit <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn normalize(page: Option<u32>, limit: Option<u32>) -> Self {
        let page = page.filter(|p| *p >= 1).unwrap_or(1);
        let limit = match limit {
            None | Some(0) => DEFAULT_LIMIT,
            Some(l) => l.min(MAX_LIMIT),
        };
        Self { page, limit }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    pub fn meta(&self, total: i64) -> PaginationMeta {
        let total_pages = (total + i64::from(self.limit) - 1) / i64::from(self.limit);
        PaginationMeta {
            page: self.page,
            limit: self.limit,
            total,
            total_pages,
            has_next: i64::from(self.page) < total_pages,
            has_prev: self.page > 1,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::normalize(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

// --- Response Payloads (Output Schemas) ---

/// ApiResponse
///
/// Success envelope shared by every endpoint: `{"success": true, "data": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthResponse {
    pub user: Identity,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UserData {
    pub user: Identity,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleData {
    pub article: Article,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ArticleList {
    pub articles: Vec<Article>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}
