use crate::{
    error::RepositoryError,
    models::{
        Article, ArticleAccess, Credential, Identity, NewArticle, NewIdentity, Page, Role,
        UpdateArticleRequest,
    },
    policy::{ArticleFilter, VisibilityFilter},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};
use uuid::Uuid;

/// Repository Trait
///
/// The persistence contract consumed by the access-control orchestrator. The
/// orchestrator never builds queries itself: it hands over identifiers and an
/// [`ArticleFilter`], and each implementation interprets the filter natively.
///
/// **Send + Sync + async_trait** are required so `Arc<dyn Repository>` can be
/// shared across Axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identities ---
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, RepositoryError>;
    /// `email` must already be lowercased.
    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credential>, RepositoryError>;
    /// Fails with `RepositoryError::Duplicate` when the email is taken.
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, RepositoryError>;
    async fn set_identity_role(
        &self,
        id: Uuid,
        role: Role,
    ) -> Result<Option<Identity>, RepositoryError>;

    // --- Articles ---
    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, RepositoryError>;
    /// The `author_id`/`status` projection used for ownership checks.
    async fn find_article_access(
        &self,
        id: Uuid,
    ) -> Result<Option<ArticleAccess>, RepositoryError>;
    /// Returns one page of matching articles, newest first, plus the total match count.
    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page: Page,
    ) -> Result<(Vec<Article>, i64), RepositoryError>;
    async fn count_articles(&self) -> Result<i64, RepositoryError>;
    async fn create_article(&self, new: NewArticle) -> Result<Article, RepositoryError>;
    /// Applies only the fields that are `Some`. `None` when the article is gone.
    async fn update_article(
        &self,
        id: Uuid,
        req: UpdateArticleRequest,
    ) -> Result<Option<Article>, RepositoryError>;
    /// `true` when a row was removed.
    async fn delete_article(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

// --- Postgres ---

const ARTICLE_COLUMNS: &str = "a.id, a.title, a.content, a.status, a.author_id, \
     u.name AS author_name, a.created_at, a.updated_at";

fn map_unique(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Duplicate,
        _ => RepositoryError::Database(err),
    }
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Appends ` AND <filter>` to a query whose FROM clause aliases articles as `a`.
///
/// The visibility clause is always emitted as one parenthesised group so that
/// its inner OR cannot bind with the search clause.
fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &ArticleFilter) {
    match filter.visibility {
        VisibilityFilter::Status(status) => {
            builder.push(" AND (a.status = ");
            builder.push_bind(status);
            builder.push(")");
        }
        VisibilityFilter::PublishedOrOwnDrafts { author_id } => {
            builder.push(" AND (a.status = 'PUBLISHED' OR (a.author_id = ");
            builder.push_bind(author_id);
            builder.push(" AND a.status = 'DRAFT'))");
        }
        VisibilityFilter::Unrestricted => {}
    }

    if let Some(author_id) = filter.author_id {
        builder.push(" AND a.author_id = ");
        builder.push_bind(author_id);
    }

    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        builder.push(" AND (a.title ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR a.content ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
}

/// PostgresRepository
///
/// The production implementation of `Repository`, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, RepositoryError> {
        let identity = sqlx::query_as::<_, Identity>(
            "SELECT id, email, name, role FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        let credential = sqlx::query_as::<_, Credential>(
            "SELECT id, email, name, role, password_hash FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    /// create_identity
    ///
    /// The unique index on `users.email` is the final arbiter for concurrent
    /// registrations of the same address.
    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, RepositoryError> {
        sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO users (id, email, name, role, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING id, email, name, role
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.name)
        .bind(new.role)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique)
    }

    async fn set_identity_role(
        &self,
        id: Uuid,
        role: Role,
    ) -> Result<Option<Identity>, RepositoryError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            UPDATE users SET role = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, email, name, role
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, RepositoryError> {
        let query = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a \
             LEFT JOIN users u ON u.id = a.author_id WHERE a.id = $1"
        );
        let article = sqlx::query_as::<_, Article>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(article)
    }

    async fn find_article_access(
        &self,
        id: Uuid,
    ) -> Result<Option<ArticleAccess>, RepositoryError> {
        let access = sqlx::query_as::<_, ArticleAccess>(
            "SELECT author_id, status FROM articles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(access)
    }

    /// list_articles
    ///
    /// Translates the `ArticleFilter` into a parameterized WHERE clause via
    /// `QueryBuilder`; the same clause drives both the page and the count.
    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page: Page,
    ) -> Result<(Vec<Article>, i64), RepositoryError> {
        let mut select: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles a \
             LEFT JOIN users u ON u.id = a.author_id WHERE TRUE"
        ));
        push_filter(&mut select, filter);
        select.push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ");
        select.push_bind(i64::from(page.limit));
        select.push(" OFFSET ");
        select.push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));

        let articles = select
            .build_query_as::<Article>()
            .fetch_all(&self.pool)
            .await?;

        let mut count: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM articles a WHERE TRUE");
        push_filter(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok((articles, total))
    }

    async fn count_articles(&self) -> Result<i64, RepositoryError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    /// create_article
    ///
    /// Inserts and joins the author's name in one round trip using a CTE.
    async fn create_article(&self, new: NewArticle) -> Result<Article, RepositoryError> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            WITH a AS (
                INSERT INTO articles (id, title, content, status, author_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
                RETURNING id, title, content, status, author_id, created_at, updated_at
            )
            SELECT a.id, a.title, a.content, a.status, a.author_id,
                   u.name AS author_name, a.created_at, a.updated_at
            FROM a LEFT JOIN users u ON u.id = a.author_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.content)
        .bind(new.status)
        .bind(new.author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(article)
    }

    /// update_article
    ///
    /// Uses `COALESCE` so only the provided fields change. The author is never updated.
    async fn update_article(
        &self,
        id: Uuid,
        req: UpdateArticleRequest,
    ) -> Result<Option<Article>, RepositoryError> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            WITH a AS (
                UPDATE articles
                SET title = COALESCE($2, title),
                    content = COALESCE($3, content),
                    status = COALESCE($4, status),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING id, title, content, status, author_id, created_at, updated_at
            )
            SELECT a.id, a.title, a.content, a.status, a.author_id,
                   u.name AS author_name, a.created_at, a.updated_at
            FROM a LEFT JOIN users u ON u.id = a.author_id
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .bind(req.status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(article)
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// --- In-Memory ---

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, Credential>,
    articles: Vec<Article>,
}

/// InMemoryRepository
///
/// A process-local implementation used when no database is configured in
/// local mode, and by the test suites. It evaluates `ArticleFilter::matches`
/// directly, so it shares the exact listing semantics of the policy module.
#[derive(Default)]
pub struct InMemoryRepository {
    state: RwLock<MemoryState>,
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> RepositoryError {
    RepositoryError::Unavailable("in-memory store lock poisoned".to_string())
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a pre-built credential row. Test fixtures use this to place
    /// identities with fixed ids and roles.
    pub fn insert_credential(&self, credential: Credential) -> Result<Identity, RepositoryError> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.users.values().any(|u| u.email == credential.email) {
            return Err(RepositoryError::Duplicate);
        }
        let identity = credential.identity();
        state.users.insert(credential.id, credential);
        Ok(identity)
    }

    /// Stores a pre-built article row as-is.
    pub fn insert_article(&self, article: Article) -> Result<Article, RepositoryError> {
        let mut state = self.state.write().map_err(poisoned)?;
        state.articles.push(article.clone());
        Ok(article)
    }

    fn with_author_name(state: &MemoryState, mut article: Article) -> Article {
        article.author_name = state.users.get(&article.author_id).map(|u| u.name.clone());
        article
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find_identity_by_id(&self, id: Uuid) -> Result<Option<Identity>, RepositoryError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.users.get(&id).map(Credential::identity))
    }

    async fn find_credential_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Credential>, RepositoryError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_identity(&self, new: NewIdentity) -> Result<Identity, RepositoryError> {
        self.insert_credential(Credential {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            role: new.role,
            password_hash: new.password_hash,
        })
    }

    async fn set_identity_role(
        &self,
        id: Uuid,
        role: Role,
    ) -> Result<Option<Identity>, RepositoryError> {
        let mut state = self.state.write().map_err(poisoned)?;
        Ok(state.users.get_mut(&id).map(|user| {
            user.role = role;
            user.identity()
        }))
    }

    async fn find_article_by_id(&self, id: Uuid) -> Result<Option<Article>, RepositoryError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .map(|a| Self::with_author_name(&state, a)))
    }

    async fn find_article_access(
        &self,
        id: Uuid,
    ) -> Result<Option<ArticleAccess>, RepositoryError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.articles.iter().find(|a| a.id == id).map(Article::access))
    }

    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page: Page,
    ) -> Result<(Vec<Article>, i64), RepositoryError> {
        let state = self.state.read().map_err(poisoned)?;

        // Newest first; among equal timestamps the later insert wins.
        let mut matching: Vec<&Article> = state
            .articles
            .iter()
            .rev()
            .filter(|a| filter.matches(a))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = i64::try_from(matching.len()).unwrap_or(i64::MAX);
        let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(page.limit as usize)
            .cloned()
            .map(|a| Self::with_author_name(&state, a))
            .collect();

        Ok((items, total))
    }

    async fn count_articles(&self) -> Result<i64, RepositoryError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(i64::try_from(state.articles.len()).unwrap_or(i64::MAX))
    }

    async fn create_article(&self, new: NewArticle) -> Result<Article, RepositoryError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let now = Utc::now();
        let article = Article {
            id: Uuid::new_v4(),
            title: new.title,
            content: new.content,
            status: new.status,
            author_id: new.author_id,
            author_name: None,
            created_at: now,
            updated_at: now,
        };
        state.articles.push(article.clone());
        Ok(Self::with_author_name(&state, article))
    }

    async fn update_article(
        &self,
        id: Uuid,
        req: UpdateArticleRequest,
    ) -> Result<Option<Article>, RepositoryError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let Some(article) = state.articles.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            article.title = title;
        }
        if let Some(content) = req.content {
            article.content = content;
        }
        if let Some(status) = req.status {
            article.status = status;
        }
        article.updated_at = Utc::now();
        let updated = article.clone();
        Ok(Some(Self::with_author_name(&state, updated)))
    }

    async fn delete_article(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().map_err(poisoned)?;
        let before = state.articles.len();
        state.articles.retain(|a| a.id != id);
        Ok(state.articles.len() < before)
    }
}
