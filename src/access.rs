use chrono::Duration;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{ApiError, ConfigError, HashError, RepositoryError},
    models::{
        Article, ArticleAccess, ArticleList, ArticleQuery, AuthResponse, CreateArticleRequest,
        Identity, LoginRequest, NewArticle, NewIdentity, RegisterRequest, Role,
        UpdateArticleRequest, normalize_email,
    },
    password::CredentialHasher,
    policy::{self, AccessDecision, ArticleFilter},
    repository::RepositoryState,
    token::TokenService,
};

/// AccessControl
///
/// Sequences every article and account operation:
/// authenticate → role gate → ownership gate → visibility filter.
///
/// Holds no per-request state. The repository, hasher and token service are
/// injected at construction and shared read-only across requests.
#[derive(Clone)]
pub struct AccessControl {
    repo: RepositoryState,
    hasher: CredentialHasher,
    tokens: TokenService,
}

/// Converts a policy decision into a result, logging denials.
fn enforce(
    decision: AccessDecision,
    actor: Option<Uuid>,
    operation: &'static str,
) -> Result<(), ApiError> {
    if !decision.allowed {
        tracing::debug!(actor = ?actor, reason = ?decision.reason, "{} denied", operation);
    }
    decision.into_result()
}

impl AccessControl {
    pub fn new(repo: RepositoryState, hasher: CredentialHasher, tokens: TokenService) -> Self {
        Self {
            repo,
            hasher,
            tokens,
        }
    }

    /// Builds the hasher and token service from configuration. Fails fast on a
    /// missing secret or unusable work factor.
    pub fn from_config(repo: RepositoryState, config: &AppConfig) -> Result<Self, ConfigError> {
        let hasher = CredentialHasher::new(config.work_factor)?;
        let ttl = Duration::try_seconds(config.token_ttl_secs)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| ConfigError::Invalid {
                key: "JWT_TTL_SECONDS",
                reason: "out of range".to_string(),
            })?;
        let tokens =
            TokenService::new(&config.jwt_secret, ttl)?.with_leeway(config.token_leeway_secs);
        Ok(Self::new(repo, hasher, tokens))
    }

    pub fn repo(&self) -> &RepositoryState {
        &self.repo
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    // --- Authentication ---

    /// Mandatory authentication. Absent, invalid or orphaned tokens are all `Unauthorized`.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<Identity, ApiError> {
        let token = bearer.ok_or(ApiError::Unauthorized)?;
        let claims = self.tokens.verify(token).map_err(|e| {
            tracing::debug!(reason = %e, "bearer token rejected");
            ApiError::Unauthorized
        })?;

        // The identity is reloaded so deleted users and role changes take effect
        // before the token expires.
        self.repo
            .find_identity_by_id(claims.sub)
            .await?
            .ok_or(ApiError::Unauthorized)
    }

    /// Optional authentication. Token problems degrade to anonymous; storage
    /// failures still propagate.
    pub async fn authenticate_optional(
        &self,
        bearer: Option<&str>,
    ) -> Result<Option<Identity>, ApiError> {
        if bearer.is_none() {
            return Ok(None);
        }
        match self.authenticate(bearer).await {
            Ok(identity) => Ok(Some(identity)),
            Err(ApiError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // --- Credentials ---

    pub(crate) async fn hash_password(&self, plain: String) -> Result<String, ApiError> {
        let hasher = self.hasher.clone();
        let digest = tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| HashError(e.to_string()))??;
        Ok(digest)
    }

    /// Runs exactly one Argon2 verification whether or not a digest exists.
    async fn verify_password(&self, plain: String, digest: Option<String>) -> bool {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || match digest {
            Some(digest) => hasher.verify(&plain, &digest),
            None => hasher.verify_decoy(&plain),
        })
        .await
        .unwrap_or(false)
    }

    /// register
    ///
    /// Creates a VIEWER identity. Emails are compared and stored lowercased,
    /// so `Foo@x.com` and `foo@x.com` collide.
    pub async fn register(&self, req: RegisterRequest) -> Result<AuthResponse, ApiError> {
        req.validate()?;
        let email = normalize_email(&req.email);

        if self.repo.find_credential_by_email(&email).await?.is_some() {
            return Err(ApiError::DuplicateEmail);
        }

        let password_hash = self.hash_password(req.password).await?;
        let user = self
            .repo
            .create_identity(NewIdentity {
                email,
                name: req.name.trim().to_string(),
                role: Role::Viewer,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::Duplicate => ApiError::DuplicateEmail,
                other => ApiError::from(other),
            })?;

        let token = self.tokens.issue(&user)?;
        tracing::info!(user_id = %user.id, "identity registered");
        Ok(AuthResponse { user, token })
    }

    /// login
    ///
    /// Unknown email and wrong password produce the same error after the same work.
    pub async fn login(&self, req: LoginRequest) -> Result<AuthResponse, ApiError> {
        req.validate()?;
        let email = normalize_email(&req.email);
        let credential = self.repo.find_credential_by_email(&email).await?;

        let digest = credential.as_ref().map(|c| c.password_hash.clone());
        let verified = self.verify_password(req.password, digest).await;

        let user = match credential {
            Some(credential) if verified => credential.identity(),
            _ => {
                tracing::debug!("login rejected");
                return Err(ApiError::InvalidCredentials);
            }
        };

        let token = self.tokens.issue(&user)?;
        tracing::info!(user_id = %user.id, "identity logged in");
        Ok(AuthResponse { user, token })
    }

    /// Changes another identity's role. ADMIN only.
    pub async fn assign_role(
        &self,
        actor: &Identity,
        target: Uuid,
        role: Role,
    ) -> Result<Identity, ApiError> {
        enforce(policy::can_manage_roles(actor), Some(actor.id), "role assignment")?;
        let updated = self
            .repo
            .set_identity_role(target, role)
            .await?
            .ok_or(ApiError::NotFound)?;
        tracing::info!(actor = %actor.id, target = %target, role = ?role, "role assigned");
        Ok(updated)
    }

    // --- Articles ---

    /// Storage failures and absence both surface as `NotFound`.
    async fn fetch_access(&self, id: Uuid) -> Result<ArticleAccess, ApiError> {
        match self.repo.find_article_access(id).await {
            Ok(Some(access)) => Ok(access),
            Ok(None) => Err(ApiError::NotFound),
            Err(e) => {
                tracing::error!(article_id = %id, "article lookup failed: {}", e);
                Err(ApiError::NotFound)
            }
        }
    }

    pub async fn list_articles(
        &self,
        identity: Option<&Identity>,
        query: ArticleQuery,
    ) -> Result<ArticleList, ApiError> {
        query.validate()?;
        let page = query.page();
        let filter = ArticleFilter::new(policy::build_listing_filter(identity, query.status))
            .with_author(query.author_id)
            .with_search(query.search);

        let (articles, total) = self.repo.list_articles(&filter, page).await?;
        Ok(ArticleList {
            articles,
            pagination: page.meta(total),
        })
    }

    pub async fn get_article(
        &self,
        identity: Option<&Identity>,
        id: Uuid,
    ) -> Result<Article, ApiError> {
        let article = match self.repo.find_article_by_id(id).await {
            Ok(Some(article)) => article,
            Ok(None) => return Err(ApiError::NotFound),
            Err(e) => {
                tracing::error!(article_id = %id, "article lookup failed: {}", e);
                return Err(ApiError::NotFound);
            }
        };
        enforce(
            policy::can_read_article(identity, &article.access()),
            identity.map(|i| i.id),
            "article read",
        )?;
        Ok(article)
    }

    pub async fn create_article(
        &self,
        identity: &Identity,
        req: CreateArticleRequest,
    ) -> Result<Article, ApiError> {
        enforce(policy::can_create_article(identity), Some(identity.id), "article create")?;
        req.validate()?;

        let article = self
            .repo
            .create_article(NewArticle {
                title: req.title,
                content: req.content,
                status: req.status.unwrap_or_default(),
                author_id: identity.id,
            })
            .await?;
        tracing::info!(article_id = %article.id, author = %identity.id, "article created");
        Ok(article)
    }

    pub async fn update_article(
        &self,
        identity: &Identity,
        id: Uuid,
        req: UpdateArticleRequest,
    ) -> Result<Article, ApiError> {
        let access = self.fetch_access(id).await?;
        enforce(
            policy::can_update_article(identity, &access),
            Some(identity.id),
            "article update",
        )?;
        req.validate()?;

        self.repo
            .update_article(id, req)
            .await?
            .ok_or(ApiError::NotFound)
    }

    /// The role gate runs before storage is touched.
    pub async fn delete_article(&self, identity: &Identity, id: Uuid) -> Result<(), ApiError> {
        enforce(policy::can_delete_article(identity), Some(identity.id), "article delete")?;
        if self.repo.delete_article(id).await? {
            tracing::info!(article_id = %id, actor = %identity.id, "article deleted");
            Ok(())
        } else {
            Err(ApiError::NotFound)
        }
    }
}
