//! Article access policy.
//!
//! Every function here is a pure decision over `(identity, article)`: no IO,
//! no logging, no panics. Callers translate a denied [`AccessDecision`] into a
//! transport outcome with [`AccessDecision::into_result`].

use uuid::Uuid;

use crate::{
    error::ApiError,
    models::{Article, ArticleAccess, ArticleStatus, Identity, Role},
};

/// Why a decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessReason {
    /// Published content, open to everyone.
    Public,
    /// The caller is an admin.
    Admin,
    /// The caller authored the article.
    Owner,
    /// The caller's role grants the operation.
    PrivilegedRole,
    /// No identity was supplied where one is required.
    Unauthenticated,
    /// The caller's role does not grant the operation.
    InsufficientRole,
    /// The caller neither owns the article nor is an admin.
    NotOwner,
    /// The article must look absent to this caller.
    Hidden,
}

/// AccessDecision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub reason: AccessReason,
}

impl AccessDecision {
    fn allow(reason: AccessReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: AccessReason) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }

    /// Maps a denial to the error the caller should see.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.allowed {
            return Ok(());
        }
        Err(match self.reason {
            AccessReason::Unauthenticated => ApiError::Unauthorized,
            AccessReason::InsufficientRole | AccessReason::NotOwner => ApiError::Forbidden,
            AccessReason::Hidden => ApiError::NotFound,
            AccessReason::Public
            | AccessReason::Admin
            | AccessReason::Owner
            | AccessReason::PrivilegedRole => ApiError::Forbidden,
        })
    }
}

/// ADMIN and EDITOR may create; VIEWER may not.
pub fn can_create_article(identity: &Identity) -> AccessDecision {
    match identity.role {
        Role::Admin | Role::Editor => AccessDecision::allow(AccessReason::PrivilegedRole),
        Role::Viewer => AccessDecision::deny(AccessReason::InsufficientRole),
    }
}

/// Published articles are open. Drafts are visible to their author and to
/// admins; everyone else is told the article does not exist.
pub fn can_read_article(identity: Option<&Identity>, article: &ArticleAccess) -> AccessDecision {
    match article.status {
        ArticleStatus::Published => AccessDecision::allow(AccessReason::Public),
        ArticleStatus::Draft => match identity {
            None => AccessDecision::deny(AccessReason::Hidden),
            Some(identity) => match identity.role {
                Role::Admin => AccessDecision::allow(AccessReason::Admin),
                Role::Editor | Role::Viewer if identity.id == article.author_id => {
                    AccessDecision::allow(AccessReason::Owner)
                }
                Role::Editor | Role::Viewer => AccessDecision::deny(AccessReason::Hidden),
            },
        },
    }
}

/// Admins and the author may update. Others get FORBIDDEN, not NOT_FOUND.
pub fn can_update_article(identity: &Identity, article: &ArticleAccess) -> AccessDecision {
    match identity.role {
        Role::Admin => AccessDecision::allow(AccessReason::Admin),
        Role::Editor | Role::Viewer if identity.id == article.author_id => {
            AccessDecision::allow(AccessReason::Owner)
        }
        Role::Editor | Role::Viewer => AccessDecision::deny(AccessReason::NotOwner),
    }
}

/// Only admins delete. Authorship does not matter.
pub fn can_delete_article(identity: &Identity) -> AccessDecision {
    match identity.role {
        Role::Admin => AccessDecision::allow(AccessReason::Admin),
        Role::Editor | Role::Viewer => AccessDecision::deny(AccessReason::InsufficientRole),
    }
}

/// Only admins change another identity's role.
pub fn can_manage_roles(identity: &Identity) -> AccessDecision {
    match identity.role {
        Role::Admin => AccessDecision::allow(AccessReason::Admin),
        Role::Editor | Role::Viewer => AccessDecision::deny(AccessReason::InsufficientRole),
    }
}

/// VisibilityFilter
///
/// Which articles a caller may see in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityFilter {
    /// `status = s`
    Status(ArticleStatus),
    /// `status = PUBLISHED OR (author_id = id AND status = DRAFT)`
    PublishedOrOwnDrafts { author_id: Uuid },
    /// No status restriction.
    Unrestricted,
}

impl VisibilityFilter {
    pub fn matches(&self, article: &ArticleAccess) -> bool {
        match *self {
            VisibilityFilter::Status(status) => article.status == status,
            VisibilityFilter::PublishedOrOwnDrafts { author_id } => {
                article.status == ArticleStatus::Published
                    || (article.author_id == author_id && article.status == ArticleStatus::Draft)
            }
            VisibilityFilter::Unrestricted => true,
        }
    }
}

/// Builds the listing visibility predicate.
///
/// An explicit `requested_status` replaces the default construction and is
/// passed through as-is, for every caller.
pub fn build_listing_filter(
    identity: Option<&Identity>,
    requested_status: Option<ArticleStatus>,
) -> VisibilityFilter {
    if let Some(status) = requested_status {
        return VisibilityFilter::Status(status);
    }
    match identity {
        None => VisibilityFilter::Status(ArticleStatus::Published),
        Some(identity) => match identity.role {
            Role::Admin => VisibilityFilter::Unrestricted,
            Role::Editor | Role::Viewer => VisibilityFilter::PublishedOrOwnDrafts {
                author_id: identity.id,
            },
        },
    }
}

/// ArticleFilter
///
/// The complete listing predicate:
/// `visibility AND author_id = ? AND (title ILIKE ? OR content ILIKE ?)`,
/// where the last two conjuncts only apply when given. The visibility clause
/// is always its own parenthesised group; the search never widens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFilter {
    pub visibility: VisibilityFilter,
    pub author_id: Option<Uuid>,
    pub search: Option<String>,
}

impl ArticleFilter {
    pub fn new(visibility: VisibilityFilter) -> Self {
        Self {
            visibility,
            author_id: None,
            search: None,
        }
    }

    pub fn with_author(mut self, author_id: Option<Uuid>) -> Self {
        self.author_id = author_id;
        self
    }

    /// Blank search terms are dropped.
    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        self
    }

    pub fn matches(&self, article: &Article) -> bool {
        if !self.visibility.matches(&article.access()) {
            return false;
        }
        if let Some(author_id) = self.author_id {
            if article.author_id != author_id {
                return false;
            }
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                article.title.to_lowercase().contains(&term)
                    || article.content.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}
