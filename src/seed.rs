use crate::{
    access::AccessControl,
    error::ApiError,
    models::{ArticleStatus, Identity, NewArticle, NewIdentity, Role},
};

/// Demo accounts: (email, password, name, role).
const DEMO_ACCOUNTS: [(&str, &str, &str, Role); 3] = [
    ("admin@example.com", "Admin123!", "Admin User", Role::Admin),
    ("editor@example.com", "Editor123!", "Editor User", Role::Editor),
    ("viewer@example.com", "Viewer123!", "Viewer User", Role::Viewer),
];

/// What a seeding run created. Existing rows are left untouched and not counted.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: usize,
    pub articles_created: usize,
}

/// Returns the existing identity for `email`, or creates it.
async fn ensure_account(
    access: &AccessControl,
    email: &str,
    password: &str,
    name: &str,
    role: Role,
) -> Result<(Identity, bool), ApiError> {
    if let Some(existing) = access.repo().find_credential_by_email(email).await? {
        return Ok((existing.identity(), false));
    }
    let password_hash = access.hash_password(password.to_string()).await?;
    let identity = access
        .repo()
        .create_identity(NewIdentity {
            email: email.to_string(),
            name: name.to_string(),
            role,
            password_hash,
        })
        .await?;
    Ok((identity, true))
}

/// seed_demo_data
///
/// Creates one account per role and, when the article table is empty, three
/// sample articles: two published and one editor-owned draft. Safe to run on
/// every startup.
pub async fn seed_demo_data(access: &AccessControl) -> Result<SeedReport, ApiError> {
    let mut report = SeedReport::default();
    let mut accounts = Vec::with_capacity(DEMO_ACCOUNTS.len());

    for (email, password, name, role) in DEMO_ACCOUNTS {
        let (identity, created) = ensure_account(access, email, password, name, role).await?;
        if created {
            report.users_created += 1;
            tracing::info!(email = %identity.email, role = ?identity.role, "seeded account");
        }
        accounts.push(identity);
    }

    if access.repo().count_articles().await? > 0 {
        tracing::info!("articles already present, skipping sample articles");
        return Ok(report);
    }

    let admin_id = accounts[0].id;
    let editor_id = accounts[1].id;
    let samples = [
        NewArticle {
            title: "Welcome to Content Workspace".to_string(),
            content: "<p>This is a sample published article. It demonstrates the content \
                      management system capabilities.</p><p>You can create, edit, and manage \
                      articles based on your role permissions.</p>"
                .to_string(),
            status: ArticleStatus::Published,
            author_id: admin_id,
        },
        NewArticle {
            title: "Getting Started Guide".to_string(),
            content: "<p>This guide will help you get started with the Content Workspace \
                      platform.</p><h2>Features</h2><ul><li>Role-based access control</li>\
                      <li>Rich text editing</li><li>Article management</li></ul>"
                .to_string(),
            status: ArticleStatus::Published,
            author_id: editor_id,
        },
        NewArticle {
            title: "Draft Article Example".to_string(),
            content: "<p>This is a draft article that is not yet published. Only the author \
                      and admins can see this.</p>"
                .to_string(),
            status: ArticleStatus::Draft,
            author_id: editor_id,
        },
    ];

    for sample in samples {
        let article = access.repo().create_article(sample).await?;
        report.articles_created += 1;
        tracing::info!(article_id = %article.id, title = %article.title, "seeded article");
    }

    Ok(report)
}
