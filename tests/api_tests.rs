use content_gate::{
    AccessControl, AppConfig, AppState, create_router,
    error::ErrorBody,
    models::{ApiResponse, ArticleData, ArticleList, ArticleStatus, AuthResponse, Role, UserData},
    repository::{InMemoryRepository, RepositoryState},
    seed::seed_demo_data,
};
use serde_json::json;
use uuid::Uuid;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

/// Serves the full router over an in-memory store seeded with the demo accounts.
async fn spawn_app() -> TestApp {
    let config = AppConfig::default();
    let repo = Arc::new(InMemoryRepository::new()) as RepositoryState;
    let access = AccessControl::from_config(repo, &config).expect("valid test config");
    seed_demo_data(&access).await.expect("seeding failed");

    let router = create_router(AppState::new(access, config)).expect("valid router config");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        let service = router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, service).await.unwrap();
    });

    TestApp {
        address,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request failed");
        assert_eq!(response.status(), 200);
        let body: ApiResponse<AuthResponse> = response.json().await.unwrap();
        body.data.token
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/api/missing")).send().await.unwrap();

    assert_eq!(response.status(), 404);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error.code, "NOT_FOUND");
    assert_eq!(body.error.message, "Route GET /api/missing not found");
}

#[tokio::test]
async fn test_mutation_without_token_is_unauthorized() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/api/articles"))
        .json(&json!({ "title": "No token", "content": "Should never be stored" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 401);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error.code, "UNAUTHORIZED");
}

#[tokio::test]
async fn test_anonymous_listing_hides_seeded_draft() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/api/articles")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    let body: ApiResponse<ArticleList> = response.json().await.unwrap();
    assert_eq!(body.data.pagination.total, 2);
    assert!(
        body.data
            .articles
            .iter()
            .all(|a| a.status == ArticleStatus::Published)
    );
}

#[tokio::test]
async fn test_article_lifecycle() {
    let app = spawn_app().await;
    let editor = app.login("editor@example.com", "Editor123!").await;
    let viewer = app.login("viewer@example.com", "Viewer123!").await;
    let admin = app.login("admin@example.com", "Admin123!").await;

    // Viewer may not create.
    let response = app
        .client
        .post(app.url("/api/articles"))
        .bearer_auth(&viewer)
        .json(&json!({ "title": "Viewer try", "content": "Viewers cannot write" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    // Editor creates a draft.
    let response = app
        .client
        .post(app.url("/api/articles"))
        .bearer_auth(&editor)
        .json(&json!({ "title": "Lifecycle", "content": "Draft body for the lifecycle" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let created: ApiResponse<ArticleData> = response.json().await.unwrap();
    let id = created.data.article.id;
    assert_eq!(created.data.article.status, ArticleStatus::Draft);
    assert_eq!(created.data.article.author_name.as_deref(), Some("Editor User"));

    // Hidden from anonymous and from the viewer, with the same answer as a missing id.
    let anonymous = app
        .client
        .get(app.url(&format!("/api/articles/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), 404);
    let anonymous: ErrorBody = anonymous.json().await.unwrap();

    let as_viewer = app
        .client
        .get(app.url(&format!("/api/articles/{id}")))
        .bearer_auth(&viewer)
        .send()
        .await
        .unwrap();
    let as_viewer: ErrorBody = as_viewer.json().await.unwrap();
    assert_eq!(anonymous, as_viewer);

    // Visible to its author.
    let own = app
        .client
        .get(app.url(&format!("/api/articles/{id}")))
        .bearer_auth(&editor)
        .send()
        .await
        .unwrap();
    assert_eq!(own.status(), 200);

    // Publish, then anonymous can read it.
    let response = app
        .client
        .put(app.url(&format!("/api/articles/{id}")))
        .bearer_auth(&editor)
        .json(&json!({ "status": "PUBLISHED" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let public = app
        .client
        .get(app.url(&format!("/api/articles/{id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(public.status(), 200);

    // The author cannot delete; the admin can.
    let response = app
        .client
        .delete(app.url(&format!("/api/articles/{id}")))
        .bearer_auth(&editor)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);

    let response = app
        .client
        .delete(app.url(&format!("/api/articles/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let gone = app
        .client
        .get(app.url(&format!("/api/articles/{id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(gone.status(), 404);
}

#[tokio::test]
async fn test_register_then_me_then_promotion() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "New.User@Example.com", "password": "password123", "name": "New" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let registered: ApiResponse<AuthResponse> = response.json().await.unwrap();
    let token = registered.data.token;
    let user_id = registered.data.user.id;

    let duplicate = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "new.user@example.com", "password": "password123", "name": "Dup" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), 400);
    let duplicate: ErrorBody = duplicate.json().await.unwrap();
    assert_eq!(duplicate.error.code, "DUPLICATE_EMAIL");

    let me = app
        .client
        .get(app.url("/api/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let me: ApiResponse<UserData> = me.json().await.unwrap();
    assert_eq!(me.data.user.email, "new.user@example.com");
    assert_eq!(me.data.user.role, Role::Viewer);

    let admin = app.login("admin@example.com", "Admin123!").await;
    let response = app
        .client
        .put(app.url(&format!("/api/admin/users/{user_id}/role")))
        .bearer_auth(&admin)
        .json(&json!({ "role": "EDITOR" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The old token now carries editor rights.
    let response = app
        .client
        .post(app.url("/api/articles"))
        .bearer_auth(&token)
        .json(&json!({ "title": "Promoted", "content": "Written after promotion" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
}

#[tokio::test]
async fn test_login_failure_is_uniform() {
    let app = spawn_app().await;

    let wrong_password = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "admin@example.com", "password": "nope-nope" }))
        .send()
        .await
        .unwrap();
    let unknown = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "nobody@example.com", "password": "nope-nope" }))
        .send()
        .await
        .unwrap();

    assert_eq!(wrong_password.status(), 401);
    assert_eq!(unknown.status(), 401);
    let a: ErrorBody = wrong_password.json().await.unwrap();
    let b: ErrorBody = unknown.json().await.unwrap();
    assert_eq!(a, b);
    assert_eq!(a.error.code, "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_unparsable_id_answers_like_missing_article() {
    let app = spawn_app().await;

    let malformed = app
        .client
        .get(app.url("/api/articles/not-a-uuid"))
        .send()
        .await
        .unwrap();
    let missing = app
        .client
        .get(app.url(&format!("/api/articles/{}", Uuid::new_v4())))
        .send()
        .await
        .unwrap();

    assert_eq!(malformed.status(), 404);
    assert_eq!(missing.status(), 404);
    assert_eq!(
        malformed.headers()["content-type"],
        missing.headers()["content-type"]
    );
    assert_eq!(malformed.text().await.unwrap(), missing.text().await.unwrap());
}

#[tokio::test]
async fn test_malformed_query_is_validation_envelope() {
    let app = spawn_app().await;

    for query in ["status=bogus", "page=abc"] {
        let response = app
            .client
            .get(app.url(&format!("/api/articles?{query}")))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), 400, "query {query}");
        let body: ErrorBody = response.json().await.unwrap();
        assert!(!body.success);
        assert_eq!(body.error.code, "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_malformed_body_is_validation_envelope() {
    let app = spawn_app().await;

    let missing_field = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "someone@example.com", "name": "Someone" }))
        .send()
        .await
        .unwrap();
    let not_json = app
        .client
        .post(app.url("/api/auth/login"))
        .body("email=admin@example.com")
        .send()
        .await
        .unwrap();

    for response in [missing_field, not_json] {
        assert_eq!(response.status(), 400);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.error.code, "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_credential_endpoints_are_rate_limited() {
    let app = spawn_app().await;
    let attempt = || {
        app.client
            .post(app.url("/api/auth/login"))
            .json(&json!({ "email": "admin@example.com", "password": "wrong-guess" }))
            .send()
    };

    for _ in 0..5 {
        assert_eq!(attempt().await.unwrap().status(), 401);
    }

    let throttled = attempt().await.unwrap();
    assert_eq!(throttled.status(), 429);
    let body: ErrorBody = throttled.json().await.unwrap();
    assert_eq!(body.error.code, "RATE_LIMITED");

    // Article reads share no budget with the credential endpoints.
    let listing = app.client.get(app.url("/api/articles")).send().await.unwrap();
    assert_eq!(listing.status(), 200);
}
