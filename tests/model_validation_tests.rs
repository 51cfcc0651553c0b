use chrono::Utc;
use content_gate::{
    ApiError,
    models::{
        ApiResponse, Article, ArticleQuery, ArticleStatus, CreateArticleRequest, Credential, Page,
        RegisterRequest, Role, UpdateArticleRequest, normalize_email,
    },
};
use serde_json::json;
use uuid::Uuid;

// --- Wire format ---

#[test]
fn test_article_serializes_camel_case_with_uppercase_status() {
    let article = Article {
        id: Uuid::nil(),
        title: "Title".to_string(),
        content: "Body".to_string(),
        status: ArticleStatus::Published,
        author_id: Uuid::nil(),
        author_name: Some("Ada".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let value = serde_json::to_value(ApiResponse::ok(article)).unwrap();
    assert_eq!(value["success"], true);
    assert_eq!(value["data"]["status"], "PUBLISHED");
    assert_eq!(value["data"]["authorName"], "Ada");
    assert!(value["data"].get("authorId").is_some());
    assert!(value["data"].get("author_id").is_none());
}

#[test]
fn test_role_round_trips_uppercase() {
    let role: Role = serde_json::from_value(json!("EDITOR")).unwrap();
    assert_eq!(role, Role::Editor);
    assert!(serde_json::from_value::<Role>(json!("editor")).is_err());
}

#[test]
fn test_query_accepts_camel_case_author_id() {
    let author = Uuid::new_v4();
    let query: ArticleQuery = serde_json::from_value(json!({
        "authorId": author,
        "status": "DRAFT",
    }))
    .unwrap();
    assert_eq!(query.author_id, Some(author));
    assert_eq!(query.status, Some(ArticleStatus::Draft));
}

#[test]
fn test_credential_debug_hides_digest() {
    let credential = Credential {
        id: Uuid::nil(),
        email: "a@b.c".to_string(),
        name: "A".to_string(),
        role: Role::Viewer,
        password_hash: "$argon2id$v=19$secret".to_string(),
    };
    let printed = format!("{:?}", credential);
    assert!(!printed.contains("argon2id"));
    assert!(printed.contains("<redacted>"));
}

// --- Validation ---

#[test]
fn test_create_request_bounds() {
    let mut req = CreateArticleRequest {
        title: "ab".to_string(),
        content: "0123456789".to_string(),
        status: None,
    };
    assert!(matches!(req.validate(), Err(ApiError::Validation(_))));

    req.title = "abc".to_string();
    assert!(req.validate().is_ok());

    req.title = "t".repeat(201);
    assert!(req.validate().is_err());

    req.title = "Fine title".to_string();
    req.content = "too short".to_string();
    assert!(req.validate().is_err());
}

#[test]
fn test_update_request_needs_a_field() {
    assert!(UpdateArticleRequest::default().validate().is_err());

    let status_only = UpdateArticleRequest {
        status: Some(ArticleStatus::Published),
        ..Default::default()
    };
    assert!(status_only.validate().is_ok());
}

#[test]
fn test_register_request_rules() {
    let valid = RegisterRequest {
        email: "someone@example.com".to_string(),
        password: "12345678".to_string(),
        name: "Someone".to_string(),
    };
    assert!(valid.validate().is_ok());

    let short_password = RegisterRequest {
        password: "1234567".to_string(),
        ..valid.clone()
    };
    assert!(short_password.validate().is_err());

    let no_at = RegisterRequest {
        email: "someone.example.com".to_string(),
        ..valid.clone()
    };
    assert!(no_at.validate().is_err());

    let blank_name = RegisterRequest {
        name: "   ".to_string(),
        ..valid
    };
    assert!(blank_name.validate().is_err());
}

#[test]
fn test_email_normalization() {
    assert_eq!(normalize_email("  Foo@X.com "), "foo@x.com");
}

// --- Pagination ---

#[test]
fn test_page_defaults_and_clamping() {
    assert_eq!(Page::normalize(None, None), Page { page: 1, limit: 10 });
    assert_eq!(Page::normalize(Some(0), Some(0)), Page { page: 1, limit: 10 });
    assert_eq!(Page::normalize(Some(3), Some(500)).limit, 100);
    assert_eq!(Page::normalize(Some(3), Some(20)).offset(), 40);
}

#[test]
fn test_pagination_meta() {
    let meta = Page::normalize(Some(2), Some(10)).meta(25);
    assert_eq!(meta.total_pages, 3);
    assert!(meta.has_next);
    assert!(meta.has_prev);

    let empty = Page::default().meta(0);
    assert_eq!(empty.total_pages, 0);
    assert!(!empty.has_next);
    assert!(!empty.has_prev);
}
