use content_gate::{
    AccessControl, AppState,
    config::{AppConfig, Env},
    create_router,
    repository::{InMemoryRepository, PostgresRepository, RepositoryState},
    seed::seed_demo_data,
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initialises logging and storage, and serves the API.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast)
    dotenv::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => panic!("FATAL: {e}"),
    };

    // 2. Logging: RUST_LOG wins, otherwise crate debug and request-level http logs.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "content_gate=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Storage: Postgres when configured, otherwise a process-local store.
    let (repo, in_memory) = match config.db_url.as_deref() {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .unwrap_or_else(|e| panic!("FATAL: Failed to connect to Postgres: {e}"));
            let postgres = PostgresRepository::new(pool);
            if let Err(e) = postgres.migrate().await {
                panic!("FATAL: Migrations failed: {e}");
            }
            (Arc::new(postgres) as RepositoryState, false)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage; data is lost on exit");
            (Arc::new(InMemoryRepository::new()) as RepositoryState, true)
        }
    };

    // 4. Engine and state
    let access = match AccessControl::from_config(repo, &config) {
        Ok(access) => access,
        Err(e) => panic!("FATAL: {e}"),
    };

    if config.seed_demo_data || in_memory {
        match seed_demo_data(&access).await {
            Ok(report) => tracing::info!(
                users = report.users_created,
                articles = report.articles_created,
                "demo data seeded"
            ),
            Err(e) => tracing::error!("seeding error: {:?}", e),
        }
    }

    let bind_addr = config.bind_addr.clone();
    let app = match create_router(AppState::new(access, config)) {
        Ok(app) => app,
        Err(e) => panic!("FATAL: {e}"),
    };

    // 5. Server
    let listener = TcpListener::bind(&bind_addr)
        .await
        .unwrap_or_else(|e| panic!("FATAL: Cannot bind {bind_addr}: {e}"));

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    // Peer addresses feed the per-IP limiter on the credential endpoints.
    let service = app.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service).await {
        tracing::error!("server error: {:?}", e);
    }
}
