use axum::{
    Router,
    routing::{get, patch, post},
};
use axum::http::{HeaderValue, Method};
use proxima::{Config, get_db_pool, handlers, utils};
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    utils::init_logging();

    let config = Config::from_env()?;
    let db_config = proxima::db::DatabaseConfig::from_env()?;
    let pool = get_db_pool(&db_config).await?;

    // Run migrations
    proxima::db::migrations::run_migrations(&pool).await?;

    let port = config.port;
    let app = create_router(pool, config);

    let listener = tokio::net::TcpListener::bind(&format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Server running on port {}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(pool: SqlitePool, config: Config) -> Router {
    let cors_layer = create_cors_layer(&config);
    let app_state = (pool, config);

    Router::new()
        .route("/health", get(health_check))
        // Users
        .route("/api/users", post(handlers::create_user).get(handlers::list_users))
        .route(
            "/api/users/{user_id}",
            get(handlers::get_user).patch(handlers::update_user),
        )
        // Encounters
        .route(
            "/api/encounters",
            post(handlers::record_encounter).get(handlers::list_encounters),
        )
        .route("/api/encounters/check-requests", get(handlers::check_requests))
        // Connections
        .route("/api/connections/create-requests", post(handlers::create_requests))
        .route(
            "/api/connections/requests/{request_id}/respond",
            patch(handlers::respond_to_request),
        )
        .route("/api/connections/user/{user_id}", get(handlers::list_connections))
        .route("/api/connections/pending/{user_id}", get(handlers::list_pending))
        // Messages
        .route("/api/messages", post(handlers::send_message))
        .route(
            "/api/messages/conversation/{conversation_id}",
            get(handlers::get_history),
        )
        .route(
            "/api/messages/conversation/{conversation_id}/read",
            patch(handlers::mark_read),
        )
        .layer(cors_layer)
        .with_state(app_state)
}

fn create_cors_layer(_config: &Config) -> CorsLayer {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers(Any)
        .allow_credentials(false);

    // Check if ALLOWED_ORIGINS environment variable is set for multiple domains
    if let Ok(cors_origins) = std::env::var("ALLOWED_ORIGINS") {
        let origins: Vec<HeaderValue> = cors_origins
            .split(',')
            .filter_map(|origin| {
                let trimmed = origin.trim();
                if !trimmed.is_empty() {
                    trimmed.parse().ok()
                } else {
                    None
                }
            })
            .collect();

        if !origins.is_empty() {
            cors = cors.allow_origin(origins);
        } else {
            // Fallback to permissive if parsing fails
            cors = cors.allow_origin(Any);
        }
    } else {
        // Default to permissive for development
        cors = cors.allow_origin(Any);
    }

    cors
}

async fn health_check() -> &'static str {
    "OK"
}
