//! Roster server library logic.

pub mod api;
pub mod api_admin;
pub mod api_stats;
pub mod api_users;
pub mod config;
pub mod extract;
pub mod middleware;

use axum::{extract::DefaultBodyLimit, routing::get, Extension, Router};
use roster_db::Database;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection manager for the user database.
    pub db: Database,
    /// Token guarding the introspection endpoints, if configured.
    pub admin_token: Option<String>,
    /// Static page served at `/admin`.
    pub admin_page: PathBuf,
}

impl AppState {
    /// Builds the state from loaded configuration and an opened database.
    pub fn new(db: Database, admin: &config::AdminConfig) -> Self {
        Self {
            db,
            admin_token: admin.token.clone(),
            admin_page: admin.page_path.clone(),
        }
    }
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route("/db/tables", get(api_admin::list_tables_handler))
        .route("/api/tables", get(api_admin::list_tables_handler))
        .layer(axum::middleware::from_fn(middleware::admin_token_middleware));

    if !state.admin_page.exists() {
        tracing::info!(path = %state.admin_page.display(), "admin page not found, /admin will return 404");
    }

    Router::new()
        .route("/", get(api::root_handler))
        .route("/health", get(api::health_handler))
        .route_service("/admin", ServeFile::new(&state.admin_page))
        .route(
            "/api/users",
            get(api_users::list_users_handler).post(api_users::create_user_handler),
        )
        .route(
            "/api/users/{id}",
            get(api_users::get_user_handler)
                .put(api_users::update_user_handler)
                .delete(api_users::delete_user_handler),
        )
        .route("/api/stats", get(api_stats::get_stats_handler))
        .route(
            "/db/users",
            get(api_users::legacy_list_users_handler).post(api_users::legacy_create_user_handler),
        )
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
