//! # carehub_api
//!
//! HTTP API library for CareHub authentication and access control.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use carehub_core::auth::jwt::TokenService;
use carehub_core::auth::session::{InMemorySessionStore, SessionStore};
use carehub_core::clock::Clock;
use carehub_core::store::AuthStore;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{auth, users};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn AuthStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub tokens: TokenService,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    /// State with a process-local session store.
    pub fn new(config: ApiConfig, store: Arc<dyn AuthStore>, clock: Arc<dyn Clock>) -> Self {
        let sessions = Arc::new(InMemorySessionStore::new(clock.clone()));
        Self::with_sessions(config, store, sessions, clock)
    }

    pub fn with_sessions(
        config: ApiConfig,
        store: Arc<dyn AuthStore>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenService::new(config.jwt_secret.as_bytes(), clock.clone())
            .with_lifetimes(config.access_token_ttl, config.refresh_token_ttl);
        Self {
            store,
            sessions,
            tokens,
            clock,
            config: Arc::new(config),
        }
    }
}

/// Run embedded database migrations.
///
/// Delegates to `carehub_core`, which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    carehub_core::store::postgres::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_LOGIN, post(auth::login_handler))
        .route(routes::POST_REFRESH_TOKEN, post(auth::refresh_handler))
        .route(routes::POST_LOGOUT, post(auth::logout_handler))
        .route(routes::POST_FORGOT_PASSWORD, post(auth::forgot_password_handler))
        .route(routes::POST_RESET_PASSWORD, post(auth::reset_password_handler));

    // Protected routes (require auth). Role and permission checks happen in
    // the extractors each handler asks for.
    let protected = Router::new()
        .route(routes::POST_REGISTER, post(auth::register_handler))
        .route(routes::GET_PROFILE, get(auth::profile_handler))
        .route(routes::GET_SESSION, get(auth::session_handler))
        .route(routes::POST_CHANGE_PASSWORD, post(auth::change_password_handler))
        .route(routes::USERS, get(users::list_users_handler))
        .route(
            routes::USERS_ID,
            get(users::get_user_handler).delete(users::deactivate_user_handler),
        )
        .route(
            routes::PATCH_USERS_ID_FACILITY,
            patch(users::set_facility_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
