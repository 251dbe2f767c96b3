pub mod config;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub fn router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))
        // Operator session
        .route("/api/session", get(handlers::auth::current_session))
        // Pure policy endpoints
        .route(
            "/api/policy/derive-data-levels",
            post(handlers::policy::derive_levels),
        )
        .route(
            "/api/policy/roles/:role_name/category",
            get(handlers::policy::role_category),
        )
        .route("/api/policy/can-assign", post(handlers::policy::can_assign))
        .route(
            "/api/policy/normalize-attributes",
            post(handlers::policy::normalize),
        )
        // User security
        .route(
            "/api/realms/:realm/users",
            post(handlers::security::create_user),
        )
        .route(
            "/api/realms/:realm/users/:user_id/security",
            get(handlers::security::get_user_security)
                .put(handlers::security::update_user_security),
        )
        // Role security profiles
        .route(
            "/api/realms/:realm/roles/:role_name/profile",
            get(handlers::roles::get_role_profile).put(handlers::roles::update_role_profile),
        )
        .fallback(handlers::health::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::auth::auth_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
