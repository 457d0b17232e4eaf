pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post, put},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))

        .nest("/api", api_routes(app_state.clone()))
        .nest("/admin", admin_routes(app_state.clone()))

        .with_state(app_state)

        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/courses", course_routes())
        .nest("/enrollments", enrollment_routes(state.clone()))
        .nest("/payments", payment_routes(state.clone()))
        .nest("/verification", verification_routes(state))
}

fn course_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::courses::list))
        .route("/:slug", get(handlers::courses::get))
}

fn enrollment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::enrollments::list_mine).post(handlers::enrollments::create))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Called by the gateway; authenticated by signature, not session.
        .route("/webhook", post(handlers::payments::webhook))
        .merge(
            Router::new()
                .route("/", get(handlers::payments::list_mine))
                .route("/:id", get(handlers::payments::get))
                .route("/:id/cancel", post(handlers::payments::cancel))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn verification_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/send", post(handlers::verification::send))
        .route("/verify", post(handlers::verification::verify))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/stats", get(handlers::admin::stats))
        .route("/payments/:id/confirm", post(handlers::payments::admin_confirm))
        .route("/enrollments", get(handlers::enrollments::admin_list))
        .route("/enrollments/:id/status", put(handlers::enrollments::admin_update_status))
        .route("/courses/bulk-delete", post(handlers::admin::bulk_delete_courses))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}
