// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{comment, proposal, user},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, viewer_middleware},
};

/// Assembles the main application router.
///
/// * Read routes accept anonymous viewers (likes come back as `null`).
/// * Write routes require a bearer token; admin routes a forum-admin token.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/proposals", get(proposal::list_proposals))
        .route("/proposals/{id}", get(proposal::get_proposal))
        .route("/proposals/{id}/comments", get(proposal::list_comments))
        .route("/comments/{id}/replies", get(comment::list_replies))
        .layer(middleware::from_fn_with_state(state.clone(), viewer_middleware));

    let member_routes = Router::new()
        .route("/users/me", get(user::details))
        .route(
            "/proposals/{id}/like",
            post(proposal::like_proposal).delete(proposal::unlike_proposal),
        )
        .route("/comments/{id}", delete(comment::delete_comment))
        .route("/comments/{id}/replies", post(comment::create_reply))
        .route(
            "/comments/{id}/like",
            post(comment::like_comment).delete(comment::unlike_comment),
        )
        // Ban outcomes (including unauthorized_action) come from the engine.
        .route(
            "/comments/{id}/ban",
            post(comment::ban_comment).delete(comment::unban_comment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users", post(user::create_user))
        .route("/proposals", post(proposal::create_proposal))
        .route("/proposals/{id}/stage", put(proposal::update_stage))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .merge(public_routes)
        .merge(member_routes)
        .merge(admin_routes);

    Router::new()
        .nest("/api", api)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
