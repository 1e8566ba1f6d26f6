use crate::handlers::{auth, bookings, conversations, health, requests, spaces, users, ws};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/users/me", get(users::me).patch(users::update_me))
        .route("/users/{id}", get(users::get_user))
        .route("/spaces", get(spaces::search).post(spaces::create_space))
        .route("/spaces/mine", get(spaces::my_spaces))
        .route(
            "/spaces/{id}",
            get(spaces::get_space)
                .patch(spaces::update_space)
                .delete(spaces::delete_space),
        )
        .route("/spaces/{id}/requests", post(spaces::request_booking))
        .route("/requests", get(requests::list_requests))
        .route("/requests/{id}", get(requests::get_request))
        .route("/requests/{id}/approve", post(requests::approve_request))
        .route("/requests/{id}/reject", post(requests::reject_request))
        .route("/requests/{id}/cancel", post(requests::cancel_request))
        .route("/bookings", get(bookings::list_bookings))
        .route("/bookings/{id}", get(bookings::get_booking))
        .route("/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::open_conversation),
        )
        .route("/conversations/{id}", get(conversations::get_conversation))
        .route(
            "/conversations/{id}/messages",
            get(conversations::history).post(conversations::send),
        )
        .route("/conversations/{id}/read", post(conversations::mark_read))
        .route("/ws", get(ws::ws_handler));

    Router::new()
        .nest("/v1", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
