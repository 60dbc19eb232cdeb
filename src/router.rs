use crate::polls::{create_poll, delete_poll, get_poll, health, list_polls};
use crate::realtime::{events_sse, websocket_handler};
use crate::startup::AppState;
use axum::{
    Router,
    extract::Extension,
    http::{
        HeaderValue, Method, StatusCode,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{delete, get, post},
};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub fn build_router(app_state: AppState, cors_origin: Option<&str>) -> Router {
    Router::new()
        .route("/new-vote", post(create_poll))
        .route("/getVotes", get(list_polls))
        .route("/votes/:id", get(get_poll))
        .route("/delete-vote/:id", delete(delete_poll))
        .route("/ws", get(websocket_handler))
        .route("/events", get(events_sse))
        .route("/health", get(health))
        .layer(Extension(app_state))
        .layer(cors_layer(cors_origin))
        .fallback(handler_404)
}

fn cors_layer(cors_origin: Option<&str>) -> CorsLayer {
    let allow_origin = match cors_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            warn!("CORS_ORIGIN is not a valid header value, mirroring request origin");
            AllowOrigin::mirror_request()
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, AUTHORIZATION])
}

async fn handler_404() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}
