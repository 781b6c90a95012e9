use crate::core::ServerState;
use axum::{Router, middleware};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;

/// HTTP 请求日志中间件
async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    let status = response.status();

    tracing::info!(target: "http_access", "{} {} {}", method, uri, status);

    response
}

/// Build the Axum router (without state)
pub fn build_app() -> Router<ServerState> {
    Router::<ServerState>::new()
        .merge(crate::api::health::router())
        .merge(crate::api::orders::router())
}

/// Router bound to `state` with the HTTP middleware stack
///
/// Authentication is per handler through the `CurrentUser` extractor.
pub fn build_router(state: ServerState) -> Router {
    build_app()
        .with_state(state)
        // Tower HTTP 中间件
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        // HTTP 请求日志中间件
        .layer(middleware::from_fn(log_request))
}
