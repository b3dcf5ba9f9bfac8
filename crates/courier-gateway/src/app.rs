use std::sync::Arc;

use axum::Router;
use courier_core::config::CourierConfig;
use courier_core::DirectMessenger;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::http::relay::relay_handler;
use crate::http::reply::panic_reply;

/// Central shared state — built once at startup, passed as Arc<AppState> to
/// every request.
pub struct AppState {
    pub config: CourierConfig,
    /// Platform session; its readiness is checked on every request.
    pub messenger: Arc<dyn DirectMessenger>,
}

impl AppState {
    pub fn new(config: CourierConfig, messenger: Arc<dyn DirectMessenger>) -> Self {
        Self { config, messenger }
    }
}

/// Assemble the Axum router: every path lands on the relay handler.
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_in_flight = state.config.gateway.max_in_flight;

    let router = Router::new()
        .fallback(relay_handler)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_reply))
        .layer(TraceLayer::new_for_http());

    if max_in_flight > 0 {
        router.layer(ConcurrencyLimitLayer::new(max_in_flight))
    } else {
        router
    }
}
