pub mod compression;
pub mod connection;
pub mod error;
pub mod outbound;
pub mod presence;
pub mod registry;
pub mod router;
pub mod session;

use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use beacon_core::events::Envelope;
use beacon_core::AppState;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use registry::SessionRegistry;

/// Everything a gateway route needs: the shared app handle plus the session
/// registry injected into both the connection tasks and the router.
#[derive(Clone)]
pub struct GatewayState {
    pub app: AppState,
    pub registry: Arc<SessionRegistry>,
}

pub fn gateway_router(state: GatewayState) -> Router {
    Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::handle_connection(socket, state.app, state.registry))
}

/// Start the fan-out router on the publish channel's receiving half. The
/// task ends when every publish handle is gone.
pub fn spawn_fanout(
    registry: Arc<SessionRegistry>,
    events: mpsc::Receiver<Envelope>,
) -> JoinHandle<()> {
    tokio::spawn(router::run(registry, events))
}
