use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use beacon_core::auth;
use beacon_core::events::Envelope;
use beacon_core::AppState;
use beacon_gateway::{gateway_router, GatewayState};

/// Full application router: the gateway upgrade route, the event ingest
/// boundary for producers, and a liveness probe.
pub fn app(state: GatewayState) -> Router {
    let api = Router::new()
        .route("/events", post(ingest_event))
        .route("/healthz", get(healthz))
        .with_state(state.app.clone());
    gateway_router(state).merge(api)
}

/// Producer-facing ingest: an authenticated POST publishes one envelope
/// onto the channel the router consumes. Routing decides everything else;
/// unknown kinds are simply dropped downstream.
async fn ingest_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(envelope): Json<Envelope>,
) -> StatusCode {
    let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return StatusCode::UNAUTHORIZED;
    };
    if let Err(err) = auth::verify_token(&state.db, token).await {
        tracing::debug!(error = %err, "event ingest rejected");
        return StatusCode::UNAUTHORIZED;
    }

    state.events.publish(envelope).await;
    StatusCode::ACCEPTED
}

async fn healthz() -> &'static str {
    "ok"
}
