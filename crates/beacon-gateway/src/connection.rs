use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use beacon_core::{auth, intents::Intents, AppState};
use beacon_db::guilds;
use beacon_models::gateway::{
    GatewayFrame, CLOSE_HANDSHAKE_FAILURE, CLOSE_INVALID_CREDENTIAL, CLOSE_RATE_LIMITED,
};
use beacon_models::user::PublicUser;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::GatewayError;
use crate::outbound::{self, OUTBOUND_QUEUE};
use crate::presence;
use crate::registry::SessionRegistry;
use crate::session::{ConnState, Session};

/// How long a fresh socket may sit silent before the first frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(300);
/// Low-frequency socket-health poll while the session is active.
const LIVENESS_POLL: Duration = Duration::from_secs(45);

#[derive(Debug)]
struct Hello {
    token: String,
    intents: u32,
}

/// First inbound frame: a JSON object carrying the session token and an
/// optional intent mask (absent means silent mode).
fn parse_hello(text: &str) -> Result<Hello, GatewayError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|_| GatewayError::MalformedFrame)?;
    let obj = value.as_object().ok_or(GatewayError::MalformedFrame)?;
    let token = obj
        .get("token")
        .and_then(|v| v.as_str())
        .ok_or(GatewayError::MissingCredential)?
        .to_string();
    let intents = obj
        .get("intents")
        .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .unwrap_or(0) as u32;
    Ok(Hello { token, intents })
}

/// Drive one client connection from accept to teardown.
pub async fn handle_connection(socket: WebSocket, state: AppState, registry: Arc<SessionRegistry>) {
    let (mut sink, mut stream) = socket.split();
    let conn_state = ConnState::Connecting;

    let first = match tokio::time::timeout(HANDSHAKE_TIMEOUT, stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Err(_))) | Ok(None) => return,
        _ => {
            tracing::debug!(state = ?conn_state, "handshake expired or non-text frame");
            send_close(&mut sink, CLOSE_HANDSHAKE_FAILURE, "expected a text frame").await;
            return;
        }
    };

    let hello = match parse_hello(&first) {
        Ok(hello) => hello,
        Err(err) => {
            tracing::debug!(state = ?conn_state, error = %err, "handshake rejected");
            let code = err.close_code().unwrap_or(CLOSE_HANDSHAKE_FAILURE);
            send_close(&mut sink, code, &err.to_string()).await;
            return;
        }
    };

    let conn_state = ConnState::Authenticating;
    let user = match auth::verify_token(&state.db, &hello.token).await {
        Ok(user) => user,
        Err(err) => {
            tracing::debug!(state = ?conn_state, error = %err, "authentication rejected");
            send_close(&mut sink, CLOSE_INVALID_CREDENTIAL, "invalid session credential").await;
            // The session never existed; nothing entered the registry.
            return;
        }
    };

    let intents = Intents::decode(hello.intents);
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
    let session = Arc::new(Session::new(user.id, intents, outbound_tx));
    tokio::spawn(outbound::run_writer(sink, outbound_rx, state.config.trace_tag()));

    registry.insert(session.clone());
    tracing::info!(
        user_id = session.user_id,
        session_id = %session.session_id,
        intents = ?session.intents,
        "session ready"
    );

    if let Err(err) = ready_sequence(&state, &session, &user).await {
        tracing::warn!(
            session_id = %session.session_id,
            error = %err,
            "ready sequence aborted"
        );
        teardown(&state, &registry, &session).await;
        return;
    }

    session.set_state(ConnState::Active);
    let reason = active_loop(&mut stream, &session).await;
    session.set_state(ConnState::Closing);
    tracing::info!(
        user_id = session.user_id,
        session_id = %session.session_id,
        reason,
        "connection closing"
    );
    teardown(&state, &registry, &session).await;
}

/// Push the ready payload and guild list, reconciling presence in between.
/// Guild membership is tracked for every guild; the per-guild push is what
/// the `GUILDS` intent gates.
async fn ready_sequence(
    state: &AppState,
    session: &Session,
    user: &PublicUser,
) -> Result<(), GatewayError> {
    let record = serde_json::to_value(user).expect("user record serializes");
    session.send(GatewayFrame::push(record))?;

    presence::reconcile(state, session).await?;

    let guilds = guilds::list_guilds_for(&state.db, session.user_id).await?;
    for guild in guilds {
        session.add_guild(guild.id);
        if session.intents.contains(Intents::GUILDS) {
            let payload = serde_json::to_value(guild.into_model()).expect("guild serializes");
            session.send(GatewayFrame::push(payload))?;
        }
    }
    Ok(())
}

/// Read frames until the connection dies, enforcing the inbound rate window
/// and polling socket health. The liveness interval is dropped with the
/// loop, so teardown never leaves a timer behind.
async fn active_loop(stream: &mut SplitStream<WebSocket>, session: &Session) -> &'static str {
    let mut liveness = tokio::time::interval(LIVENESS_POLL);
    liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                    if session.record_frame(Instant::now()) {
                        let _ = session.send_close(CLOSE_RATE_LIMITED, "too many requests");
                        break "rate limited";
                    }
                }
                Some(Ok(Message::Close(_))) => break "client close frame",
                Some(Ok(_)) => {} // ping/pong keep the socket warm
                Some(Err(_)) => break "websocket receive error",
                None => break "websocket stream ended",
            },
            _ = liveness.tick() => {
                if session.outbound_closed() {
                    break "write side closed";
                }
            }
        }
    }
}

/// Tear a session down exactly once, from whichever path got here first:
/// registry removal strictly precedes the presence flip, so the router can
/// no longer route to a session whose presence is going offline.
pub async fn teardown(state: &AppState, registry: &SessionRegistry, session: &Arc<Session>) {
    if !session.begin_teardown() {
        return;
    }
    registry.remove(&session.session_id);
    presence::cleanup(state, session).await;
    session.close_outbound();
    session.set_state(ConnState::Closed);
    tracing::debug!(session_id = %session.session_id, "session torn down");
}

async fn send_close(sink: &mut SplitSink<WebSocket, Message>, code: u16, reason: &str) {
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.to_string().into(),
        })))
        .await;
}
