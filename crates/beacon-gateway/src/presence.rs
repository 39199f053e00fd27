use beacon_core::events::Envelope;
use beacon_core::AppState;
use beacon_db::presences::{self, PresenceRow};
use beacon_models::presence::{STATUS_OFFLINE, STATUS_ONLINE};

use crate::error::GatewayError;
use crate::session::Session;

/// Reconcile a user's stored presence at the Ready transition.
///
/// A missing row becomes a fresh online record. An existing row flips to
/// online and is re-published — unless the user set the sticky manual-offline
/// flag, in which case the gateway must leave the status untouched and push
/// nothing. The result is cached on the session so teardown does not need a
/// second fetch.
pub async fn reconcile(state: &AppState, session: &Session) -> Result<PresenceRow, GatewayError> {
    let row = match presences::get_presence(&state.db, session.user_id).await? {
        None => {
            let row = PresenceRow {
                user_id: session.user_id,
                status: STATUS_ONLINE.to_string(),
                since: Some(chrono::Utc::now().timestamp()),
                activity: None,
                afk: false,
                stay_offline: false,
            };
            presences::put_presence(&state.db, &row).await?;
            publish(state, &row).await;
            row
        }
        Some(row) if row.stay_offline => {
            // Offline on purpose: no flip, no push.
            row
        }
        Some(mut row) => {
            row.status = STATUS_ONLINE.to_string();
            row.since = Some(chrono::Utc::now().timestamp());
            presences::put_presence(&state.db, &row).await?;
            publish(state, &row).await;
            row
        }
    };

    session.cache_presence(row.clone());
    Ok(row)
}

/// Flip the session's user offline at teardown. Idempotent: an
/// already-offline record publishes nothing, and the refreshed cache makes
/// any repeated call a no-op. Store failures are logged, not escalated —
/// teardown must always complete.
pub async fn cleanup(state: &AppState, session: &Session) {
    let row = match session.cached_presence() {
        Some(row) => Some(row),
        None => match presences::get_presence(&state.db, session.user_id).await {
            Ok(row) => row,
            Err(err) => {
                tracing::warn!(
                    user_id = session.user_id,
                    error = %err,
                    "presence cleanup: fetch failed"
                );
                return;
            }
        },
    };

    let Some(mut row) = row else {
        return;
    };
    if row.status == STATUS_OFFLINE {
        return;
    }

    row.status = STATUS_OFFLINE.to_string();
    if let Err(err) = presences::put_presence(&state.db, &row).await {
        tracing::warn!(
            user_id = session.user_id,
            error = %err,
            "presence cleanup: store update failed"
        );
        return;
    }
    session.cache_presence(row.clone());
    publish(state, &row).await;
}

/// Push a presence-changed envelope onto the publish channel. The wire form
/// strips the sticky flag.
async fn publish(state: &AppState, row: &PresenceRow) {
    let data = match serde_json::to_value(row.to_wire()) {
        Ok(data) => data,
        Err(err) => {
            tracing::error!(error = %err, "presence payload serialization failed");
            return;
        }
    };
    state.events.publish(Envelope::presence_update(row.user_id, data)).await;
}
