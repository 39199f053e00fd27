use std::sync::Arc;

use beacon_core::events::{
    Envelope, EVT_CHANNEL, EVT_FRIEND, EVT_GUILD, EVT_MEMBER, EVT_PRESENCE, EVT_USER,
};
use beacon_core::intents::Intents;
use beacon_models::gateway::{
    derived_name, GatewayFrame, EVENT_FRIEND_ACK, EVENT_FRIEND_REQUEST, EVENT_GUILD_CREATE,
    EVENT_PRESENCE_UPDATE,
};
use tokio::sync::mpsc;

use crate::registry::SessionRegistry;
use crate::session::Session;

/// Consume the publish channel until it closes, fanning each envelope out to
/// the matching sessions. Runs as its own task; no individual send can block
/// or fail it.
pub async fn run(registry: Arc<SessionRegistry>, mut events: mpsc::Receiver<Envelope>) {
    tracing::info!("event router subscribed to publish channel");
    while let Some(envelope) = events.recv().await {
        route(&registry, &envelope);
    }
    tracing::info!("publish channel closed, event router exiting");
}

/// Classify one envelope and enqueue a send per matching session. Envelopes
/// the gateway does not understand are expected traffic and dropped without
/// comment.
pub fn route(registry: &SessionRegistry, envelope: &Envelope) {
    match envelope.kind {
        EVT_USER => route_user(registry, envelope),
        EVT_GUILD => route_guild(registry, envelope),
        EVT_CHANNEL => route_channel(registry, envelope),
        EVT_FRIEND => route_friend(registry, envelope),
        EVT_MEMBER => route_member(registry, envelope),
        EVT_PRESENCE => route_presence(registry, envelope),
        other => tracing::trace!(kind = other, "dropping envelope of unknown type"),
    }
}

/// User updates go to every session of the user named in the payload.
fn route_user(registry: &SessionRegistry, envelope: &Envelope) {
    let (Some(name), Some(target)) = (
        envelope.name.as_deref(),
        envelope.data.get("user_id").and_then(id_from_value),
    ) else {
        return drop_partial(envelope);
    };
    let event = derived_name("USER", name);
    for session in registry.snapshot() {
        if session.user_id == target {
            deliver(&session, &event, envelope.data.clone());
        }
    }
}

/// Guild lifecycle. With a `user_id` the event is a creation/join for that
/// user: their sessions get `GUILD_CREATE` and start tracking the guild.
/// Without one it targets existing members, with membership maintenance on
/// JOIN and DELETE.
fn route_guild(registry: &SessionRegistry, envelope: &Envelope) {
    let Some(guild_id) = envelope.guild_id else {
        return drop_partial(envelope);
    };

    if let Some(user_id) = envelope.user_id {
        for session in registry.snapshot() {
            if session.user_id == user_id {
                deliver(&session, EVENT_GUILD_CREATE, envelope.data.clone());
                session.add_guild(guild_id);
            }
        }
        return;
    }

    let Some(name) = envelope.name.as_deref() else {
        return drop_partial(envelope);
    };
    let event = derived_name("GUILD", name);
    for session in registry.snapshot() {
        if !session.in_guild(guild_id) {
            continue;
        }
        deliver(&session, &event, envelope.data.clone());
        match name {
            "JOIN" => session.add_guild(guild_id),
            "DELETE" => session.remove_guild(guild_id),
            _ => {}
        }
    }
}

/// Channel and message traffic. Guild-scoped events go to members holding
/// the matching intent; DM events go to the channel's recipients holding
/// the `DIRECT_MESSAGES` intent.
fn route_channel(registry: &SessionRegistry, envelope: &Envelope) {
    let Some(name) = envelope.name.as_deref() else {
        return drop_partial(envelope);
    };
    let is_message = envelope.is_message.unwrap_or(false);
    let event = if is_message {
        derived_name("MESSAGE", name)
    } else {
        derived_name("CHANNEL", name)
    };

    if let Some(guild_id) = envelope.guild_id {
        let gate = if is_message {
            Intents::GUILD_MESSAGES
        } else {
            Intents::GUILD_CHANNELS
        };
        for session in registry.snapshot() {
            if session.in_guild(guild_id) && session.intents.contains(gate) {
                deliver(&session, &event, envelope.data.clone());
            }
        }
        return;
    }

    let Some(channel) = &envelope.channel else {
        return drop_partial(envelope);
    };
    for session in registry.snapshot() {
        let is_recipient = channel.recipients.iter().any(|r| r.id == session.user_id);
        if is_recipient && session.intents.contains(Intents::DIRECT_MESSAGES) {
            deliver(&session, &event, envelope.data.clone());
        }
    }
}

/// Friend requests: the receiver gets the full payload, the requester only
/// a bare acknowledgment.
fn route_friend(registry: &SessionRegistry, envelope: &Envelope) {
    if envelope.receiver_id.is_none() && envelope.requester_id.is_none() {
        return drop_partial(envelope);
    }
    for session in registry.snapshot() {
        if Some(session.user_id) == envelope.receiver_id {
            deliver(&session, EVENT_FRIEND_REQUEST, envelope.data.clone());
        } else if Some(session.user_id) == envelope.requester_id {
            deliver(&session, EVENT_FRIEND_ACK, serde_json::Value::Null);
        }
    }
}

fn route_member(registry: &SessionRegistry, envelope: &Envelope) {
    let (Some(name), Some(guild_id)) = (envelope.name.as_deref(), envelope.guild_id) else {
        return drop_partial(envelope);
    };
    let event = derived_name("MEMBER", name);
    for session in registry.snapshot() {
        if session.in_guild(guild_id) && session.intents.contains(Intents::GUILD_MEMBERS) {
            deliver(&session, &event, envelope.data.clone());
        }
    }
}

/// Presence changes fan out to every other session sharing at least one
/// guild with the acting user, behind the `PRESENCES` intent.
fn route_presence(registry: &SessionRegistry, envelope: &Envelope) {
    let Some(user_id) = envelope.user_id else {
        return drop_partial(envelope);
    };
    let snapshot = registry.snapshot();
    let Some(acting) = snapshot.iter().find(|s| s.user_id == user_id) else {
        // Presence for a user with no live session here (e.g. published by
        // another node): nothing to resolve guilds against.
        tracing::trace!(user_id, "presence source has no live session, dropping");
        return;
    };
    let guilds = acting.joined_guilds();
    for session in &snapshot {
        if session.user_id != user_id
            && session.shares_guild(&guilds)
            && session.intents.contains(Intents::PRESENCES)
        {
            deliver(session, EVENT_PRESENCE_UPDATE, envelope.data.clone());
        }
    }
}

fn deliver(session: &Session, event: &str, data: serde_json::Value) {
    if let Err(err) = session.send(GatewayFrame::dispatch(event, data)) {
        // One dead or slow session must never stall fan-out to the rest.
        tracing::warn!(
            session_id = %session.session_id,
            event,
            error = %err,
            "dropping event for session"
        );
    }
}

fn drop_partial(envelope: &Envelope) {
    tracing::trace!(kind = envelope.kind, "dropping envelope with missing fields");
}

fn id_from_value(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
