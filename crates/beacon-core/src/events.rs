use serde::Deserialize;
use tokio::sync::mpsc;

// Envelope types carried on the publish channel.
pub const EVT_USER: u8 = 1;
pub const EVT_GUILD: u8 = 2;
pub const EVT_CHANNEL: u8 = 3;
pub const EVT_FRIEND: u8 = 5;
pub const EVT_MEMBER: u8 = 6;
pub const EVT_PRESENCE: u8 = 7;

/// One published domain event. Envelopes are transient: read once off the
/// channel, routed, dropped. The channel carries kinds this gateway does not
/// interpret; those are skipped silently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub guild_id: Option<i64>,
    #[serde(default)]
    pub receiver_id: Option<i64>,
    #[serde(default)]
    pub requester_id: Option<i64>,
    #[serde(default)]
    pub is_message: Option<bool>,
    #[serde(default)]
    pub channel: Option<ChannelRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelRef {
    #[serde(default)]
    pub recipients: Vec<RecipientRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecipientRef {
    pub id: i64,
}

impl Envelope {
    /// Presence-changed envelope as published by the presence manager.
    pub fn presence_update(user_id: i64, data: serde_json::Value) -> Self {
        Self {
            kind: EVT_PRESENCE,
            name: Some("UPDATE".to_string()),
            data,
            user_id: Some(user_id),
            ..Self::default()
        }
    }
}

/// Publish handle for the single logical event channel. The paired receiver
/// is consumed by the fan-out router in its own task; the channel is bounded
/// so envelope arrival decouples from per-session send latency.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Envelope>,
}

pub fn channel(capacity: usize) -> (EventBus, mpsc::Receiver<Envelope>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventBus { tx }, rx)
}

impl EventBus {
    pub async fn publish(&self, envelope: Envelope) {
        if self.tx.send(envelope).await.is_err() {
            tracing::warn!("publish channel closed, dropping envelope");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_parses_full_shape() {
        let raw = serde_json::json!({
            "type": 3,
            "name": "CREATE",
            "is_message": true,
            "guild_id": 7,
            "data": {"id": "1", "content": "hi"},
        });
        let envelope: Envelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.kind, EVT_CHANNEL);
        assert_eq!(envelope.name.as_deref(), Some("CREATE"));
        assert_eq!(envelope.guild_id, Some(7));
        assert_eq!(envelope.is_message, Some(true));
    }

    #[test]
    fn envelope_parses_dm_recipients() {
        let raw = serde_json::json!({
            "type": 3,
            "name": "CREATE",
            "is_message": true,
            "channel": {"recipients": [{"id": 1}, {"id": 2}]},
            "data": {},
        });
        let envelope: Envelope = serde_json::from_value(raw).unwrap();
        let recipients = envelope.channel.unwrap().recipients;
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[1].id, 2);
    }

    #[tokio::test]
    async fn published_envelopes_arrive_in_order() {
        let (bus, mut rx) = channel(8);
        bus.publish(Envelope {
            kind: EVT_USER,
            ..Envelope::default()
        })
        .await;
        bus.publish(Envelope::presence_update(1, serde_json::json!({})))
            .await;
        assert_eq!(rx.recv().await.unwrap().kind, EVT_USER);
        assert_eq!(rx.recv().await.unwrap().kind, EVT_PRESENCE);
    }
}
