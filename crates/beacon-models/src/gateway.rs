use serde::{Deserialize, Serialize};

// Outbound opcodes
pub const OP_DISPATCH: u8 = 0;
pub const OP_PUSH: u8 = 1;

// Close codes
pub const CLOSE_MALFORMED_FRAME: u16 = 4001;
pub const CLOSE_MISSING_CREDENTIAL: u16 = 4002;
pub const CLOSE_INVALID_CREDENTIAL: u16 = 4003;
pub const CLOSE_HANDSHAKE_FAILURE: u16 = 4005;
pub const CLOSE_RATE_LIMITED: u16 = 4008;

// Fixed dispatch event names
pub const EVENT_GUILD_CREATE: &str = "GUILD_CREATE";
pub const EVENT_PRESENCE_UPDATE: &str = "PRESENCE_UPDATE";
pub const EVENT_FRIEND_REQUEST: &str = "FRIEND_REQUEST";
pub const EVENT_FRIEND_ACK: &str = "FRIEND_ACK";

/// One frame on its way to a client: `op` 0 is a dispatch (named event),
/// `op` 1 a generic push such as the ready payload. `_trace` carries one
/// deployment-identifying string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayFrame {
    pub op: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    pub d: serde_json::Value,
    #[serde(rename = "_trace")]
    pub trace: Vec<String>,
}

impl GatewayFrame {
    pub fn dispatch(name: impl Into<String>, d: serde_json::Value) -> Self {
        Self {
            op: OP_DISPATCH,
            t: Some(name.into()),
            d,
            trace: Vec::new(),
        }
    }

    pub fn push(d: serde_json::Value) -> Self {
        Self {
            op: OP_PUSH,
            t: None,
            d,
            trace: Vec::new(),
        }
    }
}

/// Derived event name for a sub-action, e.g. `derived_name("GUILD", "JOIN")`
/// is `GUILD_JOIN`.
pub fn derived_name(prefix: &str, name: &str) -> String {
    format!("{prefix}_{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_frame_serializes_with_trace_field() {
        let mut frame = GatewayFrame::dispatch("MESSAGE_CREATE", serde_json::json!({"id": "1"}));
        frame.trace = vec!["beacon-local-gateway-dev".to_string()];
        let raw = serde_json::to_value(&frame).unwrap();
        assert_eq!(raw["op"], 0);
        assert_eq!(raw["t"], "MESSAGE_CREATE");
        assert_eq!(raw["_trace"][0], "beacon-local-gateway-dev");
    }

    #[test]
    fn push_frame_omits_event_name() {
        let raw = serde_json::to_string(&GatewayFrame::push(serde_json::json!({}))).unwrap();
        assert!(!raw.contains("\"t\""));
    }
}
