use serde::{Deserialize, Serialize};

pub const STATUS_ONLINE: &str = "online";
pub const STATUS_OFFLINE: &str = "offline";

/// Presence as pushed to clients. `stay_offline` never appears here: it is
/// a private flag stripped before any payload leaves the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presence {
    pub user_id: i64,
    pub status: String,
    pub since: Option<i64>,
    pub activity: Option<serde_json::Value>,
    pub afk: bool,
}
