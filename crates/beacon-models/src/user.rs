use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user record with every secret stripped, safe to push over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    pub discriminator: i16,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub flags: i32,
    pub created_at: DateTime<Utc>,
}
