use crate::{bool_from_any_row, DbError, DbPool};
use beacon_models::presence::Presence;
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct PresenceRow {
    pub user_id: i64,
    pub status: String,
    pub since: Option<i64>,
    /// JSON-encoded activity blob, opaque to the store.
    pub activity: Option<String>,
    pub afk: bool,
    pub stay_offline: bool,
}

impl<'r> sqlx::FromRow<'r, sqlx::any::AnyRow> for PresenceRow {
    fn from_row(row: &'r sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            status: row.try_get("status")?,
            since: row.try_get("since")?,
            activity: row.try_get("activity")?,
            afk: bool_from_any_row(row, "afk")?,
            stay_offline: bool_from_any_row(row, "stay_offline")?,
        })
    }
}

impl PresenceRow {
    /// Wire form: parses the activity blob and drops `stay_offline`, which
    /// must never reach a client.
    pub fn to_wire(&self) -> Presence {
        Presence {
            user_id: self.user_id,
            status: self.status.clone(),
            since: self.since,
            activity: self
                .activity
                .as_deref()
                .and_then(|raw| serde_json::from_str(raw).ok()),
            afk: self.afk,
        }
    }
}

pub async fn get_presence(pool: &DbPool, user_id: i64) -> Result<Option<PresenceRow>, DbError> {
    let row = sqlx::query_as::<_, PresenceRow>(
        "SELECT user_id, status, since, activity, afk, stay_offline
         FROM presences WHERE user_id = ?1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn put_presence(pool: &DbPool, row: &PresenceRow) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO presences (user_id, status, since, activity, afk, stay_offline)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(user_id) DO UPDATE SET
             status = excluded.status,
             since = excluded.since,
             activity = excluded.activity,
             afk = excluded.afk,
             stay_offline = excluded.stay_offline",
    )
    .bind(row.user_id)
    .bind(&row.status)
    .bind(row.since)
    .bind(&row.activity)
    .bind(row.afk)
    .bind(row.stay_offline)
    .execute(pool)
    .await?;
    Ok(())
}
