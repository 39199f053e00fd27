use crate::{datetime_from_db_text, DbError, DbPool};
use beacon_models::user::PublicUser;
use chrono::{DateTime, Utc};
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub discriminator: i16,
    pub email: String,
    pub password_hash: String,
    pub token_secret: String,
    pub display_name: Option<String>,
    pub avatar_hash: Option<String>,
    pub flags: i32,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::any::AnyRow> for UserRow {
    fn from_row(row: &'r sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
        let created_at_raw: String = row.try_get("created_at")?;
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            discriminator: row.try_get("discriminator")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            token_secret: row.try_get("token_secret")?,
            display_name: row.try_get("display_name")?,
            avatar_hash: row.try_get("avatar_hash")?,
            flags: row.try_get("flags")?,
            created_at: datetime_from_db_text(&created_at_raw)?,
        })
    }
}

impl UserRow {
    /// Strip secrets before the record leaves the store layer.
    pub fn into_public(self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username,
            discriminator: self.discriminator,
            display_name: self.display_name,
            avatar: self.avatar_hash,
            flags: self.flags,
            created_at: self.created_at,
        }
    }
}

pub async fn create_user(
    pool: &DbPool,
    id: i64,
    username: &str,
    discriminator: i16,
    email: &str,
    password_hash: &str,
    token_secret: &str,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (id, username, discriminator, email, password_hash, token_secret)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id, username, discriminator, email, password_hash, token_secret, display_name, avatar_hash, flags, CAST(created_at AS TEXT) AS created_at"
    )
    .bind(id)
    .bind(username)
    .bind(discriminator)
    .bind(email)
    .bind(password_hash)
    .bind(token_secret)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_user(pool: &DbPool, id: i64) -> Result<Option<UserRow>, DbError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, discriminator, email, password_hash, token_secret, display_name, avatar_hash, flags, CAST(created_at AS TEXT) AS created_at
         FROM users WHERE id = ?1"
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
