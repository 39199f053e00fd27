use crate::{datetime_from_db_text, DbError, DbPool};
use beacon_models::guild::Guild;
use chrono::{DateTime, Utc};
use sqlx::Row;

#[derive(Debug, Clone)]
pub struct GuildRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon_hash: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::any::AnyRow> for GuildRow {
    fn from_row(row: &'r sqlx::any::AnyRow) -> Result<Self, sqlx::Error> {
        let created_at_raw: String = row.try_get("created_at")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            icon_hash: row.try_get("icon_hash")?,
            owner_id: row.try_get("owner_id")?,
            created_at: datetime_from_db_text(&created_at_raw)?,
        })
    }
}

impl GuildRow {
    pub fn into_model(self) -> Guild {
        Guild {
            id: self.id,
            name: self.name,
            description: self.description,
            icon: self.icon_hash,
            owner_id: self.owner_id,
            created_at: self.created_at,
        }
    }
}

pub async fn create_guild(
    pool: &DbPool,
    id: i64,
    name: &str,
    owner_id: i64,
) -> Result<GuildRow, DbError> {
    let row = sqlx::query_as::<_, GuildRow>(
        "INSERT INTO guilds (id, name, owner_id)
         VALUES (?1, ?2, ?3)
         RETURNING id, name, description, icon_hash, owner_id, CAST(created_at AS TEXT) AS created_at",
    )
    .bind(id)
    .bind(name)
    .bind(owner_id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

pub async fn get_guild(pool: &DbPool, id: i64) -> Result<Option<GuildRow>, DbError> {
    let row = sqlx::query_as::<_, GuildRow>(
        "SELECT id, name, description, icon_hash, owner_id, CAST(created_at AS TEXT) AS created_at
         FROM guilds WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Guilds the user is a member of, in join order. This is the ready-sequence
/// guild list.
pub async fn list_guilds_for(pool: &DbPool, user_id: i64) -> Result<Vec<GuildRow>, DbError> {
    let rows = sqlx::query_as::<_, GuildRow>(
        "SELECT g.id, g.name, g.description, g.icon_hash, g.owner_id, CAST(g.created_at AS TEXT) AS created_at
         FROM guilds g
         INNER JOIN members m ON m.guild_id = g.id
         WHERE m.user_id = ?1
         ORDER BY m.joined_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{members::add_member, test_pool, users::create_user};

    #[tokio::test]
    async fn list_guilds_for_returns_only_memberships() {
        let pool = test_pool().await;
        create_user(&pool, 1, "ana", 1, "a@example.com", "h", "s")
            .await
            .unwrap();
        create_user(&pool, 2, "bo", 1, "b@example.com", "h", "s")
            .await
            .unwrap();
        create_guild(&pool, 10, "first", 1).await.unwrap();
        create_guild(&pool, 11, "second", 2).await.unwrap();
        add_member(&pool, 1, 10).await.unwrap();
        add_member(&pool, 2, 10).await.unwrap();
        add_member(&pool, 2, 11).await.unwrap();

        let guilds = list_guilds_for(&pool, 1).await.unwrap();
        assert_eq!(guilds.len(), 1);
        assert_eq!(guilds[0].id, 10);

        let guilds = list_guilds_for(&pool, 2).await.unwrap();
        assert_eq!(guilds.len(), 2);
    }
}
