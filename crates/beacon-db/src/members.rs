use crate::{DbError, DbPool};

pub async fn add_member(pool: &DbPool, user_id: i64, guild_id: i64) -> Result<(), DbError> {
    sqlx::query("INSERT INTO members (user_id, guild_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING")
        .bind(user_id)
        .bind(guild_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_member(pool: &DbPool, user_id: i64, guild_id: i64) -> Result<(), DbError> {
    sqlx::query("DELETE FROM members WHERE user_id = ?1 AND guild_id = ?2")
        .bind(user_id)
        .bind(guild_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn is_member(pool: &DbPool, user_id: i64, guild_id: i64) -> Result<bool, DbError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM members WHERE user_id = ?1 AND guild_id = ?2")
            .bind(user_id)
            .bind(guild_id)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}
