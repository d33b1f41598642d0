use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::follow::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

fn follow_from_row(row: &PgRow) -> Follow {
    Follow {
        id: row.get("id"),
        follower_id: row.get("follower_id"),
        followee_id: row.get("followee_id"),
        created_at: row.get("created_at"),
    }
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Get-or-create of the `follower -> followee` edge. The boolean is true
    /// when this call created it. The no-op update makes the conflicting row
    /// come back from the same statement; `xmax = 0` only for a fresh insert.
    pub async fn follow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<(Follow, bool)> {
        let row = sqlx::query(
            "INSERT INTO follows (follower_id, followee_id) \
             VALUES ($1, $2) \
             ON CONFLICT ON CONSTRAINT follows_unique_pair \
             DO UPDATE SET follower_id = EXCLUDED.follower_id \
             RETURNING id, follower_id, followee_id, created_at, (xmax = 0) AS created",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok((follow_from_row(&row), row.get("created")))
    }

    pub async fn unfollow(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(exists)
    }
}
