use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::group::Group;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct GroupService {
    db: Db,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub title: String,
    pub slug: Option<String>,
    pub description: Option<String>,
}

fn group_from_row(row: &PgRow) -> Group {
    Group {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        description: row.get("description"),
    }
}

impl GroupService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Inserts a group. Returns `None` when the slug is already taken.
    pub async fn create(&self, group: NewGroup) -> Result<Option<Group>> {
        let row = sqlx::query(
            "INSERT INTO post_groups (title, slug, description) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (slug) DO NOTHING \
             RETURNING id, title, slug, description",
        )
        .bind(group.title)
        .bind(group.slug)
        .bind(group.description)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query(
            "SELECT id, title, slug, description FROM post_groups WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(group_from_row))
    }

    /// Every group, alphabetically; used as the choices of the post form.
    pub async fn list_all(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT id, title, slug, description FROM post_groups ORDER BY title, id",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows.iter().map(group_from_row).collect())
    }

    /// Posts of a deleted group stay, with their group cleared.
    pub async fn delete_by_slug(&self, slug: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM post_groups WHERE slug = $1")
            .bind(slug)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
