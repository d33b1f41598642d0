use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::app::pagination::{Paginated, Paginator, PAGE_SIZE};
use crate::domain::group::GroupRef;
use crate::domain::post::Post;
use crate::domain::user::Author;
use crate::infra::db::Db;

const POST_SELECT: &str = "SELECT p.id, p.text, p.pub_date, p.image, \
            p.author_id, u.username AS author_username, \
            p.group_id, g.title AS group_title, g.slug AS group_slug \
     FROM posts p \
     JOIN users u ON u.id = p.author_id \
     LEFT JOIN post_groups g ON g.id = p.group_id";

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(Uuid),
    /// Posts by every author the given user follows.
    FollowedBy(Uuid),
}

impl PostFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match *self {
            PostFilter::All => {}
            PostFilter::Group(group_id) => {
                qb.push(" WHERE p.group_id = ").push_bind(group_id);
            }
            PostFilter::Author(author_id) => {
                qb.push(" WHERE p.author_id = ").push_bind(author_id);
            }
            PostFilter::FollowedBy(user_id) => {
                qb.push(" WHERE p.author_id IN (SELECT followee_id FROM follows WHERE follower_id = ")
                    .push_bind(user_id)
                    .push(")");
            }
        }
    }
}

/// Fields written by create and edit.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<String>,
}

fn post_from_row(row: &PgRow) -> Post {
    let group_id: Option<i64> = row.get("group_id");
    let group = group_id.map(|id| GroupRef {
        id,
        title: row.get("group_title"),
        slug: row.get("group_slug"),
    });

    Post {
        id: row.get("id"),
        text: row.get("text"),
        pub_date: row.get("pub_date"),
        author: Author {
            id: row.get("author_id"),
            username: row.get("author_username"),
        },
        group,
        image: row.get("image"),
        image_url: None,
    }
}

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, author_id: Uuid, changes: PostChanges) -> Result<Post> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO posts (text, author_id, group_id, image) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(changes.text)
        .bind(author_id)
        .bind(changes.group_id)
        .bind(changes.image)
        .fetch_one(self.db.pool())
        .await?;

        self.get_post(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("post {} vanished after insert", id))
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let sql = format!("{} WHERE p.id = $1", POST_SELECT);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// A post addressed by its author's username, as in `/<username>/<id>/`.
    pub async fn get_by_author(&self, username: &str, post_id: i64) -> Result<Option<Post>> {
        let sql = format!("{} WHERE p.id = $1 AND u.username = $2", POST_SELECT);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    /// Updates text, group and image of a post owned by `author_id`.
    pub async fn update_post(
        &self,
        post_id: i64,
        author_id: Uuid,
        changes: PostChanges,
    ) -> Result<Option<Post>> {
        let updated = sqlx::query(
            "UPDATE posts SET text = $3, group_id = $4, image = $5 \
             WHERE id = $1 AND author_id = $2",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(changes.text)
        .bind(changes.group_id)
        .bind(changes.image)
        .execute(self.db.pool())
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_post(post_id).await
    }

    pub async fn count(&self, filter: PostFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p");
        filter.push_where(&mut qb);
        let count: i64 = qb.build_query_scalar().fetch_one(self.db.pool()).await?;
        Ok(count)
    }

    /// One page of posts, newest first. `requested` is the raw `page` parameter.
    pub async fn page(&self, filter: PostFilter, requested: Option<&str>) -> Result<Paginated<Post>> {
        let paginator = Paginator::new(self.count(filter).await?, PAGE_SIZE);
        let window = paginator.resolve(requested);

        let mut qb = QueryBuilder::<Postgres>::new(POST_SELECT);
        filter.push_where(&mut qb);
        qb.push(" ORDER BY p.pub_date DESC, p.id DESC LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);

        let rows = qb.build().fetch_all(self.db.pool()).await?;
        let posts = rows.iter().map(post_from_row).collect();

        Ok(paginator.page(window, posts))
    }
}
