use anyhow::Result;
use tracing::warn;
use uuid::Uuid;

use crate::app::media::MediaService;
use crate::app::pagination::{requested_page_key, Paginated};
use crate::app::posts::{PostFilter, PostService};
use crate::domain::post::Post;
use crate::infra::{cache::RedisCache, db::Db};

/// Fragment name of the cached index listing.
pub const INDEX_FRAGMENT: &str = "index_page";

#[derive(Clone)]
pub struct FeedService {
    posts: PostService,
    media: MediaService,
    cache: RedisCache,
    index_ttl_seconds: u64,
    image_url_ttl_seconds: u64,
}

impl FeedService {
    pub fn new(
        db: Db,
        cache: RedisCache,
        media: MediaService,
        index_ttl_seconds: u64,
        image_url_ttl_seconds: u64,
    ) -> Self {
        Self {
            posts: PostService::new(db),
            media,
            cache,
            index_ttl_seconds,
            image_url_ttl_seconds,
        }
    }

    /// The public index page. Served from the fragment cache when present;
    /// writes do not invalidate it, so new posts show up once the entry expires.
    pub async fn index_page(&self, requested: Option<&str>) -> Result<Paginated<Post>> {
        let vary_on = requested_page_key(requested);

        if let Some(payload) = self.cache.get_fragment(INDEX_FRAGMENT, &vary_on).await {
            match serde_json::from_str::<Paginated<Post>>(&payload) {
                Ok(page) => return Ok(page),
                Err(err) => warn!(error = ?err, "discarding unreadable index fragment"),
            }
        }

        let mut page = self.posts.page(PostFilter::All, requested).await?;
        self.media
            .populate_image_urls(&mut page.object_list, self.image_url_ttl_seconds)
            .await;

        match serde_json::to_string(&page) {
            Ok(payload) => {
                self.cache
                    .set_fragment(INDEX_FRAGMENT, &vary_on, &payload, self.index_ttl_seconds)
                    .await
            }
            Err(err) => warn!(error = ?err, "failed to encode index fragment"),
        }

        Ok(page)
    }

    /// Posts by the authors `user_id` follows, newest first. Not cached.
    pub async fn follow_page(&self, user_id: Uuid, requested: Option<&str>) -> Result<Paginated<Post>> {
        let mut page = self.posts.page(PostFilter::FollowedBy(user_id), requested).await?;
        self.media
            .populate_image_urls(&mut page.object_list, self.image_url_ttl_seconds)
            .await;
        Ok(page)
    }
}
