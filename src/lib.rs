pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::config::AppConfig;
use crate::infra::{cache::RedisCache, db::Db, storage::ObjectStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: RedisCache,
    pub storage: ObjectStorage,
    pub admin_token: Option<String>,
    pub session_key: [u8; 32],
    pub session_ttl_minutes: u64,
    pub secure_cookies: bool,
    pub index_cache_ttl_seconds: u64,
    pub upload_max_bytes: usize,
    pub image_url_ttl_seconds: u64,
    pub s3_public_endpoint: Option<String>,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Db, cache: RedisCache, storage: ObjectStorage) -> Self {
        Self {
            db,
            cache,
            storage,
            admin_token: config.admin_token.clone(),
            session_key: config.session_key,
            session_ttl_minutes: config.session_ttl_minutes,
            secure_cookies: config.secure_cookies,
            index_cache_ttl_seconds: config.index_cache_ttl_seconds,
            upload_max_bytes: config.upload_max_bytes,
            image_url_ttl_seconds: config.image_url_ttl_seconds,
            s3_public_endpoint: config.s3_public_endpoint.clone(),
        }
    }
}
