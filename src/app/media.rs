use anyhow::{anyhow, Result};
use aws_sdk_s3::presigning::PresigningConfig;
use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use redis::AsyncCommands;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::time::Duration;
use url::Url;

use crate::domain::post::Post;
use crate::infra::{cache::RedisCache, storage::ObjectStorage};

/// Prefix every post image is stored under.
pub const POST_IMAGE_PREFIX: &str = "posts/";

/// A file as received from a form, before any checks.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub bytes: Bytes,
}

/// An upload that decoded as one of the accepted image formats.
#[derive(Debug, Clone)]
pub struct CheckedImage {
    pub filename: String,
    pub format: ImageFormat,
    pub bytes: Bytes,
}

impl CheckedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }
}

/// Reads the image header to make sure the upload really is an image.
pub fn check_image(upload: ImageUpload) -> Result<CheckedImage> {
    if upload.bytes.is_empty() {
        return Err(anyhow!("the submitted file is empty"));
    }

    let reader = ImageReader::new(Cursor::new(upload.bytes.as_ref())).with_guessed_format()?;
    let format = reader
        .format()
        .ok_or_else(|| anyhow!("unrecognised image format"))?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
    ) {
        return Err(anyhow!("unsupported image format: {:?}", format));
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|err| anyhow!("failed to read image: {}", err))?;
    if width == 0 || height == 0 {
        return Err(anyhow!("image has no pixels"));
    }

    Ok(CheckedImage {
        filename: upload.filename,
        format,
        bytes: upload.bytes,
    })
}

/// `posts/<filename>` with the name reduced to a safe character set.
pub fn post_image_key(filename: &str, format: ImageFormat) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut name: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    name = name.trim_start_matches('.').to_string();

    let extension = format.extensions_str().first().copied().unwrap_or("img");
    if name.is_empty() {
        name = format!("image.{}", extension);
    } else if !name.contains('.') {
        name = format!("{}.{}", name, extension);
    }

    format!("{}{}", POST_IMAGE_PREFIX, name)
}

/// `key` with a short content hash appended before the extension, so identical
/// bytes land on the same object and different bytes never share one.
pub fn hashed_image_key(key: &str, bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    let suffix = &digest[..7];
    match key.rsplit_once('.') {
        Some((stem, ext)) if !stem.ends_with('/') => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", key, suffix),
    }
}

/// Object key a checked image is stored under.
pub fn stored_image_key(image: &CheckedImage) -> String {
    hashed_image_key(&post_image_key(&image.filename, image.format), &image.bytes)
}

#[derive(Clone)]
pub struct MediaService {
    cache: RedisCache,
    storage: ObjectStorage,
    s3_public_endpoint: Option<String>,
}

impl MediaService {
    pub fn new(
        cache: RedisCache,
        storage: ObjectStorage,
        s3_public_endpoint: Option<String>,
    ) -> Self {
        Self {
            cache,
            storage,
            s3_public_endpoint,
        }
    }

    /// Stores the image bytes unchanged and returns the object key.
    pub async fn store_post_image(&self, image: &CheckedImage) -> Result<String> {
        let key = stored_image_key(image);

        self.storage
            .put_object(&key, image.content_type(), image.bytes.clone())
            .await?;

        tracing::info!(key = %key, bytes = image.bytes.len(), "stored post image");
        Ok(key)
    }

    /// Presigned GET URL for an object key, cached in Redis for most of its lifetime.
    pub async fn generate_presigned_get_url(
        &self,
        object_key: Option<&str>,
        expires_in_seconds: u64,
    ) -> Option<String> {
        let key = object_key?;
        let cache_key = format!("presigned:{}", key);

        if let Ok(mut conn) = self.cache.client().get_multiplexed_async_connection().await {
            if let Ok(Some(cached)) = conn.get::<_, Option<String>>(&cache_key).await {
                return Some(cached);
            }
        }

        let presign_config =
            PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds)).ok()?;

        let presigned = self
            .storage
            .client()
            .get_object()
            .bucket(self.storage.bucket())
            .key(key)
            .presigned(presign_config)
            .await
            .ok()?;

        let mut url = presigned.uri().to_string();

        if let Some(ref public_endpoint) = self.s3_public_endpoint {
            match rewrite_presigned_url(&url, public_endpoint) {
                Ok(rewritten) => url = rewritten,
                Err(err) => tracing::warn!(error = ?err, "failed to rewrite presigned URL"),
            }
        }

        // keep a 5 minute margin before the signature expires
        let cache_ttl = expires_in_seconds.saturating_sub(300);
        if cache_ttl > 0 {
            if let Ok(mut conn) = self.cache.client().get_multiplexed_async_connection().await {
                let _ = conn.set_ex::<_, _, ()>(&cache_key, &url, cache_ttl).await;
            }
        }

        Some(url)
    }

    pub async fn populate_image_urls(&self, posts: &mut [Post], expires_in_seconds: u64) {
        let futures: Vec<_> = posts
            .iter()
            .enumerate()
            .filter(|(_, post)| post.image.is_some())
            .map(|(i, post)| {
                let key = post.image.clone();
                async move {
                    let url = self
                        .generate_presigned_get_url(key.as_deref(), expires_in_seconds)
                        .await;
                    (i, url)
                }
            })
            .collect();

        let results = futures::future::join_all(futures).await;
        for (i, url) in results {
            posts[i].image_url = url;
        }
    }
}

fn rewrite_presigned_url(original: &str, public_endpoint: &str) -> Result<String> {
    let mut original_url = Url::parse(original)?;
    let public_url = if public_endpoint.contains("://") {
        Url::parse(public_endpoint)?
    } else {
        Url::parse(&format!("http://{}", public_endpoint))?
    };

    original_url
        .set_scheme(public_url.scheme())
        .map_err(|_| anyhow!("invalid scheme for public endpoint"))?;
    original_url
        .set_host(public_url.host_str())
        .map_err(|_| anyhow!("invalid host for public endpoint"))?;
    original_url.set_port(public_url.port()).ok();

    Ok(original_url.to_string())
}
