use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::group::GroupRef;
use crate::domain::user::Author;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub pub_date: OffsetDateTime,
    pub author: Author,
    pub group: Option<GroupRef>,
    /// Object key of the attached image, e.g. `posts/small.gif`.
    pub image: Option<String>,
    /// Presigned URL for `image` (populated at response time)
    #[serde(default)]
    pub image_url: Option<String>,
}
