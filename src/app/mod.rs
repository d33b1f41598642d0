pub mod auth;
pub mod comments;
pub mod feed;
pub mod forms;
pub mod groups;
pub mod media;
pub mod pagination;
pub mod posts;
pub mod social;
pub mod users;
