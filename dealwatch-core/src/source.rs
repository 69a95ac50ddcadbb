use crate::error::CoreError;
use crate::types::Post;
use async_trait::async_trait;

/// Read-only access to a forum that lists its newest posts.
#[async_trait]
pub trait PostSource: Send + Sync {
    /// Up to `limit` most recent posts of `source`, newest first.
    async fn fetch_new(&self, source: &str, limit: u32) -> Result<Vec<Post>, CoreError>;
}
