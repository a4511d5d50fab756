use shared::{
    domain::{Post, User},
    protocol::SearchResponse,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::typed_fetch::{FetchResult, TypedClient};

/// Upper bound on posts retained per search query.
pub const MAX_SEARCH_RESULTS: usize = 15;

/// High-level client for the remote listings API.
#[derive(Debug, Clone)]
pub struct ListingsClient {
    http: TypedClient,
    base_url: String,
}

impl ListingsClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(TypedClient::new(), base_url)
    }

    pub fn with_client(http: TypedClient, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn list_users(&self, cancel: &CancellationToken) -> FetchResult<Vec<User>> {
        self.http
            .get_json(&format!("{}/users", self.base_url), cancel)
            .await
    }

    pub async fn list_posts(&self, cancel: &CancellationToken) -> FetchResult<Vec<Post>> {
        self.http
            .get_json(&format!("{}/posts", self.base_url), cancel)
            .await
    }

    /// Fetches the post collection and filters it client-side by
    /// title-or-body substring, keeping at most [`MAX_SEARCH_RESULTS`].
    pub async fn search_posts(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> FetchResult<SearchResponse> {
        let posts = self.list_posts(cancel).await?;
        let mut matched: Vec<Post> = posts.into_iter().filter(|post| post.matches(query)).collect();
        matched.truncate(MAX_SEARCH_RESULTS);
        let total = matched.len();
        debug!(%query, total, "search_posts filtered post collection");
        Ok(SearchResponse {
            posts: matched,
            total,
        })
    }
}
