//! Fetch client contract and the reqwest-backed REST client

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Request, Url};

use crate::error::FetchError;
use crate::post::Post;
use crate::query::ListQuery;

const USER_AGENT: &str = concat!("have-posts/", env!("CARGO_PKG_VERSION"));
const TIMEOUT_SECS: u64 = 30;

/// Source of items for a [`PostLoop`](crate::PostLoop).
///
/// The loop treats items as opaque; only the renderer looks inside them.
pub trait Fetcher: Send + Sync + 'static {
    type Item: Clone + Send + Sync + 'static;

    /// Fetch one page of a collection listing
    fn fetch_page(&self, query: &ListQuery) -> impl Future<Output = Result<Vec<Self::Item>, FetchError>> + Send;

    /// Fetch a single item of `endpoint` by id
    fn fetch_one(&self, endpoint: &str, id: &str) -> impl Future<Output = Result<Self::Item, FetchError>> + Send;
}

// ============================================================================
// RestClient
// ============================================================================

/// Parse an API root; only absolute http(s) urls are accepted.
pub fn parse_api_root(api_root: &str) -> Result<Url, FetchError> {
    let url = Url::parse(api_root).map_err(|e| FetchError::Url(format!("{}: {}", api_root, e)))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::Url(format!("{}: not an http(s) url", api_root)));
    }
    Ok(url)
}

/// Fetcher for a WP REST API root such as `http://example.com/wp-json/wp/v2`
#[derive(Clone, Debug)]
pub struct RestClient {
    client: Client,
    api_root: String,
}

impl RestClient {
    pub fn new(api_root: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()?;
        Ok(Self::with_client(client, api_root))
    }

    /// Use a preconfigured client (proxies, auth headers, ...)
    pub fn with_client(client: Client, api_root: impl Into<String>) -> Self {
        let api_root = api_root.into().trim_end_matches('/').to_string();
        Self { client, api_root }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    pub fn collection_url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_root, endpoint)
    }

    /// Url of one item. The id is percent-encoded as a single path segment.
    pub fn item_url(&self, endpoint: &str, id: &str) -> Result<Url, FetchError> {
        let mut url = parse_api_root(&self.collection_url(endpoint))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Url(self.api_root.clone()))?
            .push(id);
        Ok(url)
    }

    /// The GET request for one page. Bracketed filter keys are sent as literal names.
    pub fn page_request(&self, query: &ListQuery) -> Result<Request, FetchError> {
        Ok(self
            .client
            .get(self.collection_url(&query.endpoint))
            .query(&query.params())
            .build()?)
    }

    pub fn item_request(&self, endpoint: &str, id: &str) -> Result<Request, FetchError> {
        Ok(self.client.get(self.item_url(endpoint, id)?).build()?)
    }

    async fn execute<T: serde::de::DeserializeOwned>(&self, request: Request) -> Result<T, FetchError> {
        tracing::debug!("GET {}", request.url());
        let response = self.client.execute(request).await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

impl Fetcher for RestClient {
    type Item = Post;

    async fn fetch_page(&self, query: &ListQuery) -> Result<Vec<Post>, FetchError> {
        let request = self.page_request(query)?;
        self.execute(request).await
    }

    async fn fetch_one(&self, endpoint: &str, id: &str) -> Result<Post, FetchError> {
        let request = self.item_request(endpoint, id)?;
        self.execute(request).await
    }
}
