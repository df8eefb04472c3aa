use serde::{Deserialize, Serialize};

/// A catalog item returned by the destination platform's search endpoint.
///
/// Fields the platform did not return degrade to `None` at the adapter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub catalog_id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    /// Network failure, 5xx, throttling or an expired credential. Safe to retry.
    #[error("Transient catalog API error: {0}")]
    Transient(String),
    /// The platform reported that the request quota is exhausted.
    #[error("Catalog API quota exceeded: {0}")]
    QuotaExceeded(String),
    /// The platform refused the request for a reason retrying will not fix.
    #[error("Catalog API rejected the request: {0}")]
    Rejected(String),
}

/// Port trait wrapping the destination catalog capabilities the export engine uses.
///
/// Implementations live in `youtube::client` (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Search the catalog. Each call is a fresh query and consumes request quota.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, CatalogError>;

    /// Create an empty destination playlist and return its id.
    async fn create_playlist(&self, title: &str, description: &str)
    -> Result<String, CatalogError>;

    /// Append a catalog item to the end of a playlist.
    async fn append_item(&self, playlist_id: &str, catalog_id: &str) -> Result<(), CatalogError>;
}
