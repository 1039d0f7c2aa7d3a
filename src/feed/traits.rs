use crate::catalog::{GoodsCatalog, LatestSnapshot};
use crate::model::{FeedRecord, FetchError, Region};

/// Read-only access to the remote price data feed.
#[async_trait::async_trait]
pub trait PriceFeed: Send + Sync {
    /// Full `data` array of `/{region}/{item}.json`, newest first as sent.
    async fn fetch_series(&self, region: Region, item: &str) -> Result<Vec<FeedRecord>, FetchError>;

    async fn fetch_latest_snapshot(&self) -> Result<LatestSnapshot, FetchError>;

    async fn fetch_catalog(&self) -> Result<GoodsCatalog, FetchError>;

    /// Element 0 of the series is treated as the latest observation.
    async fn fetch_latest_item(&self, region: Region, item: &str) -> Result<Option<FeedRecord>, FetchError> {
        Ok(self.fetch_series(region, item).await?.into_iter().next())
    }

    async fn fetch_item_history(&self, region: Region, item: &str) -> Result<Vec<FeedRecord>, FetchError> {
        self.fetch_series(region, item).await
    }
}
