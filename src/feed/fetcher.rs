use crate::catalog::{GoodsCatalog, LatestSnapshot};
use crate::feed::traits::PriceFeed;
use crate::model::{FeedRecord, FeedSeries, FetchError, Region};

use reqwest::header::CACHE_CONTROL;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

pub struct HttpFeed {
    client: Client,
    base_url: String,
}

impl HttpFeed {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("PriceOfGoodsBot/0.1")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.build_url(path);
        debug!("GET {}", url);

        let response = self.client.get(&url)
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| FetchError::Decode { url, source })
    }
}

#[async_trait::async_trait]
impl PriceFeed for HttpFeed {
    async fn fetch_series(&self, region: Region, item: &str) -> Result<Vec<FeedRecord>, FetchError> {
        let series: FeedSeries = self.get_json(&format!("{}/{}.json", region.key(), item)).await?;
        Ok(series.data)
    }

    async fn fetch_latest_snapshot(&self) -> Result<LatestSnapshot, FetchError> {
        self.get_json("latest.json").await
    }

    async fn fetch_catalog(&self) -> Result<GoodsCatalog, FetchError> {
        self.get_json("goods.json").await
    }
}
