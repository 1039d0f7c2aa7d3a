// Aggregator module: five-region price snapshots and the merged history table.

pub mod series;
pub mod snapshot;

use crate::feed::PriceFeed;
use crate::model::{FeedRecord, ItemPriceData, Region};
use futures::future::join_all;
use futures::FutureExt;
use series::normalize_history;
use snapshot::build_snapshot;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct SeriesAggregator {
    feed: Arc<dyn PriceFeed>,
}

impl SeriesAggregator {
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self { feed }
    }

    /// Current prices and trailing history for an item across all regions.
    ///
    /// Never fails: a region whose fetch errors or panics falls back to its default, and
    /// an unexpected failure anywhere else yields `ItemPriceData::unavailable()`.
    pub async fn aggregate(&self, item_key: &str) -> ItemPriceData {
        match AssertUnwindSafe(self.collect(item_key)).catch_unwind().await {
            Ok(data) => data,
            Err(_) => {
                error!("Error processing item data for '{}', serving defaults", item_key);
                ItemPriceData::unavailable()
            }
        }
    }

    async fn collect(&self, item_key: &str) -> ItemPriceData {
        let latest = join_all(Region::ALL.iter().map(|&region| self.latest_for(region, item_key)));
        let history = join_all(Region::ALL.iter().map(|&region| self.history_for(region, item_key)));
        let (latest, histories) = futures::join!(latest, history);

        let current_prices = latest
            .into_iter()
            .map(|(region, record)| (region, build_snapshot(record.as_ref())))
            .collect();

        let history = normalize_history(&histories);
        info!("Aggregated '{}': {} history rows", item_key, history.len());

        ItemPriceData { current_prices, history }
    }

    async fn latest_for(&self, region: Region, item_key: &str) -> (Region, Option<FeedRecord>) {
        let fetch = AssertUnwindSafe(self.feed.fetch_latest_item(region, item_key)).catch_unwind();
        match fetch.await {
            Ok(Ok(Some(record))) => (region, Some(record)),
            Ok(Ok(None)) => {
                warn!("No current price data for {}/{}", region, item_key);
                (region, None)
            }
            Ok(Err(e)) => {
                warn!("Error fetching current price for {}/{}: {}", region, item_key, e);
                (region, None)
            }
            Err(_) => {
                error!("Current price fetch for {}/{} panicked", region, item_key);
                (region, None)
            }
        }
    }

    async fn history_for(&self, region: Region, item_key: &str) -> (Region, Vec<FeedRecord>) {
        let fetch = AssertUnwindSafe(self.feed.fetch_item_history(region, item_key)).catch_unwind();
        match fetch.await {
            Ok(Ok(records)) => (region, records),
            Ok(Err(e)) => {
                warn!("Error fetching history for {}/{}: {}", region, item_key, e);
                (region, Vec::new())
            }
            Err(_) => {
                error!("History fetch for {}/{} panicked", region, item_key);
                (region, Vec::new())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::catalog::{GoodsCatalog, LatestSnapshot};
    use crate::model::{Calculations, CurrentPriceSnapshot, FeedValue, FetchError};
    use std::collections::HashMap;

    /// In-memory feed keyed by `(region, item)`; anything missing answers 404.
    #[derive(Default)]
    pub struct MockFeed {
        pub series: HashMap<(Region, String), Vec<FeedRecord>>,
        pub panic_on: Option<Region>,
    }

    impl MockFeed {
        pub fn with(mut self, region: Region, item: &str, records: Vec<FeedRecord>) -> Self {
            self.series.insert((region, item.to_string()), records);
            self
        }
    }

    #[async_trait::async_trait]
    impl PriceFeed for MockFeed {
        async fn fetch_series(&self, region: Region, item: &str) -> Result<Vec<FeedRecord>, FetchError> {
            if self.panic_on == Some(region) {
                panic!("feed exploded for {}", region);
            }
            self.series
                .get(&(region, item.to_string()))
                .cloned()
                .ok_or_else(|| FetchError::Status {
                    status: 404,
                    url: format!("mock://{}/{}.json", region, item),
                })
        }

        async fn fetch_latest_snapshot(&self) -> Result<LatestSnapshot, FetchError> {
            Ok(LatestSnapshot::default())
        }

        async fn fetch_catalog(&self) -> Result<GoodsCatalog, FetchError> {
            Ok(GoodsCatalog::builtin())
        }
    }

    pub fn point(year: i32, period: &str, value: &str) -> FeedRecord {
        FeedRecord {
            year: Some(FeedValue::Number(year as f64)),
            period: Some(period.to_string()),
            value: Some(FeedValue::Text(value.to_string())),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn eggs_national_only() {
        let feed = MockFeed::default()
            .with(
                Region::National,
                "eggs",
                vec![point(2024, "M09", "3.50"), point(2024, "M10", "3.60"), point(2024, "M11", "3.40")],
            )
            .with(Region::Northeast, "eggs", vec![])
            .with(Region::Midwest, "eggs", vec![])
            .with(Region::South, "eggs", vec![])
            .with(Region::West, "eggs", vec![]);
        let aggregator = SeriesAggregator::new(Arc::new(feed));

        let data = aggregator.aggregate("eggs").await;

        let dates: Vec<_> = data.history.iter().map(|r| r.date.as_str()).collect();
        assert_eq!(dates, ["2024-09", "2024-10", "2024-11"]);
        let national: Vec<_> = data.history.iter().filter_map(|r| r.price(Region::National)).collect();
        assert_eq!(national, [3.5, 3.6, 3.4]);
        for row in &data.history {
            for region in [Region::Northeast, Region::Midwest, Region::South, Region::West] {
                assert_eq!(row.price(region), Some(0.0));
            }
        }
        assert_eq!(data.current_prices[&Region::National].current, 3.5);
        assert_eq!(data.current_prices[&Region::West].current, 0.0);
    }

    #[tokio::test]
    async fn failing_region_is_isolated() {
        let mut latest = point(2024, "M11", "4.20");
        latest.period_name = Some("November".into());
        let mut calculations = Calculations::default();
        calculations.net_changes.insert("1".into(), Some(FeedValue::Text("0.30".into())));
        latest.calculations = Some(calculations);

        // No entry for the south region: its fetches fail with 404.
        let feed = MockFeed::default()
            .with(Region::National, "milk", vec![latest.clone()])
            .with(Region::Northeast, "milk", vec![latest.clone()])
            .with(Region::Midwest, "milk", vec![latest.clone()])
            .with(Region::West, "milk", vec![latest]);
        let aggregator = SeriesAggregator::new(Arc::new(feed));

        let data = aggregator.aggregate("milk").await;

        assert_eq!(data.current_prices.len(), 5);
        assert_eq!(data.current_prices[&Region::South], CurrentPriceSnapshot::default());
        let west = &data.current_prices[&Region::West];
        assert_eq!(west.current, 4.2);
        assert_eq!(west.price_change, Some(0.3));
        assert_eq!(west.latest_date.as_deref(), Some("November 2024"));
        assert_eq!(data.history.len(), 1);
        assert_eq!(data.history[0].price(Region::South), Some(0.0));
    }

    #[tokio::test]
    async fn unknown_item_yields_defaults() {
        let aggregator = SeriesAggregator::new(Arc::new(MockFeed::default()));
        let data = aggregator.aggregate("unobtainium").await;
        assert!(data.is_unavailable());
        assert_eq!(data, ItemPriceData::unavailable());
    }

    #[tokio::test]
    async fn panicking_region_is_isolated() {
        let feed = MockFeed {
            panic_on: Some(Region::Midwest),
            ..Default::default()
        }
        .with(Region::National, "gas", vec![point(2024, "M01", "3.10")]);
        let aggregator = SeriesAggregator::new(Arc::new(feed));

        let data = aggregator.aggregate("gas").await;

        assert_eq!(data.current_prices.len(), 5);
        assert_eq!(data.current_prices[&Region::National].current, 3.1);
        assert_eq!(data.current_prices[&Region::Midwest], CurrentPriceSnapshot::default());
        assert_eq!(data.history.len(), 1);
        assert_eq!(data.history[0].price(Region::National), Some(3.1));
        assert_eq!(data.history[0].price(Region::Midwest), Some(0.0));
    }
}
