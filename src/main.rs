mod aggregator;
mod analysis;
mod catalog;
mod config;
mod feed;
mod model;
mod publish;
mod utils;

use analysis::{AnalysisCache, PerplexityClient, TextGenerator};
use catalog::{items_with_prices, CatalogItem, GoodsCatalog, LatestSnapshot};
use config::{load_config, AppConfig};
use feed::{HttpFeed, PriceFeed};
use publish::Publisher;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt::init();

    std::panic::set_hook(Box::new(|panic_info| {
        error!("😱 Panic occurred: {}", panic_info);
    }));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config: AppConfig = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Config load error ({}): {}", config_path, e);
            return;
        }
    };

    let feed: Arc<dyn PriceFeed> = match HttpFeed::new(
        &config.feed_base_url,
        Duration::from_secs(config.request_timeout_seconds),
    ) {
        Ok(feed) => Arc::new(feed),
        Err(e) => {
            error!("Failed to initialize price feed client: {}", e);
            return;
        }
    };

    let generator = build_generator(&config);
    let cache = AnalysisCache::new(&config.cache_dir)
        .with_generation_timeout(Duration::from_secs(config.analysis.timeout_seconds));
    info!("Analysis cache at {}", cache.dir().display());

    let publisher = Publisher::new(feed.clone(), cache, generator, &config.output_dir);

    loop {
        info!("Starting publish run...");
        run_once(feed.as_ref(), &publisher, &config).await;

        let Some(interval) = config.refresh_interval_seconds else {
            break;
        };
        info!("Waiting {}s before the next run...", interval);
        sleep(Duration::from_secs(interval)).await;
    }
}

fn build_generator(config: &AppConfig) -> Option<Arc<dyn TextGenerator>> {
    if !config.analysis.enabled {
        info!("AI analysis disabled");
        return None;
    }

    match PerplexityClient::new(&config.analysis) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!("AI analysis disabled: {}", e);
            None
        }
    }
}

/// One pass over the selected items: snapshot, catalog, per-item pages.
async fn run_once(feed: &dyn PriceFeed, publisher: &Publisher, config: &AppConfig) {
    let snapshot = match feed.fetch_latest_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!("Failed to fetch latest snapshot: {}", e);
            LatestSnapshot::default()
        }
    };

    let catalog = match feed.fetch_catalog().await {
        Ok(catalog) if !catalog.is_empty() => catalog,
        Ok(_) => {
            warn!("Goods catalog is empty, using built-in items");
            GoodsCatalog::builtin()
        }
        Err(e) => {
            warn!("Failed to fetch goods catalog ({}), using built-in items", e);
            GoodsCatalog::builtin()
        }
    };

    log_latest_prices(&catalog, &snapshot);

    let items = select_items(&catalog, &config.items);
    info!("Items to publish: {}", items.len());

    let written = publisher
        .publish_all(&items, snapshot.metadata.last_updated.as_deref())
        .await;
    info!("Publish run finished: {}/{} items written", written, items.len());
}

fn select_items(catalog: &GoodsCatalog, wanted: &[String]) -> Vec<CatalogItem> {
    if wanted.is_empty() {
        return catalog.items().into_iter().cloned().collect();
    }

    wanted
        .iter()
        .map(|key| match catalog.find(key) {
            Some(item) => item.clone(),
            None => {
                warn!("'{}' is not in the goods catalog", key);
                CatalogItem::ad_hoc(key)
            }
        })
        .collect()
}

fn log_latest_prices(catalog: &GoodsCatalog, snapshot: &LatestSnapshot) {
    for group in catalog.category_slugs() {
        for (item, price) in items_with_prices(catalog, group, snapshot) {
            match price {
                Some(price) => info!("[{}] {}: ${:.2}", group, item.name, price),
                None => info!("[{}] {}: unavailable", group, item.name),
            }
        }
    }
}
