// Writes one JSON payload per item for the static price pages
use crate::aggregator::SeriesAggregator;
use crate::analysis::prompt::{build_prompt, gather_prompt_inputs};
use crate::analysis::{AnalysisCache, TextGenerator};
use crate::catalog::CatalogItem;
use crate::feed::PriceFeed;
use crate::model::{Analysis, GenerationError, ItemPriceData, Region};
use crate::utils::slugify;
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::{info, warn};

pub const ANALYSIS_PLACEHOLDER: &str = "Market analysis is currently unavailable.";

/// Chart legend entry.
#[derive(Debug, Serialize)]
pub struct RegionLegend {
    pub key: Region,
    pub name: &'static str,
    pub color: &'static str,
}

impl RegionLegend {
    fn all() -> Vec<RegionLegend> {
        Region::ALL
            .iter()
            .map(|&region| RegionLegend {
                key: region,
                name: region.display_name(),
                color: region.color(),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPage<'a> {
    pub item: &'a str,
    pub name: &'a str,
    pub unit: Option<&'a str>,
    pub last_updated: Option<&'a str>,
    pub regions: Vec<RegionLegend>,
    #[serde(flatten)]
    pub data: ItemPriceData,
    pub analysis: Option<Analysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_message: Option<&'static str>,
}

pub struct Publisher {
    feed: Arc<dyn PriceFeed>,
    aggregator: SeriesAggregator,
    cache: AnalysisCache,
    generator: Option<Arc<dyn TextGenerator>>,
    output_dir: PathBuf,
}

impl Publisher {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        cache: AnalysisCache,
        generator: Option<Arc<dyn TextGenerator>>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            aggregator: SeriesAggregator::new(feed.clone()),
            feed,
            cache,
            generator,
            output_dir: output_dir.into(),
        }
    }

    /// Publishes all items concurrently; returns how many files were written.
    pub async fn publish_all(&self, items: &[CatalogItem], last_updated: Option<&str>) -> usize {
        let results = join_all(items.iter().map(|item| self.publish_item(item, last_updated))).await;

        let mut written = 0;
        for (item, result) in items.iter().zip(results) {
            match result {
                Ok(path) => {
                    written += 1;
                    info!("✅ {} -> {}", item.data_key, path.display());
                }
                Err(e) => warn!("❌ Failed to write page data for {}: {}", item.data_key, e),
            }
        }
        written
    }

    pub async fn publish_item(&self, item: &CatalogItem, last_updated: Option<&str>) -> std::io::Result<PathBuf> {
        let data = self.aggregator.aggregate(&item.data_key).await;
        if data.is_unavailable() {
            warn!("No price data available for {}", item.data_key);
        }

        let analysis = self.analysis_for(item).await;
        let analysis_message = match (&self.generator, &analysis) {
            (Some(_), None) => Some(ANALYSIS_PLACEHOLDER),
            _ => None,
        };

        let page = ItemPage {
            item: &item.data_key,
            name: &item.name,
            unit: item.unit.as_deref(),
            last_updated,
            regions: RegionLegend::all(),
            data,
            analysis,
            analysis_message,
        };

        fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{}.json", slugify(&item.data_key)));
        fs::write(&path, serde_json::to_string_pretty(&page)?).await?;
        Ok(path)
    }

    /// `None` when analysis is disabled or could not be produced.
    async fn analysis_for(&self, item: &CatalogItem) -> Option<Analysis> {
        let generator = self.generator.as_deref()?;
        let feed = self.feed.as_ref();

        let prompt_builder = || async move {
            let inputs = gather_prompt_inputs(feed, &item.data_key).await;
            Ok::<_, GenerationError>(build_prompt(&item.name, &inputs))
        };

        match self.cache.get_or_create(&item.data_key, prompt_builder, generator).await {
            Ok(analysis) => Some(analysis),
            Err(e) => {
                warn!("Error generating analysis for {}: {}", item.name, e);
                None
            }
        }
    }
}
