use crate::feed::PriceFeed;
use crate::model::{FeedRecord, Region};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct RegionalLatest {
    pub region: Region,
    #[serde(flatten)]
    pub record: Option<FeedRecord>,
}

/// Feed data embedded in the analysis prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptInputs {
    pub national_latest: Option<FeedRecord>,
    pub national_history: Vec<FeedRecord>,
    pub regional: Vec<RegionalLatest>,
}

/// National latest + history and the latest record of every other region.
/// A failed fetch is logged and sent as missing data; the prompt is still built.
pub async fn gather_prompt_inputs(feed: &dyn PriceFeed, data_key: &str) -> PromptInputs {
    let national_latest = async {
        feed.fetch_latest_item(Region::National, data_key)
            .await
            .unwrap_or_else(|e| {
                warn!("National latest price for prompt unavailable ({}): {}", data_key, e);
                None
            })
    };
    let national_history = async {
        feed.fetch_item_history(Region::National, data_key)
            .await
            .unwrap_or_else(|e| {
                warn!("National history for prompt unavailable ({}): {}", data_key, e);
                Vec::new()
            })
    };
    let regional = futures::future::join_all(
        Region::ALL
            .iter()
            .filter(|&&r| r != Region::National)
            .map(|&region| async move {
                let record = match feed.fetch_latest_item(region, data_key).await {
                    Ok(record) => record,
                    Err(e) => {
                        warn!("Regional data for prompt unavailable ({}/{}): {}", region, data_key, e);
                        None
                    }
                };
                RegionalLatest { region, record }
            }),
    );

    let (national_latest, national_history, regional) = futures::join!(national_latest, national_history, regional);

    PromptInputs {
        national_latest,
        national_history,
        regional,
    }
}

pub fn build_prompt(name_of_good: &str, inputs: &PromptInputs) -> String {
    let latest = serde_json::to_string(&inputs.national_latest).unwrap_or_default();
    let history = serde_json::to_string(&inputs.national_history).unwrap_or_default();
    let regions = serde_json::to_string(&inputs.regional).unwrap_or_default();

    format!(
        r#"You are a data analyst specializing in commodity price analysis. Your task is to analyze price data for {name_of_good} and provide insights. Here's the data you'll be working with:

<latest_price_data>
{latest}
</latest_price_data>

<historical_data_points>
{history}
</historical_data_points>

<regional_variations>
{regions}
</regional_variations>

Analysis steps:
1. Price Trends:
   - Latest price and YoY change
   - Identify significant price movements and patterns
   - Compare with historical averages

2. External Factors Analysis:
   - Weather events affecting production/distribution
   - Policy changes (tariffs, regulations, subsidies)
   - Global trade dynamics
   - Supply chain disruptions
   - Labor market changes
   - Energy costs impact

3. Regional Analysis:
   - Price differences across regions
   - Region-specific factors (local policies, transportation, market competition)
   - Production vs consumption patterns by region

4. Output Format:
<analysis>
<market_overview>
[Current price state and major shifts]
</market_overview>

<key_drivers>
[Major factors affecting prices: weather, policy, supply chain, etc.]
</key_drivers>

<regional_insights>
[Geographic variations and local market conditions]
</regional_insights>

<outlook>
[Short-term price trajectory based on current factors]
</outlook>
</analysis>

Use specific data points and cite relevant external events affecting prices. Note any significant correlations between price changes and external factors.
Respond with Markdown format.
"#
    )
}
