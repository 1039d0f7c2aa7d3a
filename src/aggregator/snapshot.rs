use crate::model::{CurrentPriceSnapshot, FeedRecord, FeedValue};
use std::collections::BTreeMap;

// Month-over-month entry of the feed's calculations block.
const ONE_MONTH: &str = "1";

/// Builds the current-price card for a region from its latest record.
/// No record at all gives the default snapshot: `current` 0 and every other field `None`.
pub fn build_snapshot(record: Option<&FeedRecord>) -> CurrentPriceSnapshot {
    let Some(record) = record else {
        return CurrentPriceSnapshot::default();
    };

    let calculations = record.calculations.as_ref();

    CurrentPriceSnapshot {
        current: record.value.as_ref().and_then(FeedValue::as_f64).unwrap_or(0.0),
        price_change: calculations.and_then(|c| change_field(&c.net_changes)),
        percent_change: calculations.and_then(|c| change_field(&c.pct_changes)),
        latest_date: latest_date(record),
    }
}

/// A change only counts when it is truthy: absent, empty and zero all read as unknown (`None`).
fn change_field(changes: &BTreeMap<String, Option<FeedValue>>) -> Option<f64> {
    changes
        .get(ONE_MONTH)?
        .as_ref()?
        .as_f64()
        .filter(|v| *v != 0.0)
}

fn latest_date(record: &FeedRecord) -> Option<String> {
    let period_name = record.period_name.as_deref().filter(|s| !s.is_empty())?;
    let year = record.year.as_ref().filter(|y| y.is_truthy())?;
    Some(format!("{} {}", period_name, year.as_text()))
}
