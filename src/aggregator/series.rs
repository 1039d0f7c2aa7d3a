use crate::model::{FeedRecord, HistoryRow, MonthKey, Region};
use std::collections::HashMap;
use tracing::debug;

/// Number of trailing months kept for charts.
pub const HISTORY_WINDOW: usize = 24;

/// Merges per-region histories into one table: chronological, last
/// `HISTORY_WINDOW` months, every row carrying all five regions.
pub fn normalize_history(histories: &[(Region, Vec<FeedRecord>)]) -> Vec<HistoryRow> {
    let merged = merge_by_month(histories);
    let mut window = sort_and_window(merged);
    fill_missing_regions(&mut window);
    window
}

/// Upserts every valid entry into its month row. A repeated region+month overwrites.
pub fn merge_by_month(histories: &[(Region, Vec<FeedRecord>)]) -> HashMap<MonthKey, HistoryRow> {
    let mut rows: HashMap<MonthKey, HistoryRow> = HashMap::new();

    for (region, entries) in histories {
        for entry in entries {
            let Some((key, value)) = month_value(entry) else {
                continue;
            };
            rows.entry(key.clone())
                .or_insert_with(|| HistoryRow::new(key))
                .prices
                .insert(*region, value);
        }
    }

    rows
}

// Entries lacking year, period or value are skipped; an unparseable value counts as 0.
fn month_value(entry: &FeedRecord) -> Option<(MonthKey, f64)> {
    let year = entry.year.as_ref().filter(|y| y.is_truthy())?;
    let period = entry.period.as_deref().filter(|p| !p.is_empty())?;
    let value = entry.value.as_ref().filter(|v| v.is_truthy())?;

    let key = MonthKey::new(&year.as_text(), period);
    Some((key, value.as_f64().unwrap_or(0.0)))
}

pub fn sort_and_window(rows: HashMap<MonthKey, HistoryRow>) -> Vec<HistoryRow> {
    let mut dated: Vec<_> = rows
        .into_values()
        .filter_map(|row| match row.date.to_date() {
            Some(date) => Some((date, row)),
            None => {
                debug!("Skipping history row with non-calendar key {}", row.date);
                None
            }
        })
        .collect();

    dated.sort_by_key(|(date, _)| *date);

    let skip = dated.len().saturating_sub(HISTORY_WINDOW);
    dated.into_iter().skip(skip).map(|(_, row)| row).collect()
}

pub fn fill_missing_regions(rows: &mut [HistoryRow]) {
    for row in rows.iter_mut() {
        for region in Region::ALL {
            row.prices.entry(region).or_insert(0.0);
        }
    }
}
