use crate::domain::message::NormalizedMessage;
use crate::domain::window::TimeWindow;
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mean implicit rating for one (customer, time window) cell, with the number of messages behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerWindowRating {
    pub customer_id: i64,
    pub time_window: TimeWindow,
    pub mean_rating: f64,
    pub support: usize,
}

pub fn validate_converted_rating(converted_rating: u32) -> EngineResult<()> {
    if converted_rating < 2 {
        return Err(EngineError::InvalidConfiguration(format!(
            "converted rating must be >= 2 (got {converted_rating})"
        )));
    }
    Ok(())
}

/// 0 for no engagement, 1 for a click, `R` for a conversion.
///
/// Equals `clicked + (R - 1) * converted` whenever a conversion was also clicked. A conversion
/// recorded without a click still rates `R`, so the result is always one of `{0, 1, R}`.
pub fn implicit_rating(clicked: bool, converted: bool, converted_rating: u32) -> f64 {
    if converted {
        f64::from(converted_rating)
    } else if clicked {
        1.0
    } else {
        0.0
    }
}

/// Groups messages by (customer, window) and averages their implicit ratings.
///
/// Output is ordered by customer id, then chronologically by window.
pub fn mean_ratings(
    messages: &[NormalizedMessage],
    converted_rating: u32,
) -> EngineResult<Vec<CustomerWindowRating>> {
    validate_converted_rating(converted_rating)?;

    let mut groups: BTreeMap<(i64, TimeWindow), (f64, usize)> = BTreeMap::new();
    for m in messages {
        let rating = implicit_rating(m.clicked, m.converted, converted_rating);
        let entry = groups.entry((m.customer_id, m.time_window)).or_insert((0.0, 0));
        entry.0 += rating;
        entry.1 += 1;
    }

    let out: Vec<CustomerWindowRating> = groups
        .into_iter()
        .map(|((customer_id, time_window), (sum, support))| CustomerWindowRating {
            customer_id,
            time_window,
            mean_rating: sum / support as f64,
            support,
        })
        .collect();

    tracing::info!(
        cells = out.len(),
        messages = messages.len(),
        converted_rating,
        "aggregated customer window ratings"
    );
    Ok(out)
}

/// Distinct windows across all rating cells, in chronological order.
pub fn distinct_windows(ratings: &[CustomerWindowRating]) -> Vec<TimeWindow> {
    let mut windows: Vec<TimeWindow> = ratings.iter().map(|r| r.time_window).collect();
    windows.sort();
    windows.dedup();
    windows
}
