use crate::domain::message::NormalizedMessage;
use crate::domain::tables::{Client, Customer, Message, Tables};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Descriptive statistics for one numeric column. Missing values are skipped.
///
/// `std` is the sample standard deviation; quartiles interpolate linearly between ranks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub p25: Option<f64>,
    #[serde(rename = "50%")]
    pub p50: Option<f64>,
    #[serde(rename = "75%")]
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Table name → column name → summary.
pub type SummaryReport = BTreeMap<String, BTreeMap<String, ColumnSummary>>;

type Column<T> = (&'static str, fn(&T) -> Option<f64>);

fn flag(v: bool) -> Option<f64> {
    Some(if v { 1.0 } else { 0.0 })
}

pub fn describe(values: impl IntoIterator<Item = Option<f64>>) -> ColumnSummary {
    let mut sorted: Vec<f64> = values.into_iter().flatten().filter(|v| v.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let mean = (n > 0).then(|| sorted.iter().sum::<f64>() / n as f64);
    let std = mean.filter(|_| n > 1).map(|m| {
        let ss: f64 = sorted.iter().map(|v| (v - m).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    });

    ColumnSummary {
        count: n,
        mean,
        std,
        min: sorted.first().copied(),
        p25: quantile(&sorted, 0.25),
        p50: quantile(&sorted, 0.5),
        p75: quantile(&sorted, 0.75),
        max: sorted.last().copied(),
    }
}

fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let pos = q * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

fn summarize<T>(rows: &[T], columns: &[Column<T>]) -> BTreeMap<String, ColumnSummary> {
    columns
        .iter()
        .map(|(name, value_of)| (name.to_string(), describe(rows.iter().map(value_of))))
        .collect()
}

/// Numeric summaries of the raw tables and of the normalized messages.
pub fn summary_report(tables: &Tables, messages: &[NormalizedMessage]) -> SummaryReport {
    let clients: [Column<Client>; 1] = [("id", |c| Some(c.id as f64))];
    let customers: [Column<Customer>; 3] = [
        ("id", |c| Some(c.id as f64)),
        ("client_id", |c| c.client_id.map(|v| v as f64)),
        ("age", |c| c.age.map(f64::from)),
    ];
    let raw_messages: [Column<Message>; 4] = [
        ("id", |m| Some(m.id as f64)),
        ("customer_id", |m| Some(m.customer_id as f64)),
        ("clicked", |m| flag(m.clicked)),
        ("converted", |m| flag(m.converted)),
    ];
    let normalized: [Column<NormalizedMessage>; 10] = [
        ("messageSentAtYear", |m| Some(f64::from(m.year))),
        ("messageSentAtMonth", |m| Some(f64::from(m.month))),
        ("messageSentAtDay", |m| Some(f64::from(m.day))),
        ("messageSentAtHour", |m| Some(f64::from(m.hour))),
        ("messageSentAtMinute", |m| Some(f64::from(m.minute))),
        ("messageSentAtSecond", |m| Some(f64::from(m.second))),
        ("messageSentAtMicrosecond", |m| Some(f64::from(m.microsecond))),
        ("customerCreatedToMessageSentDays", |m| {
            m.days_since_customer_created.map(|d| d as f64)
        }),
        ("messageClicked", |m| flag(m.clicked)),
        ("messageConverted", |m| flag(m.converted)),
    ];

    let mut out = BTreeMap::new();
    out.insert("rawClients".to_string(), summarize(&tables.clients, &clients));
    out.insert("rawCustomers".to_string(), summarize(&tables.customers, &customers));
    out.insert("rawMessages".to_string(), summarize(&tables.messages, &raw_messages));
    out.insert("messagesWithSentDateTime".to_string(), summarize(messages, &normalized));
    out
}
