use anyhow::Context;
use cadence_core::domain::recommendation::RecommendationRun;
use cadence_core::domain::tables::Tables;
use cadence_core::domain::window::TimeWindow;
use cadence_core::engine::ratings::CustomerWindowRating;
use cadence_core::engine::PipelineOutput;
use cadence_core::report;
use cadence_core::time::timestamp::format_send_time;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const NULL_VALUES_FILE: &str = "nullValues.json";
pub const CUSTOMER_GROUPS_FILE: &str = "customerGroups.json";
pub const MESSAGE_GROUPS_FILE: &str = "messageGroups.json";
pub const MESSAGE_PROBABILITIES_FILE: &str = "messageProbabilities.json";
pub const MEAN_RATINGS_FILE: &str = "meanRatings.json";
pub const BEST_WINDOWS_FILE: &str = "bestMessageTimeWindows.json";
pub const SUMMARY_FILE: &str = "summaryStatistics.json";
pub const RUN_FILE: &str = "run.json";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MeanRatingCell {
    group_size: usize,
    mean_rating: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BestWindow {
    message_time_window: String,
    message_date_time: String,
}

fn mean_ratings_by_customer(
    ratings: &[CustomerWindowRating],
) -> BTreeMap<i64, BTreeMap<TimeWindow, MeanRatingCell>> {
    let mut out: BTreeMap<i64, BTreeMap<TimeWindow, MeanRatingCell>> = BTreeMap::new();
    for r in ratings {
        out.entry(r.customer_id).or_default().insert(
            r.time_window,
            MeanRatingCell {
                group_size: r.support,
                mean_rating: r.mean_rating,
            },
        );
    }
    out
}

/// customerId → ranked windows with their compliant send time.
fn best_windows_by_customer(run: &RecommendationRun) -> BTreeMap<i64, Vec<BestWindow>> {
    run.customers
        .iter()
        .map(|c| {
            let windows = c
                .items
                .iter()
                .map(|item| BestWindow {
                    message_time_window: item.time_window.label(),
                    message_date_time: format_send_time(item.send_at),
                })
                .collect();
            (c.customer_id, windows)
        })
        .collect()
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("failed to write {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(path)
}

/// Writes diagnostics and recommendations for one run into `dir`, creating it if needed.
pub fn write_all(dir: &Path, tables: &Tables, output: &PipelineOutput) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let written = vec![
        write_json(dir, NULL_VALUES_FILE, &report::null_report(tables))?,
        write_json(
            dir,
            SUMMARY_FILE,
            &report::summary_report(tables, &output.messages),
        )?,
        write_json(dir, CUSTOMER_GROUPS_FILE, &report::customer_groups(&output.profiles))?,
        write_json(dir, MESSAGE_GROUPS_FILE, &report::message_groups(&output.messages))?,
        write_json(
            dir,
            MESSAGE_PROBABILITIES_FILE,
            &report::engagement_report(&output.messages),
        )?,
        write_json(dir, MEAN_RATINGS_FILE, &mean_ratings_by_customer(&output.ratings))?,
        write_json(dir, BEST_WINDOWS_FILE, &best_windows_by_customer(&output.run))?,
        write_json(dir, RUN_FILE, &output.run)?,
    ];

    tracing::info!(dir = %dir.display(), files = written.len(), "wrote artifacts");
    Ok(written)
}
