pub mod assemble;
pub mod model;
pub mod normalize;
pub mod ratings;

use crate::config::EngineConfig;
use crate::domain::message::{CustomerProfile, NormalizedMessage};
use crate::domain::recommendation::RecommendationRun;
use crate::domain::tables::Tables;
use crate::error::EngineResult;
use crate::time::compliance::ComplianceCalendar;
use model::{split_ratings, LatentFactorModel};
use ratings::CustomerWindowRating;

/// Everything one batch produced, intermediates included for reporting.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub profiles: Vec<CustomerProfile>,
    pub messages: Vec<NormalizedMessage>,
    pub ratings: Vec<CustomerWindowRating>,
    pub run: RecommendationRun,
}

/// Normalize → rate → split and train → assemble, for one snapshot of the tables.
pub fn run_pipeline(
    tables: &Tables,
    target_ids: &[i64],
    config: &EngineConfig,
    calendar: &ComplianceCalendar,
) -> EngineResult<PipelineOutput> {
    config.validate()?;

    let profiles = normalize::join_customers(&tables.customers, &tables.clients)?;
    let messages = normalize::normalize_messages(&tables.messages, &profiles)?;
    let ratings = ratings::mean_ratings(&messages, config.converted_rating)?;

    let split = split_ratings(&ratings, config.train_fraction, config.training.seed)?;
    let scale = (1.0, f64::from(config.converted_rating));
    let model = LatentFactorModel::train(&split.train, scale, &config.training)?;

    let observed_windows = ratings::distinct_windows(&ratings).len();
    if model.windows().len() < observed_windows {
        tracing::info!(
            observed_windows,
            trained_windows = model.windows().len(),
            "some windows appear only in held-out cells and will not be recommended"
        );
    }

    let rmse = model.rmse(&split.test);
    match rmse {
        Some(rmse) => tracing::info!(rmse, held_out = split.test.len(), "held-out RMSE"),
        None => tracing::info!("no held-out ratings; RMSE not computed"),
    }

    let targets = assemble::target_customers(target_ids, &profiles);
    let assembly = assemble::assemble(&model, &targets, calendar, config.per_customer)?;

    let run = RecommendationRun {
        run_id: uuid::Uuid::new_v4(),
        generated_at: chrono::Utc::now(),
        week_start: calendar.week_start(),
        converted_rating: config.converted_rating,
        per_customer: config.per_customer,
        train_fraction: config.train_fraction,
        seed: config.training.seed,
        trained_ratings: split.train.len(),
        held_out_ratings: split.test.len(),
        rmse,
        customers: assembly.recommendations,
        omissions: assembly.omissions,
    };

    Ok(PipelineOutput {
        profiles,
        messages,
        ratings,
        run,
    })
}
