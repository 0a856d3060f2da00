use crate::domain::window::TimeWindow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of one batch: ranked send times for every target customer that could be resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRun {
    pub run_id: uuid::Uuid,
    pub generated_at: DateTime<Utc>,
    pub week_start: NaiveDate,
    pub converted_rating: u32,
    pub per_customer: usize,
    pub train_fraction: f64,
    pub seed: u64,
    pub trained_ratings: usize,
    pub held_out_ratings: usize,
    pub rmse: Option<f64>,
    pub customers: Vec<CustomerRecommendations>,
    pub omissions: Vec<Omission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecommendations {
    pub customer_id: i64,
    pub country: String,
    pub items: Vec<RecommendationItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub rank: i32,
    pub time_window: TimeWindow,
    pub predicted_rating: f64,
    pub send_at: DateTime<Utc>,
}

/// A target customer left out of the run, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Omission {
    pub customer_id: i64,
    pub error: String,
}
