pub mod domain;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod report;
pub mod storage;
pub mod time;

pub mod config {
    use crate::engine::model::TrainingParams;
    use crate::engine::ratings::validate_converted_rating;
    use crate::error::{EngineError, EngineResult};
    use serde::{Deserialize, Serialize};
    use std::path::PathBuf;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub database_url: Option<String>,
        pub sentry_dsn: Option<String>,
        pub input_dir: Option<String>,
        pub output_dir: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                database_url: std::env::var("DATABASE_URL").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                input_dir: std::env::var("CADENCE_INPUT_DIR").ok(),
                output_dir: std::env::var("CADENCE_OUTPUT_DIR").ok(),
            })
        }

        pub fn input_dir_or(&self, fallback: &str) -> PathBuf {
            PathBuf::from(self.input_dir.as_deref().unwrap_or(fallback))
        }

        pub fn output_dir_or(&self, fallback: &str) -> PathBuf {
            PathBuf::from(self.output_dir.as_deref().unwrap_or(fallback))
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct EngineConfig {
        /// Rating given to a converted message; the rating scale is `[1, converted_rating]`.
        pub converted_rating: u32,

        /// Recommendations kept per customer (K).
        pub per_customer: usize,

        /// Share of rating cells used for training; the rest is held out for RMSE.
        pub train_fraction: f64,

        pub training: TrainingParams,
    }

    impl Default for EngineConfig {
        fn default() -> Self {
            Self {
                converted_rating: 5,
                per_customer: 3,
                train_fraction: 0.8,
                training: TrainingParams::default(),
            }
        }
    }

    impl EngineConfig {
        pub fn from_env() -> Self {
            let mut out = Self::default();

            if let Some(n) = env_parse::<u32>("CADENCE_CONVERTED_RATING") {
                out.converted_rating = n;
            }
            if let Some(n) = env_parse::<usize>("CADENCE_PER_CUSTOMER") {
                out.per_customer = n;
            }
            if let Some(n) = env_parse::<f64>("CADENCE_TRAIN_FRACTION") {
                out.train_fraction = n;
            }
            if let Some(n) = env_parse::<u64>("CADENCE_SEED") {
                out.training.seed = n;
            }
            if let Some(n) = env_parse::<usize>("CADENCE_FACTORS") {
                out.training.factors = n;
            }
            if let Some(n) = env_parse::<usize>("CADENCE_EPOCHS") {
                out.training.epochs = n;
            }
            if let Some(n) = env_parse::<f64>("CADENCE_LEARNING_RATE") {
                out.training.learning_rate = n;
            }
            if let Some(n) = env_parse::<f64>("CADENCE_REGULARIZATION") {
                out.training.regularization = n;
            }

            out
        }

        pub fn validate(&self) -> EngineResult<()> {
            validate_converted_rating(self.converted_rating)?;
            if self.per_customer < 1 {
                return Err(EngineError::InvalidConfiguration(
                    "recommendations per customer must be >= 1".to_string(),
                ));
            }
            if !(self.train_fraction > 0.0 && self.train_fraction <= 1.0) {
                return Err(EngineError::InvalidConfiguration(format!(
                    "train fraction must be in (0, 1] (got {})",
                    self.train_fraction
                )));
            }
            self.training.validate()
        }
    }

    fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
        std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
    }

}
