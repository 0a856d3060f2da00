//! Biased matrix factorization over the customer × time-window rating matrix.
//!
//! A rating is estimated as `mu + b_customer + b_window + <p_customer, q_window>` and fitted
//! with plain SGD. Customers or windows that never appeared in training fall back to whatever
//! bias terms are known, which is what lets the model score cold cells.

use crate::domain::window::TimeWindow;
use crate::engine::ratings::CustomerWindowRating;
use crate::error::{EngineError, EngineResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingParams {
    pub factors: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub regularization: f64,
    pub init_std_dev: f64,
    pub seed: u64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            factors: 100,
            epochs: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            init_std_dev: 0.1,
            seed: 7,
        }
    }
}

impl TrainingParams {
    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |msg: String| Err(EngineError::InvalidConfiguration(msg));
        if self.factors == 0 {
            return invalid("factors must be >= 1".to_string());
        }
        if self.epochs == 0 {
            return invalid("epochs must be >= 1".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!("learning rate must be > 0 (got {})", self.learning_rate));
        }
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return invalid(format!("regularization must be >= 0 (got {})", self.regularization));
        }
        if !(self.init_std_dev.is_finite() && self.init_std_dev >= 0.0) {
            return invalid(format!("init std-dev must be >= 0 (got {})", self.init_std_dev));
        }
        Ok(())
    }
}

/// Rating observations split into a training part and a held-out part.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSplit {
    pub train: Vec<CustomerWindowRating>,
    pub test: Vec<CustomerWindowRating>,
}

/// Shuffles observations with `seed` and holds out `ceil((1 - train_fraction) * n)` of them.
///
/// The split is over cells, not customers: one customer can appear on both sides.
pub fn split_ratings(
    ratings: &[CustomerWindowRating],
    train_fraction: f64,
    seed: u64,
) -> EngineResult<RatingSplit> {
    if !(train_fraction > 0.0 && train_fraction <= 1.0) {
        return Err(EngineError::InvalidConfiguration(format!(
            "train fraction must be in (0, 1] (got {train_fraction})"
        )));
    }

    let n = ratings.len();
    // Small epsilon so 0.2 * 10 holds out 2, not 3, despite float error.
    let held_out = (((1.0 - train_fraction) * n as f64) - 1e-9).ceil().max(0.0) as usize;

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let test = order[..held_out].iter().map(|&i| ratings[i].clone()).collect();
    let train = order[held_out..].iter().map(|&i| ratings[i].clone()).collect();

    Ok(RatingSplit { train, test })
}

#[derive(Debug, Clone)]
pub struct LatentFactorModel {
    factors: usize,
    min_rating: f64,
    max_rating: f64,
    global_mean: f64,
    customers: HashMap<i64, usize>,
    window_index: HashMap<TimeWindow, usize>,
    windows: Vec<TimeWindow>,
    customer_bias: Vec<f64>,
    window_bias: Vec<f64>,
    customer_factors: Vec<f64>,
    window_factors: Vec<f64>,
}

impl LatentFactorModel {
    /// Fits the model on `train`. Estimates are clipped to `[min_rating, max_rating]`.
    pub fn train(
        train: &[CustomerWindowRating],
        (min_rating, max_rating): (f64, f64),
        params: &TrainingParams,
    ) -> EngineResult<Self> {
        params.validate()?;
        if train.is_empty() {
            return Err(EngineError::InsufficientData(
                "no rating observations left for training".to_string(),
            ));
        }
        if !(min_rating < max_rating) {
            return Err(EngineError::InvalidConfiguration(format!(
                "rating scale must be increasing (got {min_rating}..{max_rating})"
            )));
        }

        let mut customers: HashMap<i64, usize> = HashMap::new();
        let mut window_index: HashMap<TimeWindow, usize> = HashMap::new();
        let mut windows: Vec<TimeWindow> = Vec::new();
        let mut samples: Vec<(usize, usize, f64)> = Vec::with_capacity(train.len());

        for r in train {
            let next = customers.len();
            let u = *customers.entry(r.customer_id).or_insert(next);
            let i = *window_index.entry(r.time_window).or_insert_with(|| {
                windows.push(r.time_window);
                windows.len() - 1
            });
            samples.push((u, i, r.mean_rating));
        }

        let k = params.factors;
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
        let customer_factors = init_factors(&mut rng, customers.len() * k, params.init_std_dev)?;
        let window_factors = init_factors(&mut rng, windows.len() * k, params.init_std_dev)?;

        let global_mean = samples.iter().map(|s| s.2).sum::<f64>() / samples.len() as f64;

        let mut model = Self {
            factors: k,
            min_rating,
            max_rating,
            global_mean,
            customer_bias: vec![0.0; customers.len()],
            window_bias: vec![0.0; windows.len()],
            customers,
            window_index,
            windows,
            customer_factors,
            window_factors,
        };

        let lr = params.learning_rate;
        let reg = params.regularization;
        for epoch in 0..params.epochs {
            let mut squared_error = 0.0;
            for &(u, i, rating) in &samples {
                let err = rating - model.raw_estimate(u, i);
                squared_error += err * err;

                model.customer_bias[u] += lr * (err - reg * model.customer_bias[u]);
                model.window_bias[i] += lr * (err - reg * model.window_bias[i]);

                for f in 0..k {
                    let pu = model.customer_factors[u * k + f];
                    let qi = model.window_factors[i * k + f];
                    model.customer_factors[u * k + f] += lr * (err * qi - reg * pu);
                    model.window_factors[i * k + f] += lr * (err * pu - reg * qi);
                }
            }

            tracing::debug!(
                epoch,
                train_rmse = (squared_error / samples.len() as f64).sqrt(),
                "latent factor epoch"
            );
        }

        // Enumeration order for ranking ties is chronological.
        model.windows.sort();

        tracing::info!(
            customers = model.customers.len(),
            windows = model.windows.len(),
            observations = samples.len(),
            factors = k,
            epochs = params.epochs,
            global_mean = model.global_mean,
            "trained latent factor model"
        );
        Ok(model)
    }

    /// Windows seen during training, in chronological order.
    pub fn windows(&self) -> &[TimeWindow] {
        &self.windows
    }

    pub fn knows_customer(&self, customer_id: i64) -> bool {
        self.customers.contains_key(&customer_id)
    }

    pub fn global_mean(&self) -> f64 {
        self.global_mean
    }

    /// Estimated rating for any pair, bounded to the rating scale.
    pub fn predict(&self, customer_id: i64, window: &TimeWindow) -> f64 {
        let u = self.customers.get(&customer_id).copied();
        let i = self.window_index.get(window).copied();

        let estimate = match (u, i) {
            (Some(u), Some(i)) => self.raw_estimate(u, i),
            (Some(u), None) => self.global_mean + self.customer_bias[u],
            (None, Some(i)) => self.global_mean + self.window_bias[i],
            (None, None) => self.global_mean,
        };

        estimate.clamp(self.min_rating, self.max_rating)
    }

    /// Root-mean-square error of clipped predictions. `None` for an empty set.
    pub fn rmse(&self, ratings: &[CustomerWindowRating]) -> Option<f64> {
        if ratings.is_empty() {
            return None;
        }
        let sum: f64 = ratings
            .iter()
            .map(|r| {
                let err = r.mean_rating - self.predict(r.customer_id, &r.time_window);
                err * err
            })
            .sum();
        Some((sum / ratings.len() as f64).sqrt())
    }

    fn raw_estimate(&self, u: usize, i: usize) -> f64 {
        let k = self.factors;
        let p = &self.customer_factors[u * k..(u + 1) * k];
        let q = &self.window_factors[i * k..(i + 1) * k];
        let dot: f64 = p.iter().zip(q).map(|(a, b)| a * b).sum();
        self.global_mean + self.customer_bias[u] + self.window_bias[i] + dot
    }
}

fn init_factors(rng: &mut ChaCha8Rng, len: usize, std_dev: f64) -> EngineResult<Vec<f64>> {
    if std_dev == 0.0 {
        return Ok(vec![0.0; len]);
    }
    let normal = Normal::new(0.0, std_dev).map_err(|err| {
        EngineError::InvalidConfiguration(format!("init std-dev {std_dev}: {err}"))
    })?;
    Ok((0..len).map(|_| normal.sample(&mut *rng)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(customer_id: i64, window: &str, mean_rating: f64) -> CustomerWindowRating {
        CustomerWindowRating {
            customer_id,
            time_window: window.parse().unwrap(),
            mean_rating,
            support: 1,
        }
    }

    fn params() -> TrainingParams {
        TrainingParams {
            factors: 8,
            epochs: 200,
            learning_rate: 0.02,
            ..TrainingParams::default()
        }
    }

    fn matrix() -> Vec<CustomerWindowRating> {
        let mut out = Vec::new();
        // Customers 1..=6 love mornings, 7..=12 love afternoons.
        for c in 1..=12 {
            let morning = c <= 6;
            out.push(cell(c, "Monday_09", if morning { 5.0 } else { 1.0 }));
            out.push(cell(c, "Tuesday_15", if morning { 1.0 } else { 5.0 }));
            if c % 2 == 0 {
                out.push(cell(c, "Thursday_09", if morning { 5.0 } else { 1.0 }));
            }
            if c % 3 == 0 {
                out.push(cell(c, "Friday_16", if morning { 1.0 } else { 5.0 }));
            }
        }
        out
    }

    #[test]
    fn split_is_reproducible_and_sized() {
        let ratings = matrix();
        let a = split_ratings(&ratings, 0.8, 7).unwrap();
        let b = split_ratings(&ratings, 0.8, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.test.len(), (ratings.len() as f64 * 0.2).ceil() as usize);
        assert_eq!(a.train.len() + a.test.len(), ratings.len());

        let c = split_ratings(&ratings, 0.8, 8).unwrap();
        assert_ne!(a.test, c.test);
    }

    #[test]
    fn full_train_fraction_holds_nothing_out() {
        let ratings = matrix();
        let split = split_ratings(&ratings, 1.0, 7).unwrap();
        assert!(split.test.is_empty());
        assert_eq!(split.train, ratings);
    }

    #[test]
    fn rejects_empty_or_out_of_range_fraction() {
        for f in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                split_ratings(&matrix(), f, 7),
                Err(EngineError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn training_without_observations_fails() {
        assert!(matches!(
            LatentFactorModel::train(&[], (1.0, 5.0), &params()),
            Err(EngineError::InsufficientData(_))
        ));
    }

    #[test]
    fn predictions_are_bounded_and_deterministic() {
        let model = LatentFactorModel::train(&matrix(), (1.0, 5.0), &params()).unwrap();
        for c in 0..=14 {
            for w in model.windows() {
                let a = model.predict(c, w);
                assert!((1.0..=5.0).contains(&a));
                assert_eq!(a, model.predict(c, w));
            }
        }
    }

    #[test]
    fn same_seed_trains_the_same_model() {
        let a = LatentFactorModel::train(&matrix(), (1.0, 5.0), &params()).unwrap();
        let b = LatentFactorModel::train(&matrix(), (1.0, 5.0), &params()).unwrap();
        let w: TimeWindow = "Thursday_09".parse().unwrap();
        assert_eq!(a.predict(1, &w), b.predict(1, &w));
    }

    #[test]
    fn generalizes_to_cold_cells() {
        let model = LatentFactorModel::train(&matrix(), (1.0, 5.0), &params()).unwrap();
        let thursday: TimeWindow = "Thursday_09".parse().unwrap();
        let friday: TimeWindow = "Friday_16".parse().unwrap();

        // Customer 1 never saw Thursday_09 or Friday_16; morning peers liked the former.
        assert!(model.predict(1, &thursday) > model.predict(1, &friday));
        // Customer 7 is an afternoon customer with no Thursday or Friday history.
        assert!(model.predict(7, &friday) > model.predict(7, &thursday));
    }

    #[test]
    fn unknown_customers_fall_back_to_window_bias() {
        let model = LatentFactorModel::train(&matrix(), (1.0, 5.0), &params()).unwrap();
        assert!(!model.knows_customer(99));
        let w: TimeWindow = "Monday_09".parse().unwrap();
        let p = model.predict(99, &w);
        assert!((1.0..=5.0).contains(&p));

        let unseen: TimeWindow = "Wednesday_03".parse().unwrap();
        assert_eq!(model.predict(99, &unseen), model.global_mean().clamp(1.0, 5.0));
    }

    #[test]
    fn fits_training_data_better_than_the_mean() {
        let ratings = matrix();
        let model = LatentFactorModel::train(&ratings, (1.0, 5.0), &params()).unwrap();
        let fitted = model.rmse(&ratings).unwrap();
        let mean = model.global_mean();
        let baseline = (ratings.iter().map(|r| (r.mean_rating - mean).powi(2)).sum::<f64>()
            / ratings.len() as f64)
            .sqrt();
        assert!(fitted < baseline, "fitted={fitted} baseline={baseline}");
        assert_eq!(model.rmse(&[]), None);
    }

    #[test]
    fn factor_init_is_seeded_normal() {
        let draw = |seed| init_factors(&mut ChaCha8Rng::seed_from_u64(seed), 10_000, 0.1).unwrap();
        let a = draw(7);
        assert_eq!(a, draw(7));
        assert_ne!(a, draw(8));

        let mean = a.iter().sum::<f64>() / a.len() as f64;
        let std_dev = (a.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / a.len() as f64).sqrt();
        assert!(mean.abs() < 0.01, "mean {mean}");
        assert!((std_dev - 0.1).abs() < 0.01, "std-dev {std_dev}");
    }

    #[test]
    fn zero_std_dev_starts_from_zero_and_nan_is_rejected() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(init_factors(&mut rng, 3, 0.0).unwrap(), vec![0.0; 3]);
        assert!(matches!(
            init_factors(&mut rng, 3, f64::NAN),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn windows_are_chronological() {
        let model = LatentFactorModel::train(&matrix(), (1.0, 5.0), &params()).unwrap();
        let labels: Vec<String> = model.windows().iter().map(TimeWindow::label).collect();
        assert_eq!(labels, ["Monday_09", "Tuesday_15", "Thursday_09", "Friday_16"]);
    }
}
