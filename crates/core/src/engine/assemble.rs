use crate::domain::message::CustomerProfile;
use crate::domain::recommendation::{CustomerRecommendations, Omission, RecommendationItem};
use crate::domain::window::TimeWindow;
use crate::engine::model::LatentFactorModel;
use crate::error::{EngineError, EngineResult};
use crate::time::compliance::{resolve_country, ComplianceCalendar};
use rayon::prelude::*;
use std::collections::HashMap;

/// A customer to recommend for, with the countries needed for compliance mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetCustomer {
    pub customer_id: i64,
    pub customer_country: Option<String>,
    pub client_country: Option<String>,
}

/// Looks up each target id among the profiles. Unknown ids are kept without countries.
pub fn target_customers(ids: &[i64], profiles: &[CustomerProfile]) -> Vec<TargetCustomer> {
    let by_id: HashMap<i64, &CustomerProfile> =
        profiles.iter().rev().map(|p| (p.customer.id, p)).collect();

    ids.iter()
        .map(|&customer_id| {
            let profile = by_id.get(&customer_id);
            TargetCustomer {
                customer_id,
                customer_country: profile.and_then(|p| p.customer_country()).map(str::to_string),
                client_country: profile.and_then(|p| p.client_country()).map(str::to_string),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assembly {
    pub recommendations: Vec<CustomerRecommendations>,
    pub omissions: Vec<Omission>,
}

/// Scores every training window for one customer, best first. Ties keep chronological order.
pub fn rank_windows(model: &LatentFactorModel, customer_id: i64) -> Vec<(TimeWindow, f64)> {
    let mut scored: Vec<(TimeWindow, f64)> = model
        .windows()
        .iter()
        .map(|w| (*w, model.predict(customer_id, w)))
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Top-`per_customer` windows for each target, resolved to compliant send times.
///
/// If any of a customer's top windows cannot be resolved (weekend window, unknown or missing
/// country) the whole customer is omitted and the reason recorded; other customers are unaffected.
pub fn assemble(
    model: &LatentFactorModel,
    targets: &[TargetCustomer],
    calendar: &ComplianceCalendar,
    per_customer: usize,
) -> EngineResult<Assembly> {
    if per_customer < 1 {
        return Err(EngineError::InvalidConfiguration(
            "recommendations per customer must be >= 1".to_string(),
        ));
    }

    let results: Vec<Result<CustomerRecommendations, Omission>> = targets
        .par_iter()
        .map(|target| {
            recommend_for(model, target, calendar, per_customer).map_err(|err| Omission {
                customer_id: target.customer_id,
                error: err.to_string(),
            })
        })
        .collect();

    let mut out = Assembly::default();
    for result in results {
        match result {
            Ok(recs) => out.recommendations.push(recs),
            Err(omission) => {
                tracing::warn!(
                    customer_id = omission.customer_id,
                    error = %omission.error,
                    "customer omitted from recommendations"
                );
                out.omissions.push(omission);
            }
        }
    }

    tracing::info!(
        customers = out.recommendations.len(),
        omitted = out.omissions.len(),
        per_customer,
        windows = model.windows().len(),
        "assembled recommendations"
    );
    Ok(out)
}

fn recommend_for(
    model: &LatentFactorModel,
    target: &TargetCustomer,
    calendar: &ComplianceCalendar,
    per_customer: usize,
) -> EngineResult<CustomerRecommendations> {
    let country = resolve_country(
        target.customer_id,
        target.customer_country.as_deref(),
        target.client_country.as_deref(),
    )?;

    if !model.knows_customer(target.customer_id) {
        tracing::debug!(
            customer_id = target.customer_id,
            "no training history; ranking by window bias only"
        );
    }

    let items = rank_windows(model, target.customer_id)
        .into_iter()
        .take(per_customer)
        .enumerate()
        .map(|(idx, (time_window, predicted_rating))| {
            Ok(RecommendationItem {
                rank: idx as i32 + 1,
                time_window,
                predicted_rating,
                send_at: calendar.resolve(&time_window, country)?,
            })
        })
        .collect::<EngineResult<Vec<_>>>()?;

    Ok(CustomerRecommendations {
        customer_id: target.customer_id,
        country: country.to_string(),
        items,
    })
}
