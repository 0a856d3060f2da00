use crate::domain::message::{CustomerProfile, NormalizedMessage};
use crate::domain::tables::{Client, Customer, Message};
use crate::domain::window::TimeWindow;
use crate::error::EngineResult;
use crate::time::timestamp::parse_utc;
use chrono::{Datelike, Duration, Timelike};
use std::collections::HashMap;

/// Left-joins customers to clients. Customers without a matching client keep `client: None`.
pub fn join_customers(customers: &[Customer], clients: &[Client]) -> EngineResult<Vec<CustomerProfile>> {
    let mut by_id: HashMap<i64, &Client> = HashMap::with_capacity(clients.len());
    for client in clients {
        by_id.entry(client.id).or_insert(client);
    }

    let mut out = Vec::with_capacity(customers.len());
    for customer in customers {
        let created_at = match customer.created_at.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_utc("created_at", raw)?),
            _ => None,
        };
        let client = customer
            .client_id
            .and_then(|id| by_id.get(&id))
            .map(|c| (*c).clone());

        out.push(CustomerProfile {
            customer: customer.clone(),
            created_at,
            client,
        });
    }

    Ok(out)
}

/// Left-joins messages to customer profiles and derives calendar fields and the time window.
///
/// A malformed `sent_at` fails the whole batch.
pub fn normalize_messages(
    messages: &[Message],
    profiles: &[CustomerProfile],
) -> EngineResult<Vec<NormalizedMessage>> {
    let mut by_id: HashMap<i64, &CustomerProfile> = HashMap::with_capacity(profiles.len());
    for profile in profiles {
        by_id.entry(profile.customer.id).or_insert(profile);
    }

    let mut out = Vec::with_capacity(messages.len());
    let mut unmatched: usize = 0;
    let mut negative_tenure: usize = 0;

    for message in messages {
        let sent_at = parse_utc("sent_at", &message.sent_at)?;
        let profile = by_id.get(&message.customer_id).copied();
        if profile.is_none() {
            unmatched += 1;
        }

        let days_since_customer_created = profile
            .and_then(|p| p.created_at)
            .map(|created| floor_days(sent_at - created));
        if matches!(days_since_customer_created, Some(d) if d < 0) {
            negative_tenure += 1;
        }

        out.push(NormalizedMessage {
            message_id: message.id,
            customer_id: message.customer_id,
            client_id: profile.and_then(|p| p.customer.client_id),
            customer_country: profile.and_then(|p| p.customer_country()).map(str::to_string),
            client_country: profile.and_then(|p| p.client_country()).map(str::to_string),
            sent_at,
            year: sent_at.year(),
            month: sent_at.month(),
            day: sent_at.day(),
            hour: sent_at.hour(),
            minute: sent_at.minute(),
            second: sent_at.second(),
            microsecond: sent_at.nanosecond() / 1_000,
            day_of_week: sent_at.weekday(),
            days_since_customer_created,
            time_window: TimeWindow::of(sent_at),
            clicked: message.clicked,
            converted: message.converted,
        });
    }

    if unmatched > 0 {
        tracing::warn!(unmatched, "messages without a matching customer");
    }
    if negative_tenure > 0 {
        tracing::warn!(negative_tenure, "messages sent before their customer was created");
    }
    tracing::info!(messages = out.len(), "normalized messages");

    Ok(out)
}

/// Whole days rounded toward negative infinity; `Duration::num_days` truncates toward zero.
fn floor_days(delta: Duration) -> i64 {
    let days = delta.num_days();
    if delta < Duration::days(days) {
        days - 1
    } else {
        days
    }
}
