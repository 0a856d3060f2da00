use crate::domain::tables::{Client, Customer};
use crate::domain::window::{day_name, TimeWindow};
use chrono::{DateTime, Utc, Weekday};

/// A customer left-joined to its client, with `created_at` parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerProfile {
    pub customer: Customer,
    pub created_at: Option<DateTime<Utc>>,
    pub client: Option<Client>,
}

impl CustomerProfile {
    pub fn customer_country(&self) -> Option<&str> {
        non_blank(self.customer.country.as_deref())
    }

    pub fn client_country(&self) -> Option<&str> {
        non_blank(self.client.as_ref().and_then(|c| c.country.as_deref()))
    }

    pub fn client_product_type(&self) -> Option<&str> {
        non_blank(self.client.as_ref().and_then(|c| c.product_type.as_deref()))
    }
}

/// A message joined to its customer and client, with calendar fields derived from `sent_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub message_id: i64,
    pub customer_id: i64,
    pub client_id: Option<i64>,
    pub customer_country: Option<String>,
    pub client_country: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub microsecond: u32,
    pub day_of_week: Weekday,
    /// Signed floor of whole days from customer creation to send. Negative values are kept.
    pub days_since_customer_created: Option<i64>,
    pub time_window: TimeWindow,
    pub clicked: bool,
    pub converted: bool,
}

impl NormalizedMessage {
    pub fn day_of_week_name(&self) -> &'static str {
        day_name(self.day_of_week)
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
