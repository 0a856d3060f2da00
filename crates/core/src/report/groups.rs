use crate::domain::message::{non_blank, CustomerProfile, NormalizedMessage};
use std::collections::BTreeMap;

/// Attribute name → distinct value → count. Missing values are not counted.
pub type GroupCounts = BTreeMap<String, BTreeMap<String, usize>>;

type Attribute<T> = (&'static str, fn(&T) -> Option<String>);

fn count<T>(rows: &[T], attributes: &[Attribute<T>]) -> GroupCounts {
    attributes
        .iter()
        .map(|(name, value_of)| {
            let mut counts: BTreeMap<String, usize> = BTreeMap::new();
            for row in rows {
                if let Some(value) = value_of(row) {
                    *counts.entry(value).or_insert(0) += 1;
                }
            }
            (name.to_string(), counts)
        })
        .collect()
}

/// Customers (joined to clients) counted by demographic and client attributes.
pub fn customer_groups(profiles: &[CustomerProfile]) -> GroupCounts {
    let attributes: [Attribute<CustomerProfile>; 5] = [
        ("customerGender", |p| non_blank(p.customer.gender.as_deref()).map(str::to_string)),
        ("customerCountry", |p| p.customer_country().map(str::to_string)),
        ("customerAge", |p| p.customer.age.map(|a| a.to_string())),
        ("clientProductType", |p| p.client_product_type().map(str::to_string)),
        ("clientCountry", |p| p.client_country().map(str::to_string)),
    ];
    count(profiles, &attributes)
}

/// Messages counted by send-date parts and engagement flags.
pub fn message_groups(messages: &[NormalizedMessage]) -> GroupCounts {
    let attributes: [Attribute<NormalizedMessage>; 6] = [
        ("messageSentAtYear", |m| Some(m.year.to_string())),
        ("messageSentAtMonth", |m| Some(m.month.to_string())),
        ("messageSentAtDay", |m| Some(m.day.to_string())),
        ("messageSentAtHour", |m| Some(m.hour.to_string())),
        ("messageClicked", |m| Some(m.clicked.to_string())),
        ("messageConverted", |m| Some(m.converted.to_string())),
    ];
    count(messages, &attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tables::{Client, Customer};

    fn profile(id: i64, gender: Option<&str>, country: Option<&str>, client_country: &str) -> CustomerProfile {
        CustomerProfile {
            customer: Customer {
                id,
                gender: gender.map(str::to_string),
                client_id: Some(1),
                country: country.map(str::to_string),
                age: Some(30),
                created_at: None,
            },
            created_at: None,
            client: Some(Client {
                id: 1,
                name: None,
                product_type: Some("retail".to_string()),
                country: Some(client_country.to_string()),
            }),
        }
    }

    #[test]
    fn counts_distinct_values_and_skips_missing() {
        let profiles = vec![
            profile(1, Some("F"), Some("UK"), "UK"),
            profile(2, Some("M"), None, "UK"),
            profile(3, Some("F"), Some("NZ"), "CA"),
            profile(4, None, Some("NZ"), "CA"),
        ];
        let groups = customer_groups(&profiles);

        assert_eq!(groups["customerGender"]["F"], 2);
        assert_eq!(groups["customerGender"].len(), 2);
        assert_eq!(groups["customerCountry"]["NZ"], 2);
        assert_eq!(groups["customerCountry"].values().sum::<usize>(), 3);
        assert_eq!(groups["customerAge"]["30"], 4);
        assert_eq!(groups["clientCountry"]["CA"], 2);
        assert_eq!(groups["clientProductType"]["retail"], 4);
    }
}
