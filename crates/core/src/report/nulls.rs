use crate::domain::tables::{Client, Customer, Message, Tables};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldNulls {
    pub size: usize,
    pub null_values: usize,
    pub non_null_values: usize,
    /// `None` for an empty table.
    pub probability_of_null: Option<f64>,
}

/// Table name → column name → null counts.
pub type NullReport = BTreeMap<String, BTreeMap<String, FieldNulls>>;

trait Audited {
    const FIELDS: &'static [&'static str];

    /// Presence of each field, in `FIELDS` order.
    fn presence(&self) -> Vec<bool>;
}

fn filled(v: Option<&str>) -> bool {
    v.is_some_and(|s| !s.trim().is_empty())
}

impl Audited for Client {
    const FIELDS: &'static [&'static str] = &["id", "name", "product_type", "country"];

    fn presence(&self) -> Vec<bool> {
        vec![
            true,
            filled(self.name.as_deref()),
            filled(self.product_type.as_deref()),
            filled(self.country.as_deref()),
        ]
    }
}

impl Audited for Customer {
    const FIELDS: &'static [&'static str] =
        &["id", "gender", "client_id", "country", "age", "created_at"];

    fn presence(&self) -> Vec<bool> {
        vec![
            true,
            filled(self.gender.as_deref()),
            self.client_id.is_some(),
            filled(self.country.as_deref()),
            self.age.is_some(),
            filled(self.created_at.as_deref()),
        ]
    }
}

impl Audited for Message {
    const FIELDS: &'static [&'static str] = &["id", "customer_id", "sent_at", "clicked", "converted"];

    fn presence(&self) -> Vec<bool> {
        vec![true, true, filled(Some(self.sent_at.as_str())), true, true]
    }
}

fn audit<T: Audited>(rows: &[T]) -> BTreeMap<String, FieldNulls> {
    let mut present = vec![0usize; T::FIELDS.len()];
    for row in rows {
        for (count, is_present) in present.iter_mut().zip(row.presence()) {
            *count += usize::from(is_present);
        }
    }

    let size = rows.len();
    T::FIELDS
        .iter()
        .zip(present)
        .map(|(field, non_null_values)| {
            let null_values = size - non_null_values;
            let probability_of_null = (size > 0).then(|| null_values as f64 / size as f64);
            (
                field.to_string(),
                FieldNulls {
                    size,
                    null_values,
                    non_null_values,
                    probability_of_null,
                },
            )
        })
        .collect()
}

pub fn null_report(tables: &Tables) -> NullReport {
    let mut out = BTreeMap::new();
    out.insert("clients".to_string(), audit(&tables.clients));
    out.insert("customers".to_string(), audit(&tables.customers));
    out.insert("messages".to_string(), audit(&tables.messages));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_nulls_per_field() {
        let tables = Tables {
            clients: vec![
                Client {
                    id: 1,
                    name: Some("A".to_string()),
                    product_type: None,
                    country: Some("UK".to_string()),
                },
                Client {
                    id: 2,
                    name: None,
                    product_type: None,
                    country: Some(" ".to_string()),
                },
            ],
            customers: vec![],
            messages: vec![],
        };

        let report = null_report(&tables);
        let clients = &report["clients"];
        assert_eq!(clients["id"].null_values, 0);
        assert_eq!(clients["name"].null_values, 1);
        assert_eq!(clients["product_type"].probability_of_null, Some(1.0));
        assert_eq!(clients["country"].non_null_values, 1);
        assert_eq!(report["customers"]["age"].probability_of_null, None);
        assert_eq!(report["messages"].len(), 5);
    }
}
