use crate::domain::tables::{Client, Customer, Message, Tables};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

pub const CLIENTS_FILE: &str = "clients.csv";
pub const CUSTOMERS_FILE: &str = "customers.csv";
pub const MESSAGES_FILE: &str = "messages.csv";

/// Reads `clients.csv`, `customers.csv` and `messages.csv` from `dir`.
pub fn load_tables(dir: &Path) -> Result<Tables> {
    let clients: Vec<Client> = read_rows(&dir.join(CLIENTS_FILE))?;
    let customers: Vec<Customer> = read_rows(&dir.join(CUSTOMERS_FILE))?;
    let messages: Vec<Message> = read_rows(&dir.join(MESSAGES_FILE))?;

    tracing::info!(
        dir = %dir.display(),
        clients = clients.len(),
        customers = customers.len(),
        messages = messages.len(),
        "loaded input tables"
    );

    Ok(Tables {
        clients,
        customers,
        messages,
    })
}

#[derive(Debug, Deserialize)]
struct TargetRow {
    customer_id: i64,
}

/// Reads the target customer list (`customer_id` column). Keeps file order, drops repeats.
pub fn load_target_customers(path: &Path) -> Result<Vec<i64>> {
    let rows: Vec<TargetRow> = read_rows(path)?;
    let total = rows.len();

    let mut seen = HashSet::with_capacity(total);
    let mut out = Vec::with_capacity(total);
    for row in rows {
        if seen.insert(row.customer_id) {
            out.push(row.customer_id);
        }
    }

    if out.len() < total {
        tracing::warn!(duplicates = total - out.len(), "duplicate target customer ids dropped");
    }
    tracing::info!(path = %path.display(), targets = out.len(), "loaded target customers");
    Ok(out)
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut out = Vec::new();
    for (idx, row) in reader.deserialize::<T>().enumerate() {
        // Header is line 1.
        let row = row.with_context(|| format!("{}: bad row at line {}", path.display(), idx + 2))?;
        out.push(row);
    }
    Ok(out)
}
