use serde::{de, Deserialize, Deserializer, Serialize};

/// Row of `clients.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    pub name: Option<String>,
    pub product_type: Option<String>,
    pub country: Option<String>,
}

/// Row of `customers.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    pub gender: Option<String>,
    pub client_id: Option<i64>,
    pub country: Option<String>,
    #[serde(default, deserialize_with = "deserialize_age")]
    pub age: Option<u32>,
    pub created_at: Option<String>,
}

/// Row of `messages.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub customer_id: i64,
    #[serde(default)]
    pub sent_at: String,
    #[serde(deserialize_with = "deserialize_flag")]
    pub clicked: bool,
    #[serde(deserialize_with = "deserialize_flag")]
    pub converted: bool,
}

/// The three input tables of one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub clients: Vec<Client>,
    pub customers: Vec<Customer>,
    pub messages: Vec<Message>,
}

pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "t" | "yes" => Some(true),
        "0" | "0.0" | "false" | "f" | "no" => Some(false),
        _ => None,
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw)
        .ok_or_else(|| de::Error::custom(format!("expected a boolean flag, got {raw:?}")))
}

// Exports with nullable integer columns write ages as floats ("34.0").
fn deserialize_age<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let value: f64 = raw
        .parse()
        .map_err(|_| de::Error::custom(format!("expected an age, got {raw:?}")))?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(de::Error::custom(format!("expected a whole, non-negative age, got {raw:?}")));
    }
    Ok(Some(value as u32))
}
