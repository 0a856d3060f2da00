use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("malformed timestamp in {field}: {value:?}")]
    MalformedTimestamp { field: &'static str, value: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("unsupported day for compliant send time: {0}")]
    UnsupportedDay(String),
    #[error("no compliant hours configured for country {0:?}")]
    UnsupportedCountry(String),
    #[error("customer {customer_id} has no country and no client country")]
    MissingCountry { customer_id: i64 },
    #[error("malformed time window label: {0:?}")]
    MalformedTimeWindow(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
