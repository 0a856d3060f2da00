pub mod tables;

pub use tables::{load_target_customers, load_tables};
