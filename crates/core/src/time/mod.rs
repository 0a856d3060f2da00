pub mod compliance;
pub mod timestamp;
