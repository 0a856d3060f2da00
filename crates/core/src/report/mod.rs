//! Descriptive diagnostics over the input snapshot. None of these feed the model.

pub mod groups;
pub mod nulls;
pub mod probabilities;
pub mod summary;

pub use groups::{customer_groups, message_groups, GroupCounts};
pub use nulls::{null_report, FieldNulls, NullReport};
pub use probabilities::{engagement_report, EngagementReport, EngagementStats};
pub use summary::{describe, summary_report, ColumnSummary, SummaryReport};
