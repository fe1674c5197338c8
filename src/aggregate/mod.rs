pub mod aggregator;
pub mod reduce;

pub use aggregator::{AggregateSnapshot, AggregateStatus, Aggregator};
pub use reduce::{rank_activity, reduce_languages, sum_weekly_activity};
