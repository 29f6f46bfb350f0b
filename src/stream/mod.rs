pub mod aggregator;

pub use aggregator::{AggregateError, StreamAggregator, StreamOutcome};
