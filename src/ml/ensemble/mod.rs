pub mod aggregator;
pub mod cache;

pub use aggregator::InferenceAggregator;
pub use cache::ClassifierCache;
