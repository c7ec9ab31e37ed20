pub mod bands;
pub mod registry;
pub mod encoder;
pub mod classifiers;
pub mod artifact;
pub mod ensemble;
pub mod evaluation;

pub use registry::ModelRegistry;
pub use ensemble::InferenceAggregator;
