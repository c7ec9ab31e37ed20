pub mod record;
pub mod prediction;

pub use record::*;
pub use prediction::*;
