use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::ml::InferenceAggregator;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<InferenceAggregator>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(aggregator: Arc<InferenceAggregator>) -> Self {
        Self {
            aggregator,
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
