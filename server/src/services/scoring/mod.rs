pub mod engine;
pub mod metric;
pub mod metrics;

pub use engine::ScoringEngine;
pub use metric::Metric;
pub use metrics::default_metrics;
