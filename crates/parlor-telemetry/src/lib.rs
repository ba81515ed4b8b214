pub mod turn_metrics;

pub use turn_metrics::*;
