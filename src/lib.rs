pub mod analyzers;
pub mod codec;
pub mod config;
pub mod error;
pub mod grid;
pub mod metrics;
pub mod output;
pub mod parser;
pub mod privacy;
pub mod stats;

pub mod pb {
    include!(concat!(env!("OUT_DIR"), "/mobility_metrics.rs"));
}

pub use error::{MetricsError, Result};
pub use metrics::Metrics;
pub use privacy::suppress;
