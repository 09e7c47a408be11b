//! Statistics for the hub

pub mod metrics;

pub use metrics::HubStats;
