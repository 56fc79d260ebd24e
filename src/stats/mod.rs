pub mod service;

pub use service::{CachePerformance, HourlyBandwidth, StatsOverview, StatsService, TopAsset};
