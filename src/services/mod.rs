pub mod aggregate;
pub mod classify;
pub mod data_fetcher;
pub mod metrics;
pub mod orchestrator;
pub mod scoring;
pub mod value_bets;

pub use metrics::MetricsProvider;
pub use orchestrator::PredictionOrchestrator;
