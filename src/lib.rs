pub mod config;
pub mod dataset;
pub mod elo;
pub mod encoding;
pub mod error;
pub mod estimator;
pub mod evaluation;
pub mod export;
pub mod features;
pub mod fixtures;
pub mod h2h;
pub mod leaderboard;
pub mod logging;
pub mod model_context;
pub mod persist;
pub mod pipeline;
pub mod prediction_cache;
pub mod rolling;
pub mod scoreline;
pub mod scoring;
pub mod season;
pub mod standings;
