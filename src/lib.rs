pub mod aggregate;
pub mod app;
pub mod buckets;
pub mod classify;
pub mod config;
pub mod delta;
pub mod donut;
pub mod engine;
pub mod errors;
pub mod feed;
pub mod handlers;
pub mod labels;
pub mod merge;
pub mod models;
pub mod period;
pub mod range;
pub mod state;
pub mod storage;
pub mod taxonomy;

pub use app::router;
pub use config::Config;
pub use engine::{Engine, EngineConfig, SummaryRequest};
pub use state::AppState;
pub use storage::{load_feeds, load_taxonomy};
