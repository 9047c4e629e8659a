pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod providers;
pub mod storage;
pub mod types;

pub use config::Config;
pub use engine::{AutorunController, EngineConfig, RunHandle, Simulation};
pub use error::{ConfigError, ProviderError, RunError};
pub use types::*;
