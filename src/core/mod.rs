pub mod config;
pub mod errors;

pub use config::{BreakerConfig, CoreConfig, RetrievalConfig};
pub use errors::CoreError;
