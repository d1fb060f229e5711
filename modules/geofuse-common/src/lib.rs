pub mod types;
pub mod tables;
pub mod config;
pub mod error;

pub use types::*;
pub use tables::*;
pub use config::{load_config, FusionConfig};
pub use error::{FusionResult, GeofuseError};
