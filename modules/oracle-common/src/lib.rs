pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, OracleMode};
pub use error::OracleError;
pub use types::*;
