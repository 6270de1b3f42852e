//! Service host errors

use gapi_core::error::EconomyError;
use thiserror::Error;

/// Failures while loading configuration or assembling the node
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("invalid seed data: {0}")]
    Seed(String),

    #[error(transparent)]
    Economy(#[from] EconomyError),
}
