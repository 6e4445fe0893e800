//! Gatekeeper error types

use thiserror::Error;

/// Errors that can occur when building a validator
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
