//! Error taxonomy for the order bot

use thiserror::Error;

use crate::gateway::GatewayError;
use crate::strategy::batch::MAX_BATCH_ORDERS;
use crate::strategy::oco::OcoError;

/// Input rejected before any venue call is made
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid symbol '{symbol}': only {quote_suffix} pairs are allowed (e.g. BTC{quote_suffix})")]
    InvalidSymbol { symbol: String, quote_suffix: String },

    #[error("Invalid quantity '{0}': must be a number greater than 0")]
    InvalidQuantity(String),

    #[error("Invalid price '{0}': must be a number greater than 0")]
    InvalidPrice(String),

    #[error("Invalid side '{0}': must be either BUY or SELL")]
    InvalidSide(String),

    #[error("Invalid price range: lower price {lower} must be less than upper price {upper}")]
    InvalidRange { lower: f64, upper: f64 },

    #[error("Invalid grid count {0}: grid levels must be between 2 and {max}", max = MAX_BATCH_ORDERS)]
    InvalidGridCount(String),

    #[error("Invalid part count {0}: parts must be between 1 and {max}", max = MAX_BATCH_ORDERS)]
    InvalidPartCount(String),

    #[error("Invalid interval '{0}': must be a number of seconds, 0 or more")]
    InvalidInterval(String),
}

/// Top-level error for the runner and the binary
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Oco(#[from] OcoError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing credentials: {0} is not set (add it to the environment or a .env file)")]
    MissingCredentials(&'static str),

    #[error("Incomplete batch: {placed} of {requested} orders placed")]
    IncompleteBatch { placed: usize, requested: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for bot operations
pub type Result<T> = std::result::Result<T, Error>;
