//! Order gateway - the venue abstraction every strategy talks to
//!
//! The gateway is constructed once by the caller and passed into each operation.
//! Strategies never build their own client.
//!
//! - [`paper`] - in-process simulated venue used by the binary
//! - [`retry`] - bounded exponential backoff for idempotent calls
//! - `mock` - scriptable gateway for tests, behind the `mock` feature

#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod paper;
pub mod retry;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::order::{OrderId, OrderIntent, OrderStatus, PlacedOrder, Symbol};

pub use paper::PaperGateway;
pub use retry::{with_retry, RetryPolicy};

/// Errors reported by a venue
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum GatewayError {
    #[error("Order rejected by venue: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Order not found: {symbol} {order_id}")]
    OrderNotFound { symbol: String, order_id: String },

    #[error("No reference price for {0}")]
    NoReferencePrice(String),

    #[error("Request failed after {attempts} attempts: {reason}")]
    RetriesExhausted { attempts: u32, reason: String },
}

impl GatewayError {
    /// Whether repeating the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Network(_))
    }
}

/// Venue answer to a cancel request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelAck {
    pub order_id: OrderId,
    /// Status after the request was processed
    pub status: OrderStatus,
    /// `false` when the order was already terminal and nothing changed
    pub canceled: bool,
}

/// Venue operations - can be mocked for testing
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Submit a validated order
    async fn submit_order(&self, intent: &OrderIntent) -> Result<PlacedOrder, GatewayError>;

    /// Current status of an order
    async fn query_order(&self, symbol: &Symbol, order_id: &OrderId) -> Result<OrderStatus, GatewayError>;

    /// Cancel an order. Safe on terminal orders, which yield `canceled: false`.
    async fn cancel_order(&self, symbol: &Symbol, order_id: &OrderId) -> Result<CancelAck, GatewayError>;
}
