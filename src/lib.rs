#![deny(unreachable_pub)]
//! Futures order bot
//!
//! Validates order parameters, submits them through an [`OrderGateway`] and
//! coordinates multi-order strategies: a synthetic OCO pair monitored client-side,
//! grid and TWAP batches, plus plain market, limit and stop-limit orders.

pub mod cli;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod order;
pub mod strategy;

pub use config::{Credentials, Settings};
pub use errors::{Error, Result, ValidationError};
pub use gateway::{GatewayError, OrderGateway, PaperGateway};
pub use order::{OrderId, OrderIntent, OrderKind, OrderStatus, PlacedOrder, Side, Symbol, Validator};
pub use strategy::{BatchReport, OcoCoordinator, OcoError, OcoRequest, OcoResult};
