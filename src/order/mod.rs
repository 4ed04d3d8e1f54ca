//! Order model and input validation
//!
//! - [`types`] - symbols, sides, order kinds, intents and venue snapshots
//! - [`validators`] - the sanitization boundary applied to every user-supplied field

pub mod types;
pub mod validators;

pub use types::{OrderId, OrderIntent, OrderKind, OrderStatus, PlacedOrder, PositiveReal, Side, Symbol};
pub use validators::{
    validate_price, validate_quantity, validate_side, validate_symbol, NumericInput, Validator,
    DEFAULT_QUOTE_SUFFIX,
};
