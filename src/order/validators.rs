//! Input validation - the only sanitization boundary before the venue
//!
//! Every strategy runs its user-supplied fields through these functions before an
//! [`OrderIntent`](super::OrderIntent) is built. All of them are pure.

use crate::errors::ValidationError;

use super::types::{PositiveReal, Side, Symbol};

/// Quote asset accepted when nothing else is configured
pub const DEFAULT_QUOTE_SUFFIX: &str = "USDT";

/// Raw numeric input: CLI strings, plain floats or already validated values
pub trait NumericInput {
    /// Parse into a float, `None` if the input is not a number
    fn parse_number(&self) -> Option<f64>;

    /// Original text used in error messages
    fn raw(&self) -> String;
}

impl NumericInput for str {
    fn parse_number(&self) -> Option<f64> {
        self.trim().parse::<f64>().ok()
    }

    fn raw(&self) -> String {
        self.to_string()
    }
}

impl NumericInput for String {
    fn parse_number(&self) -> Option<f64> {
        self.as_str().parse_number()
    }

    fn raw(&self) -> String {
        self.clone()
    }
}

impl NumericInput for f64 {
    fn parse_number(&self) -> Option<f64> {
        Some(*self)
    }

    fn raw(&self) -> String {
        self.to_string()
    }
}

impl NumericInput for PositiveReal {
    fn parse_number(&self) -> Option<f64> {
        Some(self.get())
    }

    fn raw(&self) -> String {
        self.to_string()
    }
}

impl<T: NumericInput + ?Sized> NumericInput for &T {
    fn parse_number(&self) -> Option<f64> {
        (**self).parse_number()
    }

    fn raw(&self) -> String {
        (**self).raw()
    }
}

fn positive(input: &impl NumericInput) -> Option<PositiveReal> {
    input
        .parse_number()
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(PositiveReal::new_unchecked)
}

/// Validate that quantity is a positive number
pub fn validate_quantity(qty: impl NumericInput) -> Result<PositiveReal, ValidationError> {
    positive(&qty).ok_or_else(|| ValidationError::InvalidQuantity(qty.raw()))
}

/// Validate that price is a positive number
pub fn validate_price(price: impl NumericInput) -> Result<PositiveReal, ValidationError> {
    positive(&price).ok_or_else(|| ValidationError::InvalidPrice(price.raw()))
}

/// Validate BUY/SELL, case-insensitive
pub fn validate_side(side: &str) -> Result<Side, ValidationError> {
    match side.trim().to_uppercase().as_str() {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        _ => Err(ValidationError::InvalidSide(side.to_string())),
    }
}

/// Validate a symbol against the default USDT suffix
pub fn validate_symbol(symbol: &str) -> Result<Symbol, ValidationError> {
    Validator::default().validate_symbol(symbol)
}

/// Validator carrying venue-specific symbol rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validator {
    quote_suffix: String,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_SUFFIX)
    }
}

impl Validator {
    pub fn new(quote_suffix: impl Into<String>) -> Self {
        Self {
            quote_suffix: quote_suffix.into().to_uppercase(),
        }
    }

    pub fn quote_suffix(&self) -> &str {
        &self.quote_suffix
    }

    /// Upper-case the symbol and require the configured quote suffix
    pub fn validate_symbol(&self, symbol: &str) -> Result<Symbol, ValidationError> {
        let upper = symbol.to_uppercase();
        if upper.is_empty() || !upper.ends_with(&self.quote_suffix) {
            return Err(ValidationError::InvalidSymbol {
                symbol: symbol.to_string(),
                quote_suffix: self.quote_suffix.clone(),
            });
        }
        Ok(Symbol::new_unchecked(upper))
    }

    pub fn validate_quantity(&self, qty: impl NumericInput) -> Result<PositiveReal, ValidationError> {
        validate_quantity(qty)
    }

    pub fn validate_price(&self, price: impl NumericInput) -> Result<PositiveReal, ValidationError> {
        validate_price(price)
    }

    pub fn validate_side(&self, side: &str) -> Result<Side, ValidationError> {
        validate_side(side)
    }
}
