//! Core order data types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Trading pair accepted by the venue, always upper-case
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Build a symbol from an already normalized string.
    ///
    /// Only the validator and the venue side of the crate construct symbols; user
    /// input goes through [`crate::order::Validator::validate_symbol`].
    pub(crate) fn new_unchecked(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Convert to venue side string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finite number strictly greater than zero
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositiveReal(f64);

impl PositiveReal {
    pub(crate) fn new_unchecked(value: f64) -> Self {
        debug_assert!(value.is_finite() && value > 0.0);
        Self(value)
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl fmt::Display for PositiveReal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order type with its role-dependent prices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Executes immediately at the venue price
    Market,
    /// Good-till-cancel limit order
    Limit { price: PositiveReal },
    /// Becomes a limit order once the price moves through the trigger (venue type STOP)
    #[serde(rename = "STOP")]
    StopLimit {
        trigger_price: PositiveReal,
        limit_price: PositiveReal,
    },
    /// Becomes a limit order once the price reaches the profit target (venue type TAKE_PROFIT)
    TakeProfit {
        trigger_price: PositiveReal,
        limit_price: PositiveReal,
    },
}

impl OrderKind {
    /// Venue order type name
    pub fn venue_type(&self) -> &'static str {
        match self {
            OrderKind::Market => "MARKET",
            OrderKind::Limit { .. } => "LIMIT",
            OrderKind::StopLimit { .. } => "STOP",
            OrderKind::TakeProfit { .. } => "TAKE_PROFIT",
        }
    }

    /// Trigger price for conditional orders
    pub fn trigger_price(&self) -> Option<f64> {
        match self {
            OrderKind::StopLimit { trigger_price, .. }
            | OrderKind::TakeProfit { trigger_price, .. } => Some(trigger_price.get()),
            _ => None,
        }
    }

    /// Limit price, if the order rests on the book
    pub fn limit_price(&self) -> Option<f64> {
        match self {
            OrderKind::Market => None,
            OrderKind::Limit { price } => Some(price.get()),
            OrderKind::StopLimit { limit_price, .. }
            | OrderKind::TakeProfit { limit_price, .. } => Some(limit_price.get()),
        }
    }
}

/// Validated order ready to be handed to a gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: PositiveReal,
    #[serde(flatten)]
    pub kind: OrderKind,
}

impl OrderIntent {
    pub fn new(symbol: Symbol, side: Side, quantity: PositiveReal, kind: OrderKind) -> Self {
        Self {
            symbol,
            side,
            quantity,
            kind,
        }
    }

    /// One-line `key=value` description used in log records
    pub fn log_fields(&self) -> String {
        let mut fields = format!(
            "type={} symbol={} side={} qty={}",
            self.kind.venue_type(),
            self.symbol,
            self.side,
            self.quantity
        );
        if let Some(trigger) = self.kind.trigger_price() {
            fields.push_str(&format!(" stop={}", trigger));
        }
        if let Some(limit) = self.kind.limit_price() {
            fields.push_str(&format!(" price={}", limit));
        }
        fields
    }
}

/// Venue-assigned order identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order status as reported by the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    /// Check if the order can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        };
        f.write_str(s)
    }
}

/// Order accepted by the venue, with the last status we saw for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedOrder {
    pub order_id: OrderId,
    pub intent: OrderIntent,
    pub status: OrderStatus,
}

impl PlacedOrder {
    pub fn new(order_id: OrderId, intent: OrderIntent, status: OrderStatus) -> Self {
        Self {
            order_id,
            intent,
            status,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.intent.symbol
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(v: f64) -> PositiveReal {
        PositiveReal::new_unchecked(v)
    }

    #[test]
    fn test_order_status_terminal() {
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Expired.is_terminal());

        assert!(OrderStatus::Filled.is_filled());
        assert!(!OrderStatus::PartiallyFilled.is_filled());
    }

    #[test]
    fn test_order_kind_prices() {
        let stop = OrderKind::StopLimit {
            trigger_price: qty(42000.0),
            limit_price: qty(42500.0),
        };
        assert_eq!(stop.venue_type(), "STOP");
        assert_eq!(stop.trigger_price(), Some(42000.0));
        assert_eq!(stop.limit_price(), Some(42500.0));

        assert_eq!(OrderKind::Market.trigger_price(), None);
        assert_eq!(OrderKind::Market.limit_price(), None);
    }

    #[test]
    fn test_intent_log_fields() {
        let intent = OrderIntent::new(
            Symbol::new_unchecked("BTCUSDT"),
            Side::Sell,
            qty(0.01),
            OrderKind::TakeProfit {
                trigger_price: qty(45000.0),
                limit_price: qty(45000.0),
            },
        );
        assert_eq!(
            intent.log_fields(),
            "type=TAKE_PROFIT symbol=BTCUSDT side=SELL qty=0.01 stop=45000 price=45000"
        );
    }

    #[test]
    fn test_intent_serializes_venue_names() {
        let intent = OrderIntent::new(
            Symbol::new_unchecked("ETHUSDT"),
            Side::Buy,
            qty(1.5),
            OrderKind::Limit { price: qty(3000.0) },
        );
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["symbol"], "ETHUSDT");
        assert_eq!(json["side"], "BUY");
        assert_eq!(json["type"], "LIMIT");
        assert_eq!(json["price"], 3000.0);
    }
}
