//! Paper trading venue
//!
//! Simulates order execution locally against a reference price per symbol. Market
//! orders fill at the reference price; resting and conditional orders are
//! re-evaluated whenever the price moves.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CancelAck, GatewayError, OrderGateway};
use crate::config::Credentials;
use crate::order::{OrderId, OrderIntent, OrderKind, OrderStatus, PlacedOrder, Side, Symbol};

/// Internal order tracking for paper trading
#[derive(Debug, Clone)]
struct PaperOrder {
    intent: OrderIntent,
    status: OrderStatus,
    /// Conditional orders become plain limit orders once triggered
    triggered: bool,
    avg_fill_price: Option<f64>,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

impl PaperOrder {
    fn new(intent: OrderIntent) -> Self {
        let triggered = !matches!(
            intent.kind,
            OrderKind::StopLimit { .. } | OrderKind::TakeProfit { .. }
        );
        Self {
            intent,
            status: OrderStatus::New,
            triggered,
            avg_fill_price: None,
            created_at: Utc::now(),
        }
    }

    /// Whether a conditional order's trigger is reached at `price`
    fn trigger_reached(&self, price: f64) -> bool {
        match (self.intent.kind, self.intent.side) {
            // Stops fire when price moves against the position
            (OrderKind::StopLimit { trigger_price, .. }, Side::Buy) => price >= trigger_price.get(),
            (OrderKind::StopLimit { trigger_price, .. }, Side::Sell) => price <= trigger_price.get(),
            // Take-profits fire when price moves in favor
            (OrderKind::TakeProfit { trigger_price, .. }, Side::Buy) => price <= trigger_price.get(),
            (OrderKind::TakeProfit { trigger_price, .. }, Side::Sell) => price >= trigger_price.get(),
            _ => true,
        }
    }

    /// Check if this order should be filled at the given price
    fn should_fill(&self, price: f64) -> bool {
        if self.status.is_terminal() || !self.triggered {
            return false;
        }

        match self.intent.kind.limit_price() {
            None => true,
            Some(limit) => match self.intent.side {
                Side::Buy => price <= limit,
                Side::Sell => price >= limit,
            },
        }
    }

    fn fill(&mut self, price: f64) {
        self.status = OrderStatus::Filled;
        self.avg_fill_price = Some(price);
    }

    /// Re-evaluate at a new price, returns `true` when the order filled
    fn on_price(&mut self, price: f64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        if !self.triggered && self.trigger_reached(price) {
            self.triggered = true;
        }
        if self.should_fill(price) {
            self.fill(price);
            return true;
        }
        false
    }
}

#[derive(Debug, Default)]
struct PaperBook {
    prices: HashMap<Symbol, f64>,
    orders: HashMap<OrderId, PaperOrder>,
}

/// Paper trading venue implementation
pub struct PaperGateway {
    account: String,
    book: Mutex<PaperBook>,
}

impl PaperGateway {
    /// Create a paper venue seeded with reference prices (symbol -> price)
    pub fn new(credentials: &Credentials, prices: HashMap<String, f64>) -> Self {
        let prices = prices
            .into_iter()
            .filter(|(_, price)| price.is_finite() && *price > 0.0)
            .map(|(symbol, price)| (Symbol::new_unchecked(symbol.to_uppercase()), price))
            .collect::<HashMap<_, _>>();

        info!(
            "PaperGateway ready: account={} symbols={}",
            credentials.key_hint(),
            prices.len()
        );

        Self {
            account: credentials.key_hint(),
            book: Mutex::new(PaperBook {
                prices,
                orders: HashMap::new(),
            }),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Current reference price for a symbol
    pub async fn price(&self, symbol: &Symbol) -> Option<f64> {
        self.book.lock().await.prices.get(symbol).copied()
    }

    /// Move the reference price and fill every order that becomes executable.
    ///
    /// Returns the ids of orders filled by this move.
    pub async fn update_price(&self, symbol: &Symbol, price: f64) -> Vec<OrderId> {
        let mut book = self.book.lock().await;
        book.prices.insert(symbol.clone(), price);

        let mut filled = Vec::new();
        for (order_id, order) in book.orders.iter_mut() {
            if order.intent.symbol == *symbol && order.on_price(price) {
                info!("Paper fill: order_id={} symbol={} price={}", order_id, symbol, price);
                filled.push(order_id.clone());
            }
        }
        filled
    }

    /// Average fill price of a filled order
    pub async fn fill_price(&self, order_id: &OrderId) -> Option<f64> {
        self.book
            .lock()
            .await
            .orders
            .get(order_id)
            .and_then(|o| o.avg_fill_price)
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn submit_order(&self, intent: &OrderIntent) -> Result<PlacedOrder, GatewayError> {
        let mut book = self.book.lock().await;
        let price = book.prices.get(&intent.symbol).copied();
        let mut order = PaperOrder::new(intent.clone());

        match (intent.kind, price) {
            (OrderKind::Market, None) => {
                return Err(GatewayError::NoReferencePrice(intent.symbol.to_string()));
            }
            (OrderKind::StopLimit { .. } | OrderKind::TakeProfit { .. }, Some(price))
                if order.trigger_reached(price) =>
            {
                return Err(GatewayError::Rejected(format!(
                    "{} order would immediately trigger at {}",
                    intent.kind.venue_type(),
                    price
                )));
            }
            (_, Some(price)) => {
                order.on_price(price);
            }
            (_, None) => {}
        }

        let order_id = OrderId::new(Uuid::new_v4().simple().to_string());
        let status = order.status;
        debug!("Paper order accepted: order_id={} {}", order_id, intent.log_fields());
        book.orders.insert(order_id.clone(), order);

        Ok(PlacedOrder::new(order_id, intent.clone(), status))
    }

    async fn query_order(&self, symbol: &Symbol, order_id: &OrderId) -> Result<OrderStatus, GatewayError> {
        let book = self.book.lock().await;
        book.orders
            .get(order_id)
            .filter(|o| o.intent.symbol == *symbol)
            .map(|o| o.status)
            .ok_or_else(|| GatewayError::OrderNotFound {
                symbol: symbol.to_string(),
                order_id: order_id.to_string(),
            })
    }

    async fn cancel_order(&self, symbol: &Symbol, order_id: &OrderId) -> Result<CancelAck, GatewayError> {
        let mut book = self.book.lock().await;
        let order = book
            .orders
            .get_mut(order_id)
            .filter(|o| o.intent.symbol == *symbol)
            .ok_or_else(|| GatewayError::OrderNotFound {
                symbol: symbol.to_string(),
                order_id: order_id.to_string(),
            })?;

        if order.status.is_terminal() {
            return Ok(CancelAck {
                order_id: order_id.clone(),
                status: order.status,
                canceled: false,
            });
        }

        order.status = OrderStatus::Canceled;
        Ok(CancelAck {
            order_id: order_id.clone(),
            status: OrderStatus::Canceled,
            canceled: true,
        })
    }
}
