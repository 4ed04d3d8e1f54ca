//! Single-order strategies: market, limit and stop-limit
//!
//! Each one validates every field, logs the intent, submits it and logs the venue
//! answer. Nothing is retried: a submission is not idempotent.

use log::{error, info};

use crate::errors::Result;
use crate::gateway::OrderGateway;
use crate::order::{OrderIntent, OrderKind, PlacedOrder, Validator};

async fn submit<G: OrderGateway + ?Sized>(gateway: &G, label: &str, intent: OrderIntent) -> Result<PlacedOrder> {
    info!("Placing {} order: {}", label, intent.log_fields());
    match gateway.submit_order(&intent).await {
        Ok(order) => {
            info!(
                "{} order placed: order_id={} status={}",
                label, order.order_id, order.status
            );
            Ok(order)
        }
        Err(e) => {
            error!("{} order failed: {} | {}", label, e, intent.log_fields());
            Err(e.into())
        }
    }
}

pub async fn place_market_order<G: OrderGateway + ?Sized>(
    gateway: &G,
    validator: &Validator,
    symbol: &str,
    side: &str,
    quantity: &str,
) -> Result<PlacedOrder> {
    let symbol = validator.validate_symbol(symbol)?;
    let quantity = validator.validate_quantity(quantity)?;
    let side = validator.validate_side(side)?;

    submit(gateway, "Market", OrderIntent::new(symbol, side, quantity, OrderKind::Market)).await
}

/// Good-till-cancel limit order
pub async fn place_limit_order<G: OrderGateway + ?Sized>(
    gateway: &G,
    validator: &Validator,
    symbol: &str,
    side: &str,
    quantity: &str,
    price: &str,
) -> Result<PlacedOrder> {
    let symbol = validator.validate_symbol(symbol)?;
    let quantity = validator.validate_quantity(quantity)?;
    let price = validator.validate_price(price)?;
    let side = validator.validate_side(side)?;

    submit(
        gateway,
        "Limit",
        OrderIntent::new(symbol, side, quantity, OrderKind::Limit { price }),
    )
    .await
}

/// Conditional order: once `stop_price` trades, a limit order at `limit_price` rests
pub async fn place_stop_limit_order<G: OrderGateway + ?Sized>(
    gateway: &G,
    validator: &Validator,
    symbol: &str,
    side: &str,
    quantity: &str,
    stop_price: &str,
    limit_price: &str,
) -> Result<PlacedOrder> {
    let symbol = validator.validate_symbol(symbol)?;
    let quantity = validator.validate_quantity(quantity)?;
    let trigger_price = validator.validate_price(stop_price)?;
    let limit_price = validator.validate_price(limit_price)?;
    let side = validator.validate_side(side)?;

    submit(
        gateway,
        "Stop-limit",
        OrderIntent::new(
            symbol,
            side,
            quantity,
            OrderKind::StopLimit {
                trigger_price,
                limit_price,
            },
        ),
    )
    .await
}
