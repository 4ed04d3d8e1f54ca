//! Grid strategy: evenly spaced LIMIT orders across a price range

use log::info;

use super::batch::{BatchReport, MAX_BATCH_ORDERS};
use crate::errors::ValidationError;
use crate::gateway::OrderGateway;
use crate::order::{OrderIntent, OrderKind, PositiveReal, Side, Symbol, Validator};

/// Raw user input for a grid
#[derive(Debug, Clone)]
pub struct GridRequest {
    pub symbol: String,
    pub side: String,
    pub total_quantity: String,
    pub lower_price: String,
    pub upper_price: String,
    pub grids: String,
}

/// Round a price to the given number of decimal places
pub fn round_price(price: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (price * factor).round() / factor
}

/// Validated grid: one price per level, same quantity everywhere
#[derive(Debug, Clone, PartialEq)]
pub struct GridPlan {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity_per_level: PositiveReal,
    pub step: f64,
    pub prices: Vec<PositiveReal>,
}

impl GridPlan {
    pub fn new(request: &GridRequest, validator: &Validator, price_decimals: u32) -> Result<Self, ValidationError> {
        let symbol = validator.validate_symbol(&request.symbol)?;
        let total = validator.validate_quantity(&request.total_quantity)?;
        let lower = validator.validate_price(&request.lower_price)?;
        let upper = validator.validate_price(&request.upper_price)?;
        let side = validator.validate_side(&request.side)?;

        if lower >= upper {
            return Err(ValidationError::InvalidRange {
                lower: lower.get(),
                upper: upper.get(),
            });
        }

        let grids = parse_grid_count(&request.grids)?;
        let quantity_per_level = validator.validate_quantity(total.get() / grids as f64)?;
        let step = (upper.get() - lower.get()) / grids as f64;

        let prices = (0..grids)
            .map(|i| validator.validate_price(round_price(lower.get() + step * i as f64, price_decimals)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            symbol,
            side,
            quantity_per_level,
            step,
            prices,
        })
    }

    pub fn levels(&self) -> usize {
        self.prices.len()
    }

    /// GTC limit order for every level, lowest price first
    pub fn intents(&self) -> Vec<OrderIntent> {
        self.prices
            .iter()
            .map(|price| {
                OrderIntent::new(
                    self.symbol.clone(),
                    self.side,
                    self.quantity_per_level,
                    OrderKind::Limit { price: *price },
                )
            })
            .collect()
    }
}

fn parse_grid_count(raw: &str) -> Result<usize, ValidationError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .filter(|count| (2..=MAX_BATCH_ORDERS).contains(count))
        .ok_or_else(|| ValidationError::InvalidGridCount(raw.to_string()))
}

/// Submit one limit order per level. A failed level is recorded and the rest continue.
pub async fn place_grid_orders<G: OrderGateway + ?Sized>(gateway: &G, plan: &GridPlan) -> BatchReport {
    info!(
        "GRID START -> {} | side={}, levels={}, qty_per_level={}, step={}",
        plan.symbol,
        plan.side,
        plan.levels(),
        plan.quantity_per_level,
        plan.step
    );

    let mut report = BatchReport::new(plan.levels());
    for (index, intent) in plan.intents().iter().enumerate() {
        let result = gateway.submit_order(intent).await;
        report.record("Grid", index, intent, result);
    }

    info!(
        "GRID COMPLETED: {}/{} orders placed",
        report.placed.len(),
        report.requested
    );
    report
}
