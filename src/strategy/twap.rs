//! TWAP strategy: a total quantity split into equal MARKET orders over time

use std::time::Duration;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use super::batch::{BatchReport, MAX_BATCH_ORDERS};
use crate::errors::ValidationError;
use crate::gateway::OrderGateway;
use crate::order::{NumericInput, OrderIntent, OrderKind, PositiveReal, Side, Symbol, Validator};

/// Raw user input for a TWAP schedule
#[derive(Debug, Clone)]
pub struct TwapRequest {
    pub symbol: String,
    pub side: String,
    pub total_quantity: String,
    pub parts: String,
    pub interval_secs: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TwapPlan {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity_per_part: PositiveReal,
    pub parts: usize,
    /// Pause between two submissions
    pub interval: Duration,
}

impl TwapPlan {
    pub fn new(request: &TwapRequest, validator: &Validator) -> Result<Self, ValidationError> {
        let symbol = validator.validate_symbol(&request.symbol)?;
        let total = validator.validate_quantity(&request.total_quantity)?;
        let side = validator.validate_side(&request.side)?;

        let parts = request
            .parts
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|parts| (1..=MAX_BATCH_ORDERS).contains(parts))
            .ok_or_else(|| ValidationError::InvalidPartCount(request.parts.clone()))?;
        let quantity_per_part = validator.validate_quantity(total.get() / parts as f64)?;

        let interval = request
            .interval_secs
            .parse_number()
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .ok_or_else(|| ValidationError::InvalidInterval(request.interval_secs.clone()))?;

        Ok(Self {
            symbol,
            side,
            quantity_per_part,
            parts,
            interval,
        })
    }

    pub fn intent(&self) -> OrderIntent {
        OrderIntent::new(
            self.symbol.clone(),
            self.side,
            self.quantity_per_part,
            OrderKind::Market,
        )
    }
}

/// Submit the parts one by one, sleeping between them but not after the last.
///
/// Cancelling `cancel` stops the schedule and returns what was placed so far.
pub async fn place_twap_orders<G: OrderGateway + ?Sized>(
    gateway: &G,
    plan: &TwapPlan,
    cancel: &CancellationToken,
) -> BatchReport {
    info!(
        "TWAP STARTED -> {} | side={}, parts={}, qty_per_order={}, interval={}s",
        plan.symbol,
        plan.side,
        plan.parts,
        plan.quantity_per_part,
        plan.interval.as_secs_f64()
    );

    let intent = plan.intent();
    let mut report = BatchReport::new(plan.parts);

    for index in 0..plan.parts {
        if cancel.is_cancelled() {
            report.stopped_early = true;
            break;
        }

        let result = gateway.submit_order(&intent).await;
        report.record("TWAP", index, &intent, result);

        if index + 1 == plan.parts {
            break;
        }

        info!("Waiting {}s before TWAP order {}/{}", plan.interval.as_secs_f64(), index + 2, plan.parts);
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.stopped_early = true;
                break;
            }
            _ = tokio::time::sleep(plan.interval) => {}
        }
    }

    if report.stopped_early {
        warn!(
            "TWAP cancelled after {}/{} orders",
            report.attempted(),
            report.requested
        );
    } else {
        info!(
            "TWAP completed: {}/{} orders placed",
            report.placed.len(),
            report.requested
        );
    }
    report
}
