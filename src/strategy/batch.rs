//! Shared result type for multi-order strategies

use log::{error, info};
use serde::Serialize;

use crate::errors::{Error, Result};
use crate::gateway::GatewayError;
use crate::order::{OrderIntent, PlacedOrder};

/// Largest grid level count or TWAP part count a plan accepts
pub const MAX_BATCH_ORDERS: usize = 10_000;

/// One order of a batch the venue did not accept
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFailure {
    /// Position in the batch (0-based)
    pub index: usize,
    pub intent: OrderIntent,
    pub error: GatewayError,
}

/// Outcome of a grid or TWAP run, partial success is explicit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub requested: usize,
    /// Accepted orders, in submission order
    pub placed: Vec<PlacedOrder>,
    pub failures: Vec<BatchFailure>,
    /// Set when the run was cancelled before every order was attempted
    pub stopped_early: bool,
}

impl BatchReport {
    pub fn new(requested: usize) -> Self {
        Self {
            requested,
            placed: Vec::new(),
            failures: Vec::new(),
            stopped_early: false,
        }
    }

    /// Record the venue answer for order `index` of the batch
    pub(crate) fn record(
        &mut self,
        label: &str,
        index: usize,
        intent: &OrderIntent,
        result: std::result::Result<PlacedOrder, GatewayError>,
    ) {
        match result {
            Ok(order) => {
                info!(
                    "{} order {}/{} placed: order_id={} status={} {}",
                    label,
                    index + 1,
                    self.requested,
                    order.order_id,
                    order.status,
                    intent.log_fields()
                );
                self.placed.push(order);
            }
            Err(e) => {
                error!(
                    "{} order {}/{} failed: {} | {}",
                    label,
                    index + 1,
                    self.requested,
                    e,
                    intent.log_fields()
                );
                self.failures.push(BatchFailure {
                    index,
                    intent: intent.clone(),
                    error: e,
                });
            }
        }
    }

    pub fn attempted(&self) -> usize {
        self.placed.len() + self.failures.len()
    }

    /// Every requested order was submitted and accepted
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.placed.len() == self.requested
    }

    pub fn ensure_complete(&self) -> Result<()> {
        if self.is_complete() {
            Ok(())
        } else {
            Err(Error::IncompleteBatch {
                placed: self.placed.len(),
                requested: self.requested,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{validate_quantity, validate_symbol, OrderId, OrderKind, OrderStatus, Side};

    fn intent() -> OrderIntent {
        OrderIntent::new(
            validate_symbol("BTCUSDT").unwrap(),
            Side::Buy,
            validate_quantity(0.1).unwrap(),
            OrderKind::Market,
        )
    }

    #[test]
    fn test_report_does_not_preallocate() {
        let report = BatchReport::new(usize::MAX);
        assert_eq!(report.requested, usize::MAX);
        assert_eq!(report.placed.capacity(), 0);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_report_tracks_partial_success() {
        let mut report = BatchReport::new(3);
        let intent = intent();

        report.record(
            "TWAP",
            0,
            &intent,
            Ok(PlacedOrder::new(OrderId::new("a"), intent.clone(), OrderStatus::Filled)),
        );
        report.record("TWAP", 1, &intent, Err(GatewayError::Rejected("margin".into())));
        assert!(!report.is_complete());
        assert_eq!(report.attempted(), 2);

        report.record(
            "TWAP",
            2,
            &intent,
            Ok(PlacedOrder::new(OrderId::new("c"), intent.clone(), OrderStatus::Filled)),
        );
        assert_eq!(report.placed.len(), 2);
        assert_eq!(report.failures[0].index, 1);
        assert!(matches!(
            report.ensure_complete(),
            Err(Error::IncompleteBatch {
                placed: 2,
                requested: 3
            })
        ));
    }

    #[test]
    fn test_empty_failures_but_not_all_attempted() {
        let mut report = BatchReport::new(2);
        let intent = intent();
        report.record(
            "GRID",
            0,
            &intent,
            Ok(PlacedOrder::new(OrderId::new("a"), intent.clone(), OrderStatus::New)),
        );
        report.stopped_early = true;
        assert!(!report.is_complete());
    }
}
