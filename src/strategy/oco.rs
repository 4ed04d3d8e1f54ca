//! Synthetic one-cancels-other orders
//!
//! The venue has no native OCO, so the coordinator places two independent
//! conditional orders (take-profit and stop-loss) and monitors them client-side:
//! as soon as one leg fills the other one is canceled.
//!
//! Lifecycle of an [`OcoPair`]:
//!
//! ```text
//! Pending --both legs submitted--> Monitoring --one leg filled--> Resolved --> Terminated
//!    |                                 |
//!    +--submission failed--> Failed <--+--poll failure / abort / both legs closed
//! ```
//!
//! If monitoring is stopped (caller cancellation or deadline) both legs are left
//! open on the venue. Cleaning them up is the caller's job; the error carries
//! both order ids for that purpose.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::errors::ValidationError;
use crate::gateway::{with_retry, GatewayError, OrderGateway, RetryPolicy};
use crate::order::{OrderId, OrderIntent, OrderKind, OrderStatus, PlacedOrder, Validator};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(3600);

/// Coordinator configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OcoConfig {
    /// Delay between two status polls, clamped to 1ms..=1h
    pub poll_interval: Duration,
    /// Stop monitoring after this long, `None` polls until a leg resolves
    pub timeout: Option<Duration>,
    /// Retry policy for a single status query
    pub query_retry: RetryPolicy,
}

impl Default for OcoConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: None,
            query_retry: RetryPolicy::default(),
        }
    }
}

/// One of the two orders of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    TakeProfit,
    StopLoss,
}

impl Leg {
    pub fn other(&self) -> Self {
        match self {
            Leg::TakeProfit => Leg::StopLoss,
            Leg::StopLoss => Leg::TakeProfit,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::TakeProfit => f.write_str("take-profit"),
            Leg::StopLoss => f.write_str("stop-loss"),
        }
    }
}

/// Lifecycle state of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcoState {
    Pending,
    Monitoring,
    Resolved { winner: Leg },
    Terminated,
    Failed,
}

impl OcoState {
    pub fn can_transition_to(&self, next: OcoState) -> bool {
        matches!(
            (self, next),
            (OcoState::Pending, OcoState::Monitoring)
                | (OcoState::Pending, OcoState::Failed)
                | (OcoState::Monitoring, OcoState::Resolved { .. })
                | (OcoState::Monitoring, OcoState::Failed)
                | (OcoState::Resolved { .. }, OcoState::Terminated)
        )
    }

    pub fn is_final(&self) -> bool {
        matches!(self, OcoState::Terminated | OcoState::Failed)
    }
}

/// Two linked legs and their lifecycle state. Only the coordinator mutates it.
#[derive(Debug, Clone)]
pub struct OcoPair {
    state: OcoState,
    take_profit: PlacedOrder,
    stop_loss: PlacedOrder,
}

impl OcoPair {
    /// Pair both submitted legs, monitoring has not started yet
    pub fn new(take_profit: PlacedOrder, stop_loss: PlacedOrder) -> Self {
        Self {
            state: OcoState::Pending,
            take_profit,
            stop_loss,
        }
    }

    pub fn state(&self) -> OcoState {
        self.state
    }

    pub fn leg(&self, leg: Leg) -> &PlacedOrder {
        match leg {
            Leg::TakeProfit => &self.take_profit,
            Leg::StopLoss => &self.stop_loss,
        }
    }

    fn leg_mut(&mut self, leg: Leg) -> &mut PlacedOrder {
        match leg {
            Leg::TakeProfit => &mut self.take_profit,
            Leg::StopLoss => &mut self.stop_loss,
        }
    }

    /// Move to `next`; illegal transitions are logged and ignored
    pub fn advance(&mut self, next: OcoState) -> bool {
        if !self.state.can_transition_to(next) {
            error!("Illegal OCO transition {:?} -> {:?}", self.state, next);
            debug_assert!(false, "illegal OCO transition {:?} -> {:?}", self.state, next);
            return false;
        }
        debug!("OCO state {:?} -> {:?}", self.state, next);
        self.state = next;
        true
    }

    fn set_status(&mut self, leg: Leg, status: OrderStatus) {
        self.leg_mut(leg).status = status;
    }

    fn order_ids(&self) -> (OrderId, OrderId) {
        (
            self.take_profit.order_id.clone(),
            self.stop_loss.order_id.clone(),
        )
    }

    fn into_result(self, winner: Leg, loser_cancel: CancelOutcome, ticks: u64) -> OcoResult {
        let (winner_order, loser_order) = match winner {
            Leg::TakeProfit => (self.take_profit, self.stop_loss),
            Leg::StopLoss => (self.stop_loss, self.take_profit),
        };
        OcoResult {
            winner_order,
            loser_order,
            resolution: winner.into(),
            loser_cancel,
            ticks,
        }
    }
}

/// Raw user input for an OCO order
#[derive(Debug, Clone)]
pub struct OcoRequest {
    pub symbol: String,
    pub side: String,
    pub quantity: String,
    pub take_profit_price: String,
    pub stop_price: String,
    pub stop_limit_price: String,
}

impl OcoRequest {
    pub fn new(
        symbol: impl Into<String>,
        side: impl Into<String>,
        quantity: impl Into<String>,
        take_profit_price: impl Into<String>,
        stop_price: impl Into<String>,
        stop_limit_price: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side: side.into(),
            quantity: quantity.into(),
            take_profit_price: take_profit_price.into(),
            stop_price: stop_price.into(),
            stop_limit_price: stop_limit_price.into(),
        }
    }

    /// Validate every field and build the take-profit and stop-loss intents
    pub fn validate(&self, validator: &Validator) -> Result<(OrderIntent, OrderIntent), ValidationError> {
        let symbol = validator.validate_symbol(&self.symbol)?;
        let quantity = validator.validate_quantity(&self.quantity)?;
        let take_profit = validator.validate_price(&self.take_profit_price)?;
        let stop = validator.validate_price(&self.stop_price)?;
        let stop_limit = validator.validate_price(&self.stop_limit_price)?;
        let side = validator.validate_side(&self.side)?;

        let tp_intent = OrderIntent::new(
            symbol.clone(),
            side,
            quantity,
            OrderKind::TakeProfit {
                trigger_price: take_profit,
                limit_price: take_profit,
            },
        );
        let sl_intent = OrderIntent::new(
            symbol,
            side,
            quantity,
            OrderKind::StopLimit {
                trigger_price: stop,
                limit_price: stop_limit,
            },
        );
        Ok((tp_intent, sl_intent))
    }
}

/// Which leg filled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    #[serde(rename = "FILLED_TP")]
    FilledTakeProfit,
    #[serde(rename = "FILLED_SL")]
    FilledStopLoss,
}

impl From<Leg> for Resolution {
    fn from(leg: Leg) -> Self {
        match leg {
            Leg::TakeProfit => Resolution::FilledTakeProfit,
            Leg::StopLoss => Resolution::FilledStopLoss,
        }
    }
}

/// Result of the cancel sent to an order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CancelOutcome {
    Canceled,
    /// The order was already terminal when the cancel arrived
    AlreadyClosed { status: OrderStatus },
    Failed { reason: String },
}

impl fmt::Display for CancelOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelOutcome::Canceled => f.write_str("canceled"),
            CancelOutcome::AlreadyClosed { status } => write!(f, "already {}", status),
            CancelOutcome::Failed { reason } => write!(f, "cancel failed ({})", reason),
        }
    }
}

/// Successful OCO resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcoResult {
    pub winner_order: PlacedOrder,
    pub loser_order: PlacedOrder,
    pub resolution: Resolution,
    pub loser_cancel: CancelOutcome,
    /// Number of polling ticks it took
    pub ticks: u64,
}

/// Step at which an OCO order failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcoStage {
    Validate,
    TakeProfitSubmit,
    StopLossSubmit,
    Poll,
    Monitor,
}

impl fmt::Display for OcoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OcoStage::Validate => "validate",
            OcoStage::TakeProfitSubmit => "tp-submit",
            OcoStage::StopLossSubmit => "sl-submit",
            OcoStage::Poll => "poll",
            OcoStage::Monitor => "monitor",
        };
        f.write_str(s)
    }
}

/// Why monitoring stopped before a leg filled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Cancelled,
    TimedOut,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Cancelled => f.write_str("cancelled by caller"),
            AbortReason::TimedOut => f.write_str("timed out"),
        }
    }
}

/// Errors that can occur while placing or monitoring an OCO order
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OcoError {
    #[error("OCO validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Take-profit leg submission failed: {0}")]
    TakeProfitSubmit(GatewayError),

    #[error("Stop-loss leg submission failed: {source}; take-profit {take_profit_id} rollback: {rollback}")]
    StopLossSubmit {
        source: GatewayError,
        take_profit_id: OrderId,
        rollback: CancelOutcome,
    },

    #[error("Status polling failed: {source}; tp={take_profit_id} sl={stop_loss_id} left open for manual cleanup")]
    Poll {
        source: GatewayError,
        take_profit_id: OrderId,
        stop_loss_id: OrderId,
    },

    #[error("Both legs closed without a fill: tp={take_profit} sl={stop_loss}")]
    LegsClosed {
        take_profit: OrderStatus,
        stop_loss: OrderStatus,
    },

    #[error("Monitoring {reason}; tp={take_profit_id} sl={stop_loss_id} left open for manual cleanup")]
    Aborted {
        reason: AbortReason,
        take_profit_id: OrderId,
        stop_loss_id: OrderId,
    },
}

impl OcoError {
    pub fn stage(&self) -> OcoStage {
        match self {
            OcoError::Validation(_) => OcoStage::Validate,
            OcoError::TakeProfitSubmit(_) => OcoStage::TakeProfitSubmit,
            OcoError::StopLossSubmit { .. } => OcoStage::StopLossSubmit,
            OcoError::Poll { .. } => OcoStage::Poll,
            OcoError::LegsClosed { .. } | OcoError::Aborted { .. } => OcoStage::Monitor,
        }
    }

    /// Orders still open on the venue that the caller has to clean up
    pub fn open_orders(&self) -> Vec<&OrderId> {
        match self {
            OcoError::Poll {
                take_profit_id,
                stop_loss_id,
                ..
            }
            | OcoError::Aborted {
                take_profit_id,
                stop_loss_id,
                ..
            } => vec![take_profit_id, stop_loss_id],
            OcoError::StopLossSubmit {
                take_profit_id,
                rollback: CancelOutcome::Failed { .. },
                ..
            } => vec![take_profit_id],
            _ => Vec::new(),
        }
    }
}

/// Outcome of one polling tick
enum Tick {
    Pending,
    Resolved(Leg),
    Closed(OrderStatus, OrderStatus),
}

/// Places and monitors synthetic OCO orders through a gateway
pub struct OcoCoordinator<'a, G: OrderGateway + ?Sized> {
    gateway: &'a G,
    validator: Validator,
    config: OcoConfig,
}

impl<'a, G: OrderGateway + ?Sized> OcoCoordinator<'a, G> {
    pub fn new(gateway: &'a G, validator: Validator, config: OcoConfig) -> Self {
        Self {
            gateway,
            validator,
            config,
        }
    }

    /// Place both legs and block until one fills, monitoring is stopped, or it fails.
    ///
    /// Cancelling `cancel` (or hitting the configured timeout) stops polling without
    /// canceling any order.
    pub async fn place(&self, request: &OcoRequest, cancel: &CancellationToken) -> Result<OcoResult, OcoError> {
        let (tp_intent, sl_intent) = request.validate(&self.validator)?;

        info!(
            "OCO {} -> {} | qty={}, TP={}, Stop={}, SL={}",
            tp_intent.side,
            tp_intent.symbol,
            tp_intent.quantity,
            request.take_profit_price,
            request.stop_price,
            request.stop_limit_price
        );

        let take_profit = match self.gateway.submit_order(&tp_intent).await {
            Ok(order) => order,
            Err(e) => {
                error!("OCO take-profit submission failed: {} | {}", e, tp_intent.log_fields());
                return Err(OcoError::TakeProfitSubmit(e));
            }
        };

        let stop_loss = match self.gateway.submit_order(&sl_intent).await {
            Ok(order) => order,
            Err(e) => {
                error!("OCO stop-loss submission failed: {} | {}", e, sl_intent.log_fields());
                let rollback = self.cancel_leg(&take_profit).await;
                if let CancelOutcome::Failed { reason } = &rollback {
                    error!(
                        "Orphaned take-profit order: order_id={} symbol={} ({})",
                        take_profit.order_id, take_profit.intent.symbol, reason
                    );
                } else {
                    info!("Rolled back take-profit order {}: {}", take_profit.order_id, rollback);
                }
                return Err(OcoError::StopLossSubmit {
                    source: e,
                    take_profit_id: take_profit.order_id,
                    rollback,
                });
            }
        };

        info!(
            "OCO Orders Placed: TP={}, SL={}",
            take_profit.order_id, stop_loss.order_id
        );
        let mut pair = OcoPair::new(take_profit, stop_loss);
        pair.advance(OcoState::Monitoring);

        self.monitor(pair, cancel).await
    }

    async fn monitor(&self, mut pair: OcoPair, cancel: &CancellationToken) -> Result<OcoResult, OcoError> {
        let period = self.config.poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        // A timeout too far out to represent is the same as no deadline
        let deadline = self.config.timeout.and_then(|t| Instant::now().checked_add(t));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        info!("Monitoring orders (OCO behavior), poll every {}ms", period.as_millis());

        loop {
            if let Err(reason) = interruptible(ticker.tick(), cancel, deadline).await {
                return Err(self.abort(&mut pair, reason));
            }
            ticks += 1;

            let polled = match interruptible(self.poll_legs(&pair), cancel, deadline).await {
                Ok(polled) => polled,
                Err(reason) => return Err(self.abort(&mut pair, reason)),
            };
            let (tp_status, sl_status) = match polled {
                Ok(statuses) => statuses,
                Err(e) => {
                    let (take_profit_id, stop_loss_id) = pair.order_ids();
                    error!(
                        "OCO polling failed: {} | tp={} sl={} left open",
                        e, take_profit_id, stop_loss_id
                    );
                    pair.advance(OcoState::Failed);
                    return Err(OcoError::Poll {
                        source: e,
                        take_profit_id,
                        stop_loss_id,
                    });
                }
            };

            pair.set_status(Leg::TakeProfit, tp_status);
            pair.set_status(Leg::StopLoss, sl_status);
            debug!("OCO tick {}: tp={} sl={}", ticks, tp_status, sl_status);

            match evaluate(tp_status, sl_status) {
                Tick::Pending => continue,
                Tick::Resolved(winner) => return Ok(self.resolve(pair, winner, ticks).await),
                Tick::Closed(take_profit, stop_loss) => {
                    warn!(
                        "OCO legs closed without a fill: tp={} sl={}",
                        take_profit, stop_loss
                    );
                    pair.advance(OcoState::Failed);
                    return Err(OcoError::LegsClosed {
                        take_profit,
                        stop_loss,
                    });
                }
            }
        }
    }

    /// Query take-profit then stop-loss, each with bounded retries
    async fn poll_legs(&self, pair: &OcoPair) -> Result<(OrderStatus, OrderStatus), GatewayError> {
        let tp = self.query_leg(pair.leg(Leg::TakeProfit)).await?;
        let sl = self.query_leg(pair.leg(Leg::StopLoss)).await?;
        Ok((tp, sl))
    }

    async fn query_leg(&self, order: &PlacedOrder) -> Result<OrderStatus, GatewayError> {
        let label = format!("Query order {}", order.order_id);
        with_retry(&self.config.query_retry, &label, || {
            self.gateway.query_order(&order.intent.symbol, &order.order_id)
        })
        .await
    }

    /// Cancel the losing leg once and close the pair
    async fn resolve(&self, mut pair: OcoPair, winner: Leg, ticks: u64) -> OcoResult {
        let loser = winner.other();
        if winner == Leg::TakeProfit && pair.leg(Leg::StopLoss).status == OrderStatus::Filled {
            warn!("Both OCO legs reported FILLED in the same poll, resolving as take-profit");
        }

        pair.advance(OcoState::Resolved { winner });
        info!("{} executed. Cancelling {}.", winner, loser);

        let loser_cancel = self.cancel_leg(pair.leg(loser)).await;
        match &loser_cancel {
            CancelOutcome::Canceled => pair.set_status(loser, OrderStatus::Canceled),
            CancelOutcome::AlreadyClosed { status } => pair.set_status(loser, *status),
            CancelOutcome::Failed { .. } => {}
        }

        pair.advance(OcoState::Terminated);
        info!(
            "OCO resolved: resolution={:?} winner={} loser={} loser_cancel={} ticks={}",
            Resolution::from(winner),
            pair.leg(winner).order_id,
            pair.leg(loser).order_id,
            loser_cancel,
            ticks
        );

        pair.into_result(winner, loser_cancel, ticks)
    }

    /// Single best-effort cancel; failures are reported, never retried
    async fn cancel_leg(&self, order: &PlacedOrder) -> CancelOutcome {
        match self
            .gateway
            .cancel_order(&order.intent.symbol, &order.order_id)
            .await
        {
            Ok(ack) if ack.canceled => CancelOutcome::Canceled,
            Ok(ack) => CancelOutcome::AlreadyClosed { status: ack.status },
            Err(e) => {
                warn!(
                    "Cancel failed: order_id={} symbol={} error={}",
                    order.order_id, order.intent.symbol, e
                );
                CancelOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn abort(&self, pair: &mut OcoPair, reason: AbortReason) -> OcoError {
        let (take_profit_id, stop_loss_id) = pair.order_ids();
        warn!(
            "OCO monitoring {}: tp={} sl={} left open, cancel them manually if needed",
            reason, take_profit_id, stop_loss_id
        );
        pair.advance(OcoState::Failed);
        OcoError::Aborted {
            reason,
            take_profit_id,
            stop_loss_id,
        }
    }
}

/// Take-profit wins when both legs filled in the same poll
fn evaluate(take_profit: OrderStatus, stop_loss: OrderStatus) -> Tick {
    if take_profit.is_filled() {
        Tick::Resolved(Leg::TakeProfit)
    } else if stop_loss.is_filled() {
        Tick::Resolved(Leg::StopLoss)
    } else if take_profit.is_terminal() && stop_loss.is_terminal() {
        Tick::Closed(take_profit, stop_loss)
    } else {
        Tick::Pending
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Run `fut` unless the caller cancels or the deadline passes first
async fn interruptible<F: Future>(
    fut: F,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<F::Output, AbortReason> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AbortReason::Cancelled),
        _ = wait_until(deadline) => Err(AbortReason::TimedOut),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;
    use crate::order::Side;

    const TP: usize = 0;
    const SL: usize = 1;

    fn request() -> OcoRequest {
        OcoRequest::new("btcusdt", "sell", "0.01", "45000", "40000", "39900")
    }

    fn config() -> OcoConfig {
        OcoConfig {
            poll_interval: Duration::from_secs(1),
            timeout: None,
            query_retry: RetryPolicy::new(3, Duration::from_millis(50)),
        }
    }

    async fn place(gateway: &MockGateway, config: OcoConfig) -> Result<OcoResult, OcoError> {
        let coordinator = OcoCoordinator::new(gateway, Validator::default(), config);
        coordinator.place(&request(), &CancellationToken::new()).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_take_profit_fill_cancels_stop_once() {
        let gateway = MockGateway::new();
        gateway
            .script_statuses(TP, vec![OrderStatus::New, OrderStatus::New, OrderStatus::Filled])
            .await;

        let result = place(&gateway, config()).await.unwrap();

        assert_eq!(result.resolution, Resolution::FilledTakeProfit);
        assert_eq!(result.ticks, 3);
        assert_eq!(result.winner_order.order_id, MockGateway::order_id(TP));
        assert_eq!(result.winner_order.status, OrderStatus::Filled);
        assert_eq!(result.loser_order.order_id, MockGateway::order_id(SL));
        assert_eq!(result.loser_order.status, OrderStatus::Canceled);
        assert_eq!(result.loser_cancel, CancelOutcome::Canceled);

        assert_eq!(gateway.cancel_calls.lock().await.len(), 1);
        assert_eq!(gateway.cancels_for(&MockGateway::order_id(SL)).await, 1);
        assert_eq!(gateway.cancels_for(&MockGateway::order_id(TP)).await, 0);
        assert_eq!(gateway.query_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_legs_submitted_as_conditional_orders() {
        let gateway = MockGateway::new();
        gateway.script_statuses(TP, vec![OrderStatus::Filled]).await;

        place(&gateway, config()).await.unwrap();

        let submissions = gateway.submissions.lock().await;
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0].symbol.as_str(), "BTCUSDT");
        assert_eq!(submissions[0].side, Side::Sell);
        assert_eq!(submissions[0].kind.venue_type(), "TAKE_PROFIT");
        assert_eq!(submissions[0].kind.trigger_price(), Some(45000.0));
        assert_eq!(submissions[0].kind.limit_price(), Some(45000.0));
        assert_eq!(submissions[1].kind.venue_type(), "STOP");
        assert_eq!(submissions[1].kind.trigger_price(), Some(40000.0));
        assert_eq!(submissions[1].kind.limit_price(), Some(39900.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_loss_fill_cancels_take_profit() {
        let gateway = MockGateway::new();
        gateway
            .script_statuses(SL, vec![OrderStatus::New, OrderStatus::Filled])
            .await;

        let result = place(&gateway, config()).await.unwrap();

        assert_eq!(result.resolution, Resolution::FilledStopLoss);
        assert_eq!(result.winner_order.order_id, MockGateway::order_id(SL));
        assert_eq!(gateway.cancels_for(&MockGateway::order_id(TP)).await, 1);
        assert_eq!(gateway.cancels_for(&MockGateway::order_id(SL)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_poll_double_fill_resolves_take_profit() {
        let gateway = MockGateway::new();
        let script = vec![OrderStatus::New, OrderStatus::New, OrderStatus::Filled];
        gateway.script_statuses(TP, script.clone()).await;
        gateway.script_statuses(SL, script).await;

        let result = place(&gateway, config()).await.unwrap();

        assert_eq!(result.resolution, Resolution::FilledTakeProfit);
        assert_eq!(gateway.cancels_for(&MockGateway::order_id(SL)).await, 1);
        assert_eq!(
            result.loser_cancel,
            CancelOutcome::AlreadyClosed {
                status: OrderStatus::Filled
            }
        );
        assert_eq!(result.loser_order.status, OrderStatus::Filled);
    }

    #[tokio::test]
    async fn test_validation_failure_submits_nothing() {
        let gateway = MockGateway::new();
        let coordinator = OcoCoordinator::new(&gateway, Validator::default(), config());

        let bad_symbol = OcoRequest::new("BTCBUSD", "SELL", "0.01", "45000", "40000", "39900");
        let err = coordinator
            .place(&bad_symbol, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.stage(), OcoStage::Validate);
        assert!(matches!(
            err,
            OcoError::Validation(ValidationError::InvalidSymbol { .. })
        ));

        let bad_stop = OcoRequest::new("BTCUSDT", "SELL", "0.01", "45000", "-1", "39900");
        let err = coordinator
            .place(&bad_stop, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            OcoError::Validation(ValidationError::InvalidPrice("-1".into()))
        );

        // Symbol is checked before side
        let both_bad = OcoRequest::new("BTCBUSD", "HOLD", "0.01", "45000", "40000", "39900");
        let err = coordinator
            .place(&both_bad, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OcoError::Validation(ValidationError::InvalidSymbol { .. })
        ));

        assert!(gateway.submissions.lock().await.is_empty());
        assert!(gateway.cancel_calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_take_profit_submit_failure_places_nothing_else() {
        let gateway = MockGateway::new();
        gateway.fail_submission(TP).await;

        let err = place(&gateway, config()).await.unwrap_err();

        assert_eq!(err.stage(), OcoStage::TakeProfitSubmit);
        assert!(gateway.submissions.lock().await.is_empty());
        assert!(gateway.cancel_calls.lock().await.is_empty());
        assert_eq!(gateway.query_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_submit_failure_rolls_back_take_profit() {
        let gateway = MockGateway::new();
        gateway.fail_submission(SL).await;

        let err = place(&gateway, config()).await.unwrap_err();

        assert_eq!(err.stage(), OcoStage::StopLossSubmit);
        match &err {
            OcoError::StopLossSubmit {
                take_profit_id,
                rollback,
                ..
            } => {
                assert_eq!(*take_profit_id, MockGateway::order_id(TP));
                assert_eq!(*rollback, CancelOutcome::Canceled);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.open_orders().is_empty());
        assert_eq!(gateway.cancels_for(&MockGateway::order_id(TP)).await, 1);
        assert_eq!(gateway.query_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_rollback_reports_orphan() {
        let gateway = MockGateway::new();
        gateway.fail_submission(SL).await;
        gateway
            .set_cancel_error(GatewayError::Network("connection reset".into()))
            .await;

        let err = place(&gateway, config()).await.unwrap_err();

        assert!(matches!(
            &err,
            OcoError::StopLossSubmit {
                rollback: CancelOutcome::Failed { .. },
                ..
            }
        ));
        assert_eq!(err.open_orders(), vec![&MockGateway::order_id(TP)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_cancellation_leaves_orders_open() {
        let gateway = MockGateway::new();
        let coordinator = OcoCoordinator::new(&gateway, Validator::default(), config());
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            canceller.cancel();
        });

        let err = coordinator.place(&request(), &token).await.unwrap_err();

        assert_eq!(
            err,
            OcoError::Aborted {
                reason: AbortReason::Cancelled,
                take_profit_id: MockGateway::order_id(TP),
                stop_loss_id: MockGateway::order_id(SL),
            }
        );
        assert_eq!(err.stage(), OcoStage::Monitor);
        assert_eq!(err.open_orders().len(), 2);
        assert_eq!(gateway.query_count(), 4);
        assert!(gateway.cancel_calls.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_orders_open() {
        let gateway = MockGateway::new();
        let config = OcoConfig {
            timeout: Some(Duration::from_millis(3500)),
            ..config()
        };

        let err = place(&gateway, config).await.unwrap_err();

        assert!(matches!(
            err,
            OcoError::Aborted {
                reason: AbortReason::TimedOut,
                ..
            }
        ));
        assert_eq!(gateway.query_count(), 6);
        assert!(gateway.cancel_calls.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_during_query_retries_leaves_orders_open() {
        let gateway = MockGateway::new();
        gateway.fail_queries(TP, 100).await;
        let config = OcoConfig {
            timeout: Some(Duration::from_millis(2500)),
            query_retry: RetryPolicy::new(5, Duration::from_secs(1)),
            ..config()
        };

        let err = place(&gateway, config).await.unwrap_err();

        assert_eq!(
            err,
            OcoError::Aborted {
                reason: AbortReason::TimedOut,
                take_profit_id: MockGateway::order_id(TP),
                stop_loss_id: MockGateway::order_id(SL),
            }
        );
        // First tick at 1s, one retry at 2s, the next retry would land after the deadline
        assert_eq!(gateway.query_count(), 2);
        assert!(gateway.cancel_calls.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_timeout_means_no_deadline() {
        let gateway = MockGateway::new();
        gateway
            .script_statuses(TP, vec![OrderStatus::New, OrderStatus::Filled])
            .await;
        let config = OcoConfig {
            timeout: Some(Duration::from_secs(u64::MAX)),
            ..config()
        };

        let result = place(&gateway, config).await.unwrap();

        assert_eq!(result.resolution, Resolution::FilledTakeProfit);
        assert_eq!(gateway.cancels_for(&MockGateway::order_id(SL)).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_interval_is_clamped() {
        let gateway = MockGateway::new();
        gateway.script_statuses(TP, vec![OrderStatus::Filled]).await;
        let config = OcoConfig {
            poll_interval: Duration::from_secs(u64::MAX),
            ..config()
        };
        let start = Instant::now();

        let result = place(&gateway, config).await.unwrap();

        assert_eq!(result.ticks, 1);
        assert_eq!(start.elapsed(), MAX_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_query_failures_are_retried() {
        let gateway = MockGateway::new();
        gateway.fail_queries(TP, 2).await;
        gateway
            .script_statuses(TP, vec![OrderStatus::New, OrderStatus::Filled])
            .await;

        let result = place(&gateway, config()).await.unwrap();

        assert_eq!(result.resolution, Resolution::FilledTakeProfit);
        assert_eq!(result.ticks, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_query_failure_fails_poll_stage() {
        let gateway = MockGateway::new();
        gateway.fail_queries(SL, 10).await;

        let err = place(&gateway, config()).await.unwrap_err();

        assert_eq!(err.stage(), OcoStage::Poll);
        assert!(matches!(
            err,
            OcoError::Poll {
                source: GatewayError::RetriesExhausted { attempts: 3, .. },
                ..
            }
        ));
        assert!(gateway.cancel_calls.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_legs_closed_without_fill() {
        let gateway = MockGateway::new();
        gateway.script_statuses(TP, vec![OrderStatus::Expired]).await;
        gateway.script_statuses(SL, vec![OrderStatus::Rejected]).await;

        let err = place(&gateway, config()).await.unwrap_err();

        assert_eq!(
            err,
            OcoError::LegsClosed {
                take_profit: OrderStatus::Expired,
                stop_loss: OrderStatus::Rejected,
            }
        );
        assert!(gateway.cancel_calls.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_leg_closed_keeps_monitoring_other() {
        let gateway = MockGateway::new();
        gateway
            .script_statuses(TP, vec![OrderStatus::Expired])
            .await;
        gateway
            .script_statuses(SL, vec![OrderStatus::New, OrderStatus::New, OrderStatus::Filled])
            .await;

        let result = place(&gateway, config()).await.unwrap();

        assert_eq!(result.resolution, Resolution::FilledStopLoss);
        assert_eq!(
            result.loser_cancel,
            CancelOutcome::AlreadyClosed {
                status: OrderStatus::Expired
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_failure_is_not_fatal() {
        let gateway = MockGateway::new();
        gateway.script_statuses(TP, vec![OrderStatus::Filled]).await;
        gateway
            .set_cancel_error(GatewayError::Rejected("unknown order".into()))
            .await;

        let result = place(&gateway, config()).await.unwrap();

        assert_eq!(result.resolution, Resolution::FilledTakeProfit);
        assert!(matches!(result.loser_cancel, CancelOutcome::Failed { .. }));
        assert_eq!(result.loser_order.status, OrderStatus::New);
        assert_eq!(gateway.cancels_for(&MockGateway::order_id(SL)).await, 1);
    }

    #[test]
    fn test_state_transitions() {
        assert!(OcoState::Pending.can_transition_to(OcoState::Monitoring));
        assert!(OcoState::Pending.can_transition_to(OcoState::Failed));
        assert!(OcoState::Monitoring.can_transition_to(OcoState::Resolved {
            winner: Leg::StopLoss
        }));
        assert!(OcoState::Resolved {
            winner: Leg::TakeProfit
        }
        .can_transition_to(OcoState::Terminated));

        assert!(!OcoState::Pending.can_transition_to(OcoState::Resolved {
            winner: Leg::TakeProfit
        }));
        assert!(!OcoState::Terminated.can_transition_to(OcoState::Monitoring));
        assert!(!OcoState::Failed.can_transition_to(OcoState::Monitoring));
        assert!(OcoState::Failed.is_final());
        assert!(!OcoState::Monitoring.is_final());
    }

    #[test]
    fn test_tie_break_prefers_take_profit() {
        assert!(matches!(
            evaluate(OrderStatus::Filled, OrderStatus::Filled),
            Tick::Resolved(Leg::TakeProfit)
        ));
        assert!(matches!(
            evaluate(OrderStatus::Canceled, OrderStatus::Filled),
            Tick::Resolved(Leg::StopLoss)
        ));
        assert!(matches!(
            evaluate(OrderStatus::PartiallyFilled, OrderStatus::New),
            Tick::Pending
        ));
    }
}
