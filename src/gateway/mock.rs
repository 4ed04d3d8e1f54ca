//! Scriptable gateway for testing strategies without a venue.
//!
//! Orders are numbered by submission index (0-based, failed submissions included)
//! and receive ids of the form `mock-{index}`. Each order answers queries from a
//! status script; the last scripted status sticks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{CancelAck, GatewayError, OrderGateway};
use crate::order::{OrderId, OrderIntent, OrderStatus, PlacedOrder, Symbol};

/// Mock gateway for testing
#[derive(Default)]
pub struct MockGateway {
    pub submissions: Arc<Mutex<Vec<OrderIntent>>>,
    pub cancel_calls: Arc<Mutex<Vec<OrderId>>>,
    scripts: Arc<Mutex<HashMap<usize, VecDeque<OrderStatus>>>>,
    failing_submissions: Arc<Mutex<HashSet<usize>>>,
    query_failures: Arc<Mutex<HashMap<usize, u32>>>,
    cancel_error: Arc<Mutex<Option<GatewayError>>>,
    next_index: AtomicUsize,
    queries: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the order at submission `index` receives
    pub fn order_id(index: usize) -> OrderId {
        OrderId::new(format!("mock-{}", index))
    }

    /// Statuses returned by successive queries of order `index`
    pub async fn script_statuses(&self, index: usize, statuses: Vec<OrderStatus>) {
        self.scripts.lock().await.insert(index, statuses.into());
    }

    /// Make submission `index` fail with a venue rejection
    pub async fn fail_submission(&self, index: usize) {
        self.failing_submissions.lock().await.insert(index);
    }

    /// Make the next `count` queries of order `index` fail with a network error
    pub async fn fail_queries(&self, index: usize, count: u32) {
        self.query_failures.lock().await.insert(index, count);
    }

    /// Make every cancel call fail with `error`
    pub async fn set_cancel_error(&self, error: GatewayError) {
        *self.cancel_error.lock().await = Some(error);
    }

    /// Number of cancel calls received for an order
    pub async fn cancels_for(&self, order_id: &OrderId) -> usize {
        self.cancel_calls
            .lock()
            .await
            .iter()
            .filter(|id| *id == order_id)
            .count()
    }

    /// Total number of status queries served
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    fn index_of(order_id: &OrderId) -> Option<usize> {
        order_id.as_str().strip_prefix("mock-")?.parse().ok()
    }

    fn not_found(symbol: &Symbol, order_id: &OrderId) -> GatewayError {
        GatewayError::OrderNotFound {
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
        }
    }

    async fn current_status(&self, index: usize) -> OrderStatus {
        self.scripts
            .lock()
            .await
            .get(&index)
            .and_then(|s| s.front().copied())
            .unwrap_or(OrderStatus::New)
    }
}

#[async_trait]
impl OrderGateway for MockGateway {
    async fn submit_order(&self, intent: &OrderIntent) -> Result<PlacedOrder, GatewayError> {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        if self.failing_submissions.lock().await.contains(&index) {
            return Err(GatewayError::Rejected(format!("mock rejection of order {}", index)));
        }

        self.submissions.lock().await.push(intent.clone());
        Ok(PlacedOrder::new(
            Self::order_id(index),
            intent.clone(),
            OrderStatus::New,
        ))
    }

    async fn query_order(&self, symbol: &Symbol, order_id: &OrderId) -> Result<OrderStatus, GatewayError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        let index = Self::index_of(order_id).ok_or_else(|| Self::not_found(symbol, order_id))?;

        if let Some(remaining) = self.query_failures.lock().await.get_mut(&index) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(GatewayError::Network(format!("mock timeout querying {}", order_id)));
            }
        }

        let mut scripts = self.scripts.lock().await;
        let status = match scripts.get_mut(&index) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap_or(OrderStatus::New),
            Some(script) => script.front().copied().unwrap_or(OrderStatus::New),
            None => OrderStatus::New,
        };
        Ok(status)
    }

    async fn cancel_order(&self, symbol: &Symbol, order_id: &OrderId) -> Result<CancelAck, GatewayError> {
        self.cancel_calls.lock().await.push(order_id.clone());
        if let Some(error) = self.cancel_error.lock().await.clone() {
            return Err(error);
        }

        let index = Self::index_of(order_id).ok_or_else(|| Self::not_found(symbol, order_id))?;
        let status = self.current_status(index).await;
        if status.is_terminal() {
            return Ok(CancelAck {
                order_id: order_id.clone(),
                status,
                canceled: false,
            });
        }

        self.scripts
            .lock()
            .await
            .insert(index, VecDeque::from([OrderStatus::Canceled]));
        Ok(CancelAck {
            order_id: order_id.clone(),
            status: OrderStatus::Canceled,
            canceled: true,
        })
    }
}
