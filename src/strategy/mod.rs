//! Order placement strategies
//!
//! Every strategy takes the gateway by reference, validates its raw inputs first and
//! returns a structured result. Printing is left to the caller.
//!
//! - [`single`] - market, limit and stop-limit orders
//! - [`oco`] - synthetic one-cancels-other pair with client-side monitoring
//! - [`grid`] - limit orders spread across a price range
//! - [`twap`] - market orders split over time

pub mod batch;
pub mod grid;
pub mod oco;
pub mod single;
pub mod twap;

pub use batch::{BatchFailure, BatchReport};
pub use grid::{place_grid_orders, GridPlan, GridRequest};
pub use oco::{
    AbortReason, CancelOutcome, OcoConfig, OcoCoordinator, OcoError, OcoRequest, OcoResult, OcoStage,
    Resolution,
};
pub use single::{place_limit_order, place_market_order, place_stop_limit_order};
pub use twap::{place_twap_orders, TwapPlan, TwapRequest};
