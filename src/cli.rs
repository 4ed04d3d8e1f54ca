//! Command-line interface
//!
//! One subcommand per strategy. Positional values are kept as raw strings so that
//! the validators see exactly what the user typed.

use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::config::{Credentials, Settings};
use crate::errors::Result;
use crate::gateway::{OrderGateway, PaperGateway};
use crate::logging::init_logging;
use crate::order::PlacedOrder;
use crate::strategy::{
    place_grid_orders, place_limit_order, place_market_order, place_stop_limit_order, place_twap_orders,
    BatchReport, GridPlan, GridRequest, OcoCoordinator, OcoRequest, OcoResult, TwapPlan, TwapRequest,
};

/// Futures order bot: single orders, synthetic OCO, grid and TWAP
#[derive(Parser, Debug)]
#[command(name = "order-bot", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file, optional
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: String,

    /// Stop OCO monitoring after this many seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Place a MARKET order
    #[command(allow_negative_numbers = true)]
    Market {
        symbol: String,
        side: String,
        quantity: String,
    },

    /// Place a GTC LIMIT order
    #[command(allow_negative_numbers = true)]
    Limit {
        symbol: String,
        side: String,
        quantity: String,
        price: String,
    },

    /// Place a STOP-LIMIT order
    #[command(allow_negative_numbers = true)]
    StopLimit {
        symbol: String,
        side: String,
        quantity: String,
        stop_price: String,
        limit_price: String,
    },

    /// Place a take-profit and a stop-loss; the first to fill cancels the other
    #[command(allow_negative_numbers = true)]
    Oco {
        symbol: String,
        side: String,
        quantity: String,
        take_profit_price: String,
        stop_price: String,
        stop_limit_price: String,
    },

    /// Spread LIMIT orders evenly between two prices
    #[command(allow_negative_numbers = true)]
    Grid {
        symbol: String,
        side: String,
        total_quantity: String,
        lower_price: String,
        upper_price: String,
        grids: String,
    },

    /// Split a quantity into MARKET orders placed at a fixed interval
    #[command(allow_negative_numbers = true)]
    Twap {
        symbol: String,
        side: String,
        total_quantity: String,
        parts: String,
        interval_seconds: String,
    },
}

/// Load configuration and credentials, build the venue and run the command
pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::new(Some(cli.config.as_str()))?;
    init_logging(&settings.log)?;

    info!("Starting order-bot v{}", env!("CARGO_PKG_VERSION"));
    let credentials = Credentials::from_env()?;
    let gateway = PaperGateway::new(&credentials, settings.paper.prices.clone());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping");
            on_signal.cancel();
        }
    });

    execute(&cli.command, &gateway, &settings, cli.timeout, &cancel).await
}

/// Run one command against `gateway` and print its outcome
pub async fn execute<G: OrderGateway + ?Sized>(
    command: &Command,
    gateway: &G,
    settings: &Settings,
    timeout: Option<u64>,
    cancel: &CancellationToken,
) -> Result<()> {
    let validator = settings.validator();

    match command {
        Command::Market {
            symbol,
            side,
            quantity,
        } => {
            let order = place_market_order(gateway, &validator, symbol, side, quantity).await?;
            print_order("Market", &order);
        }
        Command::Limit {
            symbol,
            side,
            quantity,
            price,
        } => {
            let order = place_limit_order(gateway, &validator, symbol, side, quantity, price).await?;
            print_order("Limit", &order);
        }
        Command::StopLimit {
            symbol,
            side,
            quantity,
            stop_price,
            limit_price,
        } => {
            let order =
                place_stop_limit_order(gateway, &validator, symbol, side, quantity, stop_price, limit_price)
                    .await?;
            print_order("Stop-limit", &order);
        }
        Command::Oco {
            symbol,
            side,
            quantity,
            take_profit_price,
            stop_price,
            stop_limit_price,
        } => {
            let request = OcoRequest::new(
                symbol,
                side,
                quantity,
                take_profit_price,
                stop_price,
                stop_limit_price,
            );
            let coordinator = OcoCoordinator::new(gateway, validator, settings.oco.to_oco_config(timeout));
            let result = coordinator.place(&request, cancel).await?;
            print_oco(&result);
        }
        Command::Grid {
            symbol,
            side,
            total_quantity,
            lower_price,
            upper_price,
            grids,
        } => {
            let request = GridRequest {
                symbol: symbol.clone(),
                side: side.clone(),
                total_quantity: total_quantity.clone(),
                lower_price: lower_price.clone(),
                upper_price: upper_price.clone(),
                grids: grids.clone(),
            };
            let plan = GridPlan::new(&request, &validator, settings.batch.price_decimals)?;
            let report = place_grid_orders(gateway, &plan).await;
            print_batch("Grid", &report);
            report.ensure_complete()?;
        }
        Command::Twap {
            symbol,
            side,
            total_quantity,
            parts,
            interval_seconds,
        } => {
            let request = TwapRequest {
                symbol: symbol.clone(),
                side: side.clone(),
                total_quantity: total_quantity.clone(),
                parts: parts.clone(),
                interval_secs: interval_seconds.clone(),
            };
            let plan = TwapPlan::new(&request, &validator)?;
            let report = place_twap_orders(gateway, &plan, cancel).await;
            print_batch("TWAP", &report);
            report.ensure_complete()?;
        }
    }

    Ok(())
}

fn print_order(label: &str, order: &PlacedOrder) {
    println!("{} order placed successfully!", label);
    println!("  order_id : {}", order.order_id);
    println!("  status   : {}", order.status);
    println!("  details  : {}", order.intent.log_fields());
}

fn print_oco(result: &OcoResult) {
    println!("OCO resolved: {:?}", result.resolution);
    println!(
        "  filled   : {} ({})",
        result.winner_order.order_id,
        result.winner_order.intent.kind.venue_type()
    );
    println!(
        "  other    : {} -> {}",
        result.loser_order.order_id, result.loser_cancel
    );
}

fn print_batch(label: &str, report: &BatchReport) {
    println!(
        "{}: {}/{} orders placed{}",
        label,
        report.placed.len(),
        report.requested,
        if report.stopped_early { " (stopped early)" } else { "" }
    );
    for order in &report.placed {
        println!("  placed {} {}", order.order_id, order.intent.log_fields());
    }
    for failure in &report.failures {
        println!("  failed #{}: {}", failure.index + 1, failure.error);
    }
}
