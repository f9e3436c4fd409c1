//! Tail a live market-data feed and print a line per snapshot.
//!
//! ```bash
//! MARKET_SYNC_WS_URL=ws://localhost:8000/ws cargo run --example tail
//! ```
//!
//! Channels default to `depth,trades,positions,pnl`; override with
//! `MARKET_SYNC_CHANNELS`. Log verbosity follows `RUST_LOG`.

use market_sync::prelude::*;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

fn channels_from_env() -> Vec<String> {
    std::env::var("MARKET_SYNC_CHANNELS")
        .unwrap_or_else(|_| "depth,trades,positions,pnl".to_string())
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

fn describe(snap: &MarketSnapshot) -> String {
    let book = match (snap.depth.best_bid(), snap.depth.best_ask()) {
        (Some(bid), Some(ask)) => format!("{} / {}", bid.price, ask.price),
        _ => "no book".to_string(),
    };
    let last = snap
        .trades
        .latest()
        .map(|t| format!("{} x {} ({:?})", t.price, t.quantity, t.taker_side()))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "book {} | last {} | positions {} | upnl {}",
        book,
        last,
        snap.positions.len(),
        snap.positions
            .total_unrealized_pnl()
            .map_or_else(|| "overflow".to_string(), |pnl| pnl.to_string())
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing("info,market_sync=debug");

    let config = WsConfig::from_env()?;
    println!("Connecting to {}", config.url);

    let sync = MarketDataSync::new(config);
    sync.on_connection_state_change(|state| println!("[state] {}", state));
    sync.on_server_error(|err| eprintln!("[server] {}", err));
    sync.on_snapshot_change(|snap| println!("[snap]  {}", describe(snap)));

    sync.subscribe(channels_from_env());
    sync.start();

    tokio::signal::ctrl_c().await?;
    println!("Shutting down");
    sync.stop();

    Ok(())
}
