//! relay demo: catalog and orders wired through the in-process event bus.
//!
//! The catalog commits its own change first and then publishes an integration
//! event; the orders side reacts without the catalog knowing it exists.

mod catalog;
mod config;
mod events;
mod orders;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use relay_core::impls::CollectingFailureSink;
use relay_core::{BusBuilder, HandlerError, PublishReport};
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::config::AppConfig;
use crate::events::{ProductCreated, ProductDeleted, ProductPriceChanged};
use crate::orders::{
    CancelOrdersForDeletedProduct, PendingOrders, RecalculatePendingOrders, TrackCatalogPrices,
};

#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Subscribe an extra ProductCreated handler that always fails
    #[arg(long)]
    fail_handler: bool,

    /// Override bus.publish_timeout_ms
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Override bus.max_concurrent_handlers
    #[arg(long)]
    max_concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut app_config = AppConfig::load().context("loading configuration")?;
    if let Some(ms) = args.timeout_ms {
        app_config.bus = app_config.bus.with_publish_timeout(Duration::from_millis(ms));
    }
    if let Some(limit) = args.max_concurrency {
        app_config.bus = app_config.bus.with_max_concurrent_handlers(limit);
    }
    info!(config = ?app_config.bus, "starting relay demo");

    // (A) orders side と failure sink
    let orders = Arc::new(PendingOrders::new());
    let failures = Arc::new(CollectingFailureSink::new());

    // (B) 起動時に配線。expect した型に handler がいなければ起動しない
    let mut builder = BusBuilder::new()
        .config(app_config.bus)
        .failure_sink(failures.clone())
        .subscribe::<ProductCreated, _>(TrackCatalogPrices::new(orders.clone()))
        .subscribe::<ProductPriceChanged, _>(TrackCatalogPrices::new(orders.clone()))
        .subscribe::<ProductPriceChanged, _>(RecalculatePendingOrders::new(orders.clone()))
        .subscribe::<ProductDeleted, _>(CancelOrdersForDeletedProduct::new(orders.clone()))
        .expect::<ProductCreated>()
        .expect::<ProductPriceChanged>()
        .expect::<ProductDeleted>();
    if args.fail_handler {
        builder = builder.subscribe_fn::<ProductCreated, _, _>(
            "audit.always-fails",
            |_msg, _cancel| async { Err::<(), _>(HandlerError::failed("audit store unavailable")) },
        );
    }
    let bus = builder.build()?;

    // (C) catalog 操作。結果は catalog 自身の commit だけで決まる
    let catalog = Catalog::new(bus.clone());

    let (keyboard, report) = catalog.create("Keyboard", dec!(49.90), 20).await?;
    print_report(&report)?;
    let (mouse, report) = catalog.create("Mouse", dec!(19.50), 50).await?;
    print_report(&report)?;

    let first = orders.place(keyboard.id, 2).await?;
    let second = orders.place(mouse.id, 3).await?;
    info!(order_id = %first.id, total = %first.total, "order placed");
    info!(order_id = %second.id, total = %second.total, "order placed");

    print_report(&catalog.change_price(keyboard.id, dec!(44.90)).await?)?;
    if let (Some(product), Some(order)) =
        (catalog.get(keyboard.id).await, orders.get(first.id).await)
    {
        info!(
            product_id = %product.id,
            price = %product.price,
            order_id = %order.id,
            total = %order.total,
            "order repriced"
        );
    }
    print_report(&catalog.delete(mouse.id).await?)?;

    // (D) 結果
    for order in orders.all().await {
        println!("{}", serde_json::to_string(&order)?);
    }
    for failure in failures.failures() {
        println!("{}", serde_json::to_string(&failure)?);
    }
    println!("{}", serde_json::to_string_pretty(&bus.counts())?);

    Ok(())
}

fn print_report(report: &PublishReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(report)?);
    Ok(())
}
