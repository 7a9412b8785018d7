//! Orders side: a pending-order store and the integration handlers that keep
//! it in step with the catalog.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::{CancellationToken, Handler, HandlerError};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::events::{ProductCreated, ProductDeleted, ProductPriceChanged};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: Uuid,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl Order {
    fn recompute_total(&mut self) {
        self.total = self
            .lines
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("product {0} is not orderable")]
    UnknownProduct(Uuid),
}

/// In-memory stand-in for the orders repository.
#[derive(Default)]
pub struct PendingOrders {
    orders: RwLock<HashMap<Uuid, Order>>,
    /// Last known catalog price per product, maintained from integration events.
    prices: RwLock<HashMap<Uuid, Decimal>>,
}

impl PendingOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn place(&self, product_id: Uuid, quantity: u32) -> Result<Order, OrderError> {
        let unit_price = *self
            .prices
            .read()
            .await
            .get(&product_id)
            .ok_or(OrderError::UnknownProduct(product_id))?;

        let mut order = Order {
            id: Uuid::new_v4(),
            status: OrderStatus::Pending,
            lines: vec![OrderLine {
                product_id,
                quantity,
                unit_price,
            }],
            total: Decimal::ZERO,
            cancel_reason: None,
        };
        order.recompute_total();
        self.orders.write().await.insert(order.id, order.clone());
        Ok(order)
    }

    pub async fn get(&self, order_id: Uuid) -> Option<Order> {
        self.orders.read().await.get(&order_id).cloned()
    }

    pub async fn all(&self) -> Vec<Order> {
        self.orders.read().await.values().cloned().collect()
    }

    async fn remember_price(&self, product_id: Uuid, price: Decimal) {
        self.prices.write().await.insert(product_id, price);
    }

    async fn forget_product(&self, product_id: Uuid) {
        self.prices.write().await.remove(&product_id);
    }

    /// Reprices pending lines of `product_id`. Returns how many orders changed.
    async fn reprice(&self, product_id: Uuid, new_price: Decimal) -> usize {
        let mut orders = self.orders.write().await;
        let mut changed = 0;
        for order in orders
            .values_mut()
            .filter(|order| order.status == OrderStatus::Pending)
        {
            let mut touched = false;
            for line in order
                .lines
                .iter_mut()
                .filter(|line| line.product_id == product_id)
            {
                line.unit_price = new_price;
                touched = true;
            }
            if touched {
                order.recompute_total();
                changed += 1;
            }
        }
        changed
    }

    /// Cancels pending orders that contain `product_id`.
    async fn cancel_containing(&self, product_id: Uuid) -> usize {
        let mut orders = self.orders.write().await;
        let mut cancelled = 0;
        for order in orders.values_mut().filter(|order| {
            order.status == OrderStatus::Pending
                && order.lines.iter().any(|line| line.product_id == product_id)
        }) {
            order.status = OrderStatus::Cancelled;
            order.cancel_reason = Some(format!("product {product_id} was deleted"));
            cancelled += 1;
        }
        cancelled
    }
}

/// Keeps the orderable-product price list in step with the catalog.
pub struct TrackCatalogPrices {
    orders: Arc<PendingOrders>,
}

impl TrackCatalogPrices {
    pub fn new(orders: Arc<PendingOrders>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl Handler<ProductCreated> for TrackCatalogPrices {
    async fn handle(
        &self,
        message: Arc<ProductCreated>,
        _cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        self.orders
            .remember_price(message.product_id, message.price)
            .await;
        debug!(product_id = %message.product_id, price = %message.price, "product is orderable");
        Ok(())
    }

    fn name(&self) -> &str {
        "orders.track-catalog-prices"
    }
}

#[async_trait]
impl Handler<ProductPriceChanged> for TrackCatalogPrices {
    async fn handle(
        &self,
        message: Arc<ProductPriceChanged>,
        _cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        self.orders
            .remember_price(message.product_id, message.new_price)
            .await;
        Ok(())
    }

    fn name(&self) -> &str {
        "orders.track-catalog-prices"
    }
}

/// Recomputes pending-order totals when a product's price changes.
pub struct RecalculatePendingOrders {
    orders: Arc<PendingOrders>,
}

impl RecalculatePendingOrders {
    pub fn new(orders: Arc<PendingOrders>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl Handler<ProductPriceChanged> for RecalculatePendingOrders {
    async fn handle(
        &self,
        message: Arc<ProductPriceChanged>,
        cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let changed = self
            .orders
            .reprice(message.product_id, message.new_price)
            .await;
        info!(
            product_id = %message.product_id,
            old_price = %message.old_price,
            new_price = %message.new_price,
            orders = changed,
            "pending orders repriced"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "orders.recalculate-pending"
    }
}

/// Cancels pending orders for a product that no longer exists.
pub struct CancelOrdersForDeletedProduct {
    orders: Arc<PendingOrders>,
}

impl CancelOrdersForDeletedProduct {
    pub fn new(orders: Arc<PendingOrders>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl Handler<ProductDeleted> for CancelOrdersForDeletedProduct {
    async fn handle(
        &self,
        message: Arc<ProductDeleted>,
        _cancel: CancellationToken,
    ) -> Result<(), HandlerError> {
        self.orders.forget_product(message.product_id).await;
        let cancelled = self.orders.cancel_containing(message.product_id).await;
        info!(product_id = %message.product_id, orders = cancelled, "pending orders cancelled");
        Ok(())
    }

    fn name(&self) -> &str {
        "orders.cancel-for-deleted-product"
    }
}
