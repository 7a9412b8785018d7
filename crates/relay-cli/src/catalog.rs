use std::collections::HashMap;

use relay_core::{EventBus, PublishReport};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::events::{ProductCreated, ProductDeleted, ProductPriceChanged};

#[derive(Debug, Clone)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("product {0} not found")]
    NotFound(Uuid),

    #[error("price must be positive, got {0}")]
    InvalidPrice(Decimal),
}

/// Products side: owns its own store and announces committed changes on the bus.
///
/// The outcome of a catalog operation depends only on its own commit; the
/// returned `PublishReport` is informational.
pub struct Catalog {
    products: RwLock<HashMap<Uuid, Product>>,
    bus: EventBus,
}

impl Catalog {
    pub fn new(bus: EventBus) -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
            bus,
        }
    }

    pub async fn create(
        &self,
        name: impl Into<String>,
        price: Decimal,
        stock: u32,
    ) -> Result<(Product, PublishReport), CatalogError> {
        if price <= Decimal::ZERO {
            return Err(CatalogError::InvalidPrice(price));
        }
        let product = Product {
            id: Uuid::new_v4(),
            name: name.into(),
            price,
            stock,
        };
        self.products
            .write()
            .await
            .insert(product.id, product.clone());
        info!(product_id = %product.id, name = %product.name, "product created");

        let report = self
            .bus
            .publish(ProductCreated {
                product_id: product.id,
                name: product.name.clone(),
                price: product.price,
                stock: product.stock,
            })
            .await;
        Ok((product, report))
    }

    pub async fn change_price(
        &self,
        product_id: Uuid,
        new_price: Decimal,
    ) -> Result<PublishReport, CatalogError> {
        if new_price <= Decimal::ZERO {
            return Err(CatalogError::InvalidPrice(new_price));
        }
        let old_price = {
            let mut products = self.products.write().await;
            let product = products
                .get_mut(&product_id)
                .ok_or(CatalogError::NotFound(product_id))?;
            std::mem::replace(&mut product.price, new_price)
        };
        info!(product_id = %product_id, %old_price, %new_price, "price changed");

        Ok(self
            .bus
            .publish(ProductPriceChanged {
                product_id,
                old_price,
                new_price,
            })
            .await)
    }

    pub async fn delete(&self, product_id: Uuid) -> Result<PublishReport, CatalogError> {
        self.products
            .write()
            .await
            .remove(&product_id)
            .ok_or(CatalogError::NotFound(product_id))?;
        info!(product_id = %product_id, "product deleted");

        Ok(self.bus.publish(ProductDeleted { product_id }).await)
    }

    pub async fn get(&self, product_id: Uuid) -> Option<Product> {
        self.products.read().await.get(&product_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn create_succeeds_without_subscribers() {
        let catalog = Catalog::new(EventBus::new());
        let (product, report) = catalog.create("Cable", dec!(4.50), 100).await.unwrap();

        assert!(report.is_noop());
        assert_eq!(catalog.get(product.id).await.unwrap().price, dec!(4.50));
    }

    #[tokio::test]
    async fn change_price_of_unknown_product_fails_before_publishing() {
        let bus = EventBus::new();
        let catalog = Catalog::new(bus.clone());

        let err = catalog
            .change_price(Uuid::new_v4(), dec!(1.00))
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::NotFound(_)));
        assert_eq!(bus.counts().publishes, 0);
    }

    #[tokio::test]
    async fn rejects_non_positive_price() {
        let catalog = Catalog::new(EventBus::new());
        let err = catalog.create("Free", dec!(0), 1).await.unwrap_err();
        assert!(matches!(err, CatalogError::InvalidPrice(_)));
    }
}
