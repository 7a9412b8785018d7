//! Catalog integration events.
//!
//! Published by the catalog after its own commit succeeded; consumed by the
//! orders side.

use relay_core::Message;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct ProductCreated {
    pub product_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
}

impl Message for ProductCreated {}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPriceChanged {
    pub product_id: Uuid,
    pub old_price: Decimal,
    pub new_price: Decimal,
}

impl Message for ProductPriceChanged {}

#[derive(Debug, Clone, Serialize)]
pub struct ProductDeleted {
    pub product_id: Uuid,
}

impl Message for ProductDeleted {}
