//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::product::StockStatus;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// Subject the event is published under.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Product(ProductEvent::StockAdjusted { .. }) => "furnicart.stock.adjusted",
            Self::Product(ProductEvent::VariantStockAdjusted { .. }) => {
                "furnicart.stock.variant_adjusted"
            }
            Self::Order(OrderEvent::Placed { .. }) => "furnicart.order.placed",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductEvent {
    StockAdjusted {
        product_id: Uuid,
        stock: i32,
        status: StockStatus,
    },
    VariantStockAdjusted {
        product_id: Uuid,
        variant: String,
        stock: i32,
        status: StockStatus,
    },
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEvent {
    Placed {
        order_id: Uuid,
        order_number: String,
        total: Decimal,
    },
}
