//! Product aggregate: variant stock model and status derivation.
//!
//! Sellability for a selection is governed by the *selected* variant's
//! stock, not the aggregate. The aggregate count is a summary (sum of
//! variant stocks when variants exist) and is recomputed on every write
//! so catalog badges and detail-page badges can never disagree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::events::{DomainEvent, ProductEvent};
use crate::domain::fulfillment::FulfillmentType;
use crate::domain::value_objects::Money;
use crate::EngineError;

/// Stock at or below this counts as "low" unless the product overrides it.
pub const DEFAULT_MIN_STOCK: i32 = 5;
/// Manufacturing lead time when the product does not specify one.
pub const DEFAULT_LEAD_TIME_DAYS: u32 = 7;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

/// Derives a stock badge from a raw count. This is the only place a
/// status may come from; statuses are never hand-authored per entity.
pub fn derive_status(stock: i32, min_stock: i32) -> StockStatus {
    if stock <= 0 {
        StockStatus::OutOfStock
    } else if stock <= min_stock {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// A named color option with its own stock and derived status.
/// Variant images, when present, replace the product gallery for that
/// selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColorVariant {
    pub name: String,
    pub hex: String,
    stock: i32,
    status: StockStatus,
    pub images: Vec<String>,
}

impl ColorVariant {
    pub fn new(name: impl Into<String>, hex: impl Into<String>, stock: i32) -> Self {
        Self {
            name: name.into(),
            hex: hex.into(),
            stock,
            status: derive_status(stock, DEFAULT_MIN_STOCK),
            images: vec![],
        }
    }

    pub fn stock(&self) -> i32 { self.stock }
    pub fn status(&self) -> StockStatus { self.status }
}

#[derive(Clone, Debug)]
pub struct Product {
    id: Uuid,
    name: String,
    category: String,
    price: Money,
    list_price: Option<Money>,
    stock: i32,
    stock_status: StockStatus,
    fulfillment_type: FulfillmentType,
    lead_time_days: u32,
    min_stock: i32,
    colors: Vec<ColorVariant>,
    images: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl Product {
    pub fn create(
        name: impl Into<String>,
        category: impl Into<String>,
        price: Money,
        fulfillment_type: FulfillmentType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            category: category.into(),
            price,
            list_price: None,
            stock: 0,
            stock_status: StockStatus::OutOfStock,
            fulfillment_type,
            lead_time_days: DEFAULT_LEAD_TIME_DAYS,
            min_stock: DEFAULT_MIN_STOCK,
            colors: vec![],
            images: vec![],
            created_at: now,
            updated_at: now,
            events: vec![],
        }
    }

    /// Rebuilds a product from persisted fields. Statuses are re-derived
    /// from the counts rather than trusted from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn hydrate(
        id: Uuid,
        name: String,
        category: String,
        price: Money,
        list_price: Option<Money>,
        stock: i32,
        fulfillment_type: FulfillmentType,
        lead_time_days: u32,
        min_stock: i32,
        colors: Vec<ColorVariant>,
        images: Vec<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut product = Self {
            id,
            name,
            category,
            price,
            list_price,
            stock,
            stock_status: StockStatus::OutOfStock,
            fulfillment_type,
            lead_time_days,
            min_stock,
            colors,
            images,
            created_at,
            updated_at,
            events: vec![],
        };
        product.recompute();
        product
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn category(&self) -> &str { &self.category }
    pub fn price(&self) -> &Money { &self.price }
    pub fn list_price(&self) -> Option<&Money> { self.list_price.as_ref() }
    pub fn stock(&self) -> i32 { self.stock }
    pub fn stock_status(&self) -> StockStatus { self.stock_status }
    pub fn fulfillment_type(&self) -> FulfillmentType { self.fulfillment_type }
    pub fn lead_time_days(&self) -> u32 { self.lead_time_days }
    pub fn min_stock(&self) -> i32 { self.min_stock }
    pub fn colors(&self) -> &[ColorVariant] { &self.colors }
    pub fn has_variants(&self) -> bool { !self.colors.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn update_price(&mut self, price: Money) {
        self.price = price;
        self.touch();
    }

    pub fn set_list_price(&mut self, list_price: Option<Money>) {
        self.list_price = list_price;
        self.touch();
    }

    pub fn set_lead_time_days(&mut self, days: u32) {
        self.lead_time_days = days;
        self.touch();
    }

    pub fn add_color_variant(&mut self, variant: ColorVariant) -> crate::Result<()> {
        if variant.stock < 0 {
            return Err(EngineError::InvalidStock(variant.stock));
        }
        if self.colors.iter().any(|c| c.name == variant.name) {
            return Err(EngineError::Unreachable(format!(
                "duplicate color variant '{}'",
                variant.name
            )));
        }
        self.colors.push(variant);
        self.recompute();
        self.touch();
        Ok(())
    }

    /// Sum of variant stocks when variants exist, else the product's own
    /// count.
    pub fn total_stock(&self) -> i32 {
        if self.colors.is_empty() {
            self.stock
        } else {
            self.colors.iter().map(|c| c.stock).sum()
        }
    }

    /// Admin edit of the aggregate count. For variant products the value
    /// is immediately overridden by the variant sum — the aggregate is
    /// informational there and the variant counts win.
    pub fn set_stock(&mut self, stock: i32) -> crate::Result<()> {
        if stock < 0 {
            return Err(EngineError::InvalidStock(stock));
        }
        self.stock = stock;
        self.recompute();
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::StockAdjusted {
            product_id: self.id,
            stock: self.stock,
            status: self.stock_status,
        }));
        Ok(())
    }

    /// Admin edit of one variant's count. Re-derives the variant status,
    /// the aggregate sum and the aggregate status; the caller must
    /// persist all of them in the same transaction.
    pub fn set_variant_stock(&mut self, name: &str, stock: i32) -> crate::Result<()> {
        if stock < 0 {
            return Err(EngineError::InvalidStock(stock));
        }
        let min_stock = self.min_stock;
        let variant = self
            .colors
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| EngineError::UnknownVariant(name.to_string()))?;
        variant.stock = stock;
        variant.status = derive_status(stock, min_stock);
        let status = variant.status;
        self.recompute();
        self.touch();
        self.raise_event(DomainEvent::Product(ProductEvent::VariantStockAdjusted {
            product_id: self.id,
            variant: name.to_string(),
            stock,
            status,
        }));
        Ok(())
    }

    /// Status governing sellability for a selection: the named variant's
    /// when variants exist, the aggregate's otherwise.
    pub fn selected_status(&self, color: Option<&str>) -> crate::Result<StockStatus> {
        if self.colors.is_empty() {
            return Ok(self.stock_status);
        }
        match color {
            Some(name) => self
                .colors
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.status)
                .ok_or_else(|| EngineError::UnknownVariant(name.to_string())),
            // No explicit selection on a variant product: the default
            // variant is the first one.
            None => Ok(self.colors[0].status),
        }
    }

    /// Gallery for a selection; a variant with images overrides the
    /// product default.
    pub fn gallery_for(&self, color: Option<&str>) -> &[String] {
        if let Some(name) = color {
            if let Some(variant) = self.colors.iter().find(|c| c.name == name) {
                if !variant.images.is_empty() {
                    return &variant.images;
                }
            }
        }
        &self.images
    }

    fn recompute(&mut self) {
        if !self.colors.is_empty() {
            for c in &mut self.colors {
                c.status = derive_status(c.stock, self.min_stock);
            }
            self.stock = self.colors.iter().map(|c| c.stock).sum();
        }
        self.stock_status = derive_status(self.stock, self.min_stock);
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn sofa() -> Product {
        Product::create(
            "Linen Sofa",
            "sofas",
            Money::inr(Decimal::new(42000, 0)),
            FulfillmentType::Hybrid,
        )
    }

    #[test]
    fn test_derive_status_boundaries() {
        assert_eq!(derive_status(0, 5), StockStatus::OutOfStock);
        assert_eq!(derive_status(-2, 5), StockStatus::OutOfStock);
        assert_eq!(derive_status(3, 5), StockStatus::LowStock);
        assert_eq!(derive_status(5, 5), StockStatus::LowStock);
        assert_eq!(derive_status(6, 5), StockStatus::InStock);
        assert_eq!(derive_status(10, 5), StockStatus::InStock);
    }

    #[test]
    fn test_aggregate_tracks_variant_sum() {
        let mut p = sofa();
        p.add_color_variant(ColorVariant::new("Black", "#111111", 4)).unwrap();
        p.add_color_variant(ColorVariant::new("Walnut", "#5b3a29", 8)).unwrap();
        assert_eq!(p.total_stock(), 12);
        assert_eq!(p.stock(), 12);

        p.set_variant_stock("Black", 0).unwrap();
        assert_eq!(p.total_stock(), 8);
        assert_eq!(p.stock(), 8);
        assert_eq!(p.selected_status(Some("Black")).unwrap(), StockStatus::OutOfStock);
        assert_eq!(p.selected_status(Some("Walnut")).unwrap(), StockStatus::InStock);
    }

    #[test]
    fn test_aggregate_edit_on_variant_product_is_overridden() {
        let mut p = sofa();
        p.add_color_variant(ColorVariant::new("Black", "#111111", 2)).unwrap();
        p.set_stock(50).unwrap();
        assert_eq!(p.stock(), 2); // variant sum wins
    }

    #[test]
    fn test_negative_stock_rejected() {
        let mut p = sofa();
        p.add_color_variant(ColorVariant::new("Black", "#111111", 2)).unwrap();
        assert!(matches!(p.set_stock(-1), Err(EngineError::InvalidStock(-1))));
        assert!(matches!(
            p.set_variant_stock("Black", -4),
            Err(EngineError::InvalidStock(-4))
        ));
        // rejected writes leave state intact
        assert_eq!(p.total_stock(), 2);
    }

    #[test]
    fn test_unknown_variant_rejected() {
        let mut p = sofa();
        p.add_color_variant(ColorVariant::new("Black", "#111111", 2)).unwrap();
        assert!(matches!(
            p.set_variant_stock("Teal", 5),
            Err(EngineError::UnknownVariant(_))
        ));
        assert!(matches!(
            p.selected_status(Some("Teal")),
            Err(EngineError::UnknownVariant(_))
        ));
    }

    #[test]
    fn test_non_variant_product_uses_own_stock() {
        let mut p = sofa();
        p.set_stock(3).unwrap();
        assert_eq!(p.total_stock(), 3);
        assert_eq!(p.stock_status(), StockStatus::LowStock);
        assert_eq!(p.selected_status(None).unwrap(), StockStatus::LowStock);
    }

    #[test]
    fn test_variant_gallery_override() {
        let mut p = sofa();
        let mut v = ColorVariant::new("Black", "#111111", 2);
        v.images = vec!["black-1.jpg".into()];
        p.add_color_variant(v).unwrap();
        p.add_color_variant(ColorVariant::new("Walnut", "#5b3a29", 2)).unwrap();
        assert_eq!(p.gallery_for(Some("Black")), ["black-1.jpg".to_string()]);
        // Walnut has no images of its own, falls back to the product gallery
        assert!(p.gallery_for(Some("Walnut")).is_empty());
    }

    #[test]
    fn test_stock_writes_raise_events() {
        let mut p = sofa();
        p.add_color_variant(ColorVariant::new("Black", "#111111", 2)).unwrap();
        p.set_variant_stock("Black", 9).unwrap();
        let events = p.take_events();
        assert_eq!(events.len(), 1);
        assert!(p.take_events().is_empty());
    }
}
