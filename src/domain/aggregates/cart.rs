//! Cart line registry.
//!
//! Line identity is the triple (product, selected color, fulfillment
//! mode). Same triple merges on add; a different color or a different
//! mode always yields a distinct line, because pricing and COD
//! eligibility are computed per mode downstream.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::product::Product;
use crate::domain::fulfillment::{self, FulfillmentMode};
use crate::domain::value_objects::{Money, Quantity};
use crate::EngineError;

/// Cart line identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: Uuid,
    pub color: Option<String>,
    pub mode: FulfillmentMode,
}

/// One cart line. Price-relevant product fields are snapshotted at add
/// time so a later catalog price change does not retroactively alter an
/// uncommitted cart.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub color: Option<String>,
    pub mode: FulfillmentMode,
    pub quantity: Quantity,
    pub name: String,
    pub unit_price: Money,
    pub list_price: Option<Money>,
    pub lead_time_days: u32,
}

impl CartLine {
    pub fn key(&self) -> LineKey {
        LineKey {
            product_id: self.product_id,
            color: self.color.clone(),
            mode: self.mode,
        }
    }

    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity.value())
    }

    fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.color == key.color && self.mode == key.mode
    }
}

/// Per-session shopping cart. Private to one shopper; never shared.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line_count(&self) -> usize { self.lines.len() }

    /// Adds a selection to the cart, resolving the fulfillment mode when
    /// the shopper did not pick one explicitly. Fails with `NotAddable`
    /// when the resolved mode is not sellable; a failed add leaves the
    /// cart untouched.
    pub fn add_line(
        &mut self,
        product: &Product,
        quantity: u32,
        color: Option<&str>,
        choice: Option<FulfillmentMode>,
    ) -> crate::Result<&CartLine> {
        let resolution = fulfillment::resolve_for(product, color, choice)?;
        if !resolution.addable {
            return Err(EngineError::NotAddable(format!(
                "'{}' is out of stock",
                product.name()
            )));
        }
        let key = LineKey {
            product_id: product.id(),
            color: color.map(str::to_string),
            mode: resolution.mode,
        };
        if let Some(idx) = self.lines.iter().position(|l| l.matches(&key)) {
            let line = &mut self.lines[idx];
            line.quantity = line.quantity.add(quantity);
            return Ok(&self.lines[idx]);
        }
        self.lines.push(CartLine {
            product_id: key.product_id,
            color: key.color,
            mode: key.mode,
            quantity: Quantity::clamped(quantity),
            name: product.name().to_string(),
            unit_price: product.price().clone(),
            list_price: product.list_price().cloned(),
            lead_time_days: product.lead_time_days(),
        });
        let idx = self.lines.len() - 1;
        Ok(&self.lines[idx])
    }

    /// Membership test. `None` mode matches any mode for that
    /// product+color, for UI badges that don't care which was chosen.
    pub fn is_in_cart(
        &self,
        product_id: Uuid,
        color: Option<&str>,
        mode: Option<FulfillmentMode>,
    ) -> bool {
        self.lines.iter().any(|l| {
            l.product_id == product_id
                && l.color.as_deref() == color
                && mode.map_or(true, |m| l.mode == m)
        })
    }

    /// Applies a signed quantity delta, clamped to 1..=100. Decrement
    /// stops at 1 — removal only happens via [`Cart::remove_line`].
    /// Returns false when no line matches the key.
    pub fn update_quantity(&mut self, key: &LineKey, delta: i32) -> bool {
        match self.lines.iter_mut().find(|l| l.matches(key)) {
            Some(line) => {
                line.quantity = line.quantity.adjust(delta);
                true
            }
            None => false,
        }
    }

    /// Explicit removal. Returns false when no line matches.
    pub fn remove_line(&mut self, key: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| !l.matches(key));
        self.lines.len() != before
    }

    /// Empties the registry. Called once, after a successful order
    /// submission.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::ColorVariant;
    use crate::domain::fulfillment::FulfillmentType;
    use rust_decimal::Decimal;

    fn hybrid_sofa() -> Product {
        let mut p = Product::create(
            "Linen Sofa",
            "sofas",
            Money::inr(Decimal::new(5000, 0)),
            FulfillmentType::Hybrid,
        );
        p.add_color_variant(ColorVariant::new("Black", "#111111", 10)).unwrap();
        p.add_color_variant(ColorVariant::new("Beige", "#d9c7a7", 0)).unwrap();
        p
    }

    #[test]
    fn test_same_triple_merges() {
        let mut cart = Cart::new();
        let p = hybrid_sofa();
        cart.add_line(&p, 2, Some("Black"), Some(FulfillmentMode::Instock)).unwrap();
        cart.add_line(&p, 3, Some("Black"), Some(FulfillmentMode::Instock)).unwrap();
        assert_eq!(cart.line_count(), 1);
        assert_eq!(cart.lines()[0].quantity.value(), 5);
    }

    #[test]
    fn test_merge_clamps_at_hundred() {
        let mut cart = Cart::new();
        let p = hybrid_sofa();
        cart.add_line(&p, 80, Some("Black"), Some(FulfillmentMode::Instock)).unwrap();
        cart.add_line(&p, 80, Some("Black"), Some(FulfillmentMode::Instock)).unwrap();
        assert_eq!(cart.lines()[0].quantity.value(), 100);
    }

    #[test]
    fn test_different_color_or_mode_is_a_new_line() {
        let mut cart = Cart::new();
        let p = hybrid_sofa();
        cart.add_line(&p, 1, Some("Black"), Some(FulfillmentMode::Instock)).unwrap();
        cart.add_line(&p, 1, Some("Black"), Some(FulfillmentMode::MadeToOrder)).unwrap();
        cart.add_line(&p, 1, Some("Beige"), None).unwrap(); // forced made_to_order
        assert_eq!(cart.line_count(), 3);
    }

    #[test]
    fn test_out_of_stock_variant_forced_to_made_to_order() {
        let mut cart = Cart::new();
        let p = hybrid_sofa();
        let line = cart
            .add_line(&p, 1, Some("Beige"), Some(FulfillmentMode::Instock))
            .unwrap();
        assert_eq!(line.mode, FulfillmentMode::MadeToOrder);
    }

    #[test]
    fn test_instock_product_out_of_stock_not_addable() {
        let mut p = Product::create(
            "Oak Stool",
            "stools",
            Money::inr(Decimal::new(1500, 0)),
            FulfillmentType::Instock,
        );
        p.set_stock(0).unwrap();
        let mut cart = Cart::new();
        let err = cart.add_line(&p, 1, None, None).unwrap_err();
        assert!(matches!(err, EngineError::NotAddable(_)));
        assert!(cart.is_empty()); // no partial line
    }

    #[test]
    fn test_unknown_color_rejected() {
        let mut cart = Cart::new();
        let p = hybrid_sofa();
        assert!(matches!(
            cart.add_line(&p, 1, Some("Teal"), None),
            Err(EngineError::UnknownVariant(_))
        ));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_is_in_cart_mode_wildcard() {
        let mut cart = Cart::new();
        let p = hybrid_sofa();
        cart.add_line(&p, 1, Some("Black"), Some(FulfillmentMode::MadeToOrder)).unwrap();
        assert!(cart.is_in_cart(p.id(), Some("Black"), None));
        assert!(cart.is_in_cart(p.id(), Some("Black"), Some(FulfillmentMode::MadeToOrder)));
        assert!(!cart.is_in_cart(p.id(), Some("Black"), Some(FulfillmentMode::Instock)));
        assert!(!cart.is_in_cart(p.id(), Some("Beige"), None));
    }

    #[test]
    fn test_update_quantity_clamps_and_never_removes() {
        let mut cart = Cart::new();
        let p = hybrid_sofa();
        let key = cart
            .add_line(&p, 2, Some("Black"), Some(FulfillmentMode::Instock))
            .unwrap()
            .key();
        assert!(cart.update_quantity(&key, -10));
        assert_eq!(cart.lines()[0].quantity.value(), 1);
        assert!(cart.update_quantity(&key, 500));
        assert_eq!(cart.lines()[0].quantity.value(), 100);
        assert_eq!(cart.line_count(), 1);

        assert!(cart.remove_line(&key));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_price_snapshot_survives_catalog_change() {
        let mut cart = Cart::new();
        let mut p = hybrid_sofa();
        cart.add_line(&p, 1, Some("Black"), Some(FulfillmentMode::Instock)).unwrap();
        // catalog price changes after the add
        p.update_price(Money::inr(Decimal::new(9000, 0)));
        assert_eq!(cart.lines()[0].unit_price.amount(), Decimal::new(5000, 0));
    }
}
