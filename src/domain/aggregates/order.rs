//! Order pricing and the payment-method gate.
//!
//! Totals are computed from cart-line snapshots, never from live
//! catalog prices. The COD gate is a hard business rule re-checked at
//! submission time: cart contents can change between render and submit,
//! so the UI having disabled the option proves nothing.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::aggregates::cart::Cart;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::fulfillment::FulfillmentMode;
use crate::domain::value_objects::Money;
use crate::EngineError;

/// Orders above this subtotal ship free; everything else pays a flat fee.
pub const FREE_SHIPPING_THRESHOLD: i64 = 5000;
pub const FLAT_SHIPPING: i64 = 500;

/// GST at the fixed 18% rate, not configurable per line.
fn gst_rate() -> Decimal {
    Decimal::new(18, 2)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    pub subtotal: Decimal,
    pub gst: Decimal,
    pub shipping_charges: Decimal,
    pub total: Decimal,
}

/// Prices the full cart from line snapshots.
pub fn price(cart: &Cart) -> Pricing {
    if cart.is_empty() {
        return Pricing {
            subtotal: Decimal::ZERO,
            gst: Decimal::ZERO,
            shipping_charges: Decimal::ZERO,
            total: Decimal::ZERO,
        };
    }
    let subtotal: Decimal = cart.lines().iter().map(|l| l.line_total().amount()).sum();
    let shipping = if subtotal > Decimal::from(FREE_SHIPPING_THRESHOLD) {
        Decimal::ZERO
    } else {
        Decimal::from(FLAT_SHIPPING)
    };
    let gst = (subtotal * gst_rate())
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    Pricing {
        subtotal,
        gst,
        shipping_charges: shipping,
        total: subtotal + gst + shipping,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cod,
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Online => "online",
        }
    }
}

/// Cash-on-delivery is disallowed whenever any line is made-to-order.
pub fn cod_allowed(cart: &Cart) -> bool {
    !cart
        .lines()
        .iter()
        .any(|l| l.mode == FulfillmentMode::MadeToOrder)
}

/// The submission-time gate. Must pass before any order payload leaves
/// the engine.
pub fn validate_submission(cart: &Cart, method: PaymentMethod) -> crate::Result<()> {
    if cart.is_empty() {
        return Err(EngineError::EmptyOrder);
    }
    if method == PaymentMethod::Cod && !cod_allowed(cart) {
        return Err(EngineError::PaymentMethodNotAllowed(
            method.as_str().to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub selected_color: Option<String>,
    pub fulfillment_type: FulfillmentMode,
    pub lead_time_days: u32,
    pub unit_price: Decimal,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: String,
}

/// Flattened order payload handed to the server-owned order collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSubmission {
    pub items: Vec<SubmissionItem>,
    pub pricing: Pricing,
    pub payment: PaymentInfo,
}

/// A placed order, as far as this engine is concerned: the validated
/// payload plus identity. Final stock decrement and oversell rejection
/// belong to the persistence layer, not to us.
#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    order_number: String,
    session_id: String,
    submission: OrderSubmission,
    created_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

impl Order {
    /// Runs the payment gate, prices the cart and produces the order.
    /// The caller clears the cart only after this order is persisted.
    pub fn place(
        order_number: impl Into<String>,
        session_id: impl Into<String>,
        cart: &Cart,
        method: PaymentMethod,
    ) -> crate::Result<Self> {
        validate_submission(cart, method)?;
        let pricing = price(cart);
        let items = cart
            .lines()
            .iter()
            .map(|l| SubmissionItem {
                product_id: l.product_id,
                name: l.name.clone(),
                quantity: l.quantity.value(),
                selected_color: l.color.clone(),
                fulfillment_type: l.mode,
                lead_time_days: l.lead_time_days,
                unit_price: l.unit_price.amount(),
            })
            .collect();
        let id = Uuid::now_v7();
        let order_number = order_number.into();
        let submission = OrderSubmission {
            items,
            pricing,
            payment: PaymentInfo {
                method,
                status: "pending".to_string(),
            },
        };
        let mut order = Self {
            id,
            order_number: order_number.clone(),
            session_id: session_id.into(),
            submission,
            created_at: Utc::now(),
            events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: id,
            order_number,
            total: order.submission.pricing.total,
        }));
        Ok(order)
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> &str { &self.order_number }
    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn submission(&self) -> &OrderSubmission { &self.submission }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn total(&self) -> Money {
        Money::inr(self.submission.pricing.total)
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::product::{ColorVariant, Product};
    use crate::domain::fulfillment::FulfillmentType;

    fn cart_with(unit_price: i64, qty: u32, mode: FulfillmentMode) -> Cart {
        let mut p = Product::create(
            "Teak Table",
            "tables",
            Money::inr(Decimal::new(unit_price, 0)),
            FulfillmentType::Hybrid,
        );
        p.add_color_variant(ColorVariant::new("Black", "#111111", 20)).unwrap();
        let mut cart = Cart::new();
        cart.add_line(&p, qty, Some("Black"), Some(mode)).unwrap();
        cart
    }

    #[test]
    fn test_pricing_free_shipping_scenario() {
        // qty 2 at 5000: subtotal 10000, free shipping, gst 1800
        let cart = cart_with(5000, 2, FulfillmentMode::Instock);
        let pricing = price(&cart);
        assert_eq!(pricing.subtotal, Decimal::new(10000, 0));
        assert_eq!(pricing.shipping_charges, Decimal::ZERO);
        assert_eq!(pricing.gst, Decimal::new(1800, 0));
        assert_eq!(pricing.total, Decimal::new(11800, 0));
    }

    #[test]
    fn test_pricing_flat_shipping_at_threshold() {
        // subtotal exactly 5000 is not "over", so flat shipping applies
        let cart = cart_with(5000, 1, FulfillmentMode::Instock);
        let pricing = price(&cart);
        assert_eq!(pricing.shipping_charges, Decimal::new(500, 0));
        assert_eq!(pricing.total, Decimal::new(5000 + 900 + 500, 0));
    }

    #[test]
    fn test_cod_blocked_by_any_made_to_order_line() {
        let mut p = Product::create(
            "Teak Table",
            "tables",
            Money::inr(Decimal::new(3000, 0)),
            FulfillmentType::Hybrid,
        );
        p.add_color_variant(ColorVariant::new("Black", "#111111", 20)).unwrap();
        let mut cart = Cart::new();
        cart.add_line(&p, 1, Some("Black"), Some(FulfillmentMode::Instock)).unwrap();
        assert!(cod_allowed(&cart));

        cart.add_line(&p, 1, Some("Black"), Some(FulfillmentMode::MadeToOrder)).unwrap();
        assert!(!cod_allowed(&cart));
        assert!(matches!(
            validate_submission(&cart, PaymentMethod::Cod),
            Err(EngineError::PaymentMethodNotAllowed(_))
        ));
        // online stays fine
        assert!(validate_submission(&cart, PaymentMethod::Online).is_ok());
    }

    #[test]
    fn test_empty_cart_rejected() {
        let cart = Cart::new();
        assert!(matches!(
            validate_submission(&cart, PaymentMethod::Online),
            Err(EngineError::EmptyOrder)
        ));
        assert!(matches!(
            Order::place("ORD-00000001", "sess", &cart, PaymentMethod::Online),
            Err(EngineError::EmptyOrder)
        ));
    }

    #[test]
    fn test_place_builds_submission_payload() {
        let cart = cart_with(5000, 2, FulfillmentMode::Instock);
        let mut order =
            Order::place("ORD-00000042", "sess-1", &cart, PaymentMethod::Cod).unwrap();
        let sub = order.submission();
        assert_eq!(sub.items.len(), 1);
        assert_eq!(sub.items[0].quantity, 2);
        assert_eq!(sub.items[0].selected_color.as_deref(), Some("Black"));
        assert_eq!(sub.pricing.total, Decimal::new(11800, 0));
        assert_eq!(sub.payment.status, "pending");
        assert_eq!(order.take_events().len(), 1);
    }
}
