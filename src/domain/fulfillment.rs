//! Fulfillment mode resolution.
//!
//! A product is configured as ready-stock, made-to-order, or hybrid.
//! The resolver turns that configuration plus the selected variant's
//! stock status (plus an optional shopper choice) into an effective
//! mode, an addability verdict, and a delivery estimate.

use serde::{Deserialize, Serialize};

use crate::domain::aggregates::product::{Product, StockStatus};

/// How a product may be fulfilled. One resolver arm per tag keeps the
/// three behaviors exhaustive and independently testable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    Instock,
    MadeToOrder,
    Hybrid,
}

impl FulfillmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instock => "instock",
            Self::MadeToOrder => "made_to_order",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for FulfillmentType {
    type Err = crate::EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instock" => Ok(Self::Instock),
            "made_to_order" => Ok(Self::MadeToOrder),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(crate::EngineError::Unreachable(format!(
                "unknown fulfillment type '{other}'"
            ))),
        }
    }
}

/// How a specific cart line will be satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentMode {
    Instock,
    MadeToOrder,
}

impl FulfillmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instock => "instock",
            Self::MadeToOrder => "made_to_order",
        }
    }
}

/// Delivery window in days, inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEstimate {
    pub min_days: u32,
    pub max_days: u32,
}

impl DeliveryEstimate {
    /// Ready stock ships in 2-3 days; manufacture adds 3 days of
    /// shipping on top of the lead time.
    pub fn for_mode(mode: FulfillmentMode, lead_time_days: u32) -> Self {
        match mode {
            FulfillmentMode::Instock => Self { min_days: 2, max_days: 3 },
            FulfillmentMode::MadeToOrder => Self {
                min_days: lead_time_days + 3,
                max_days: lead_time_days + 3,
            },
        }
    }
}

/// Effective resolution for a selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub mode: FulfillmentMode,
    pub addable: bool,
    pub estimate: DeliveryEstimate,
}

/// Modes a shopper may pick for this configuration and stock status.
pub fn offered_modes(fulfillment_type: FulfillmentType, status: StockStatus) -> Vec<FulfillmentMode> {
    match fulfillment_type {
        FulfillmentType::Instock => vec![FulfillmentMode::Instock],
        FulfillmentType::MadeToOrder => vec![FulfillmentMode::MadeToOrder],
        FulfillmentType::Hybrid => {
            if status == StockStatus::OutOfStock {
                vec![FulfillmentMode::MadeToOrder]
            } else {
                vec![FulfillmentMode::Instock, FulfillmentMode::MadeToOrder]
            }
        }
    }
}

/// Resolves the effective mode for a selection.
///
/// `choice` is the shopper's explicit preference; it is only honored
/// where the configuration offers it.
pub fn resolve(
    fulfillment_type: FulfillmentType,
    status: StockStatus,
    lead_time_days: u32,
    choice: Option<FulfillmentMode>,
) -> Resolution {
    let (mode, addable) = match fulfillment_type {
        // Ready stock only: never addable when the selection is out.
        FulfillmentType::Instock => (FulfillmentMode::Instock, status != StockStatus::OutOfStock),
        // Always manufacturable; stock status is irrelevant to sellability.
        FulfillmentType::MadeToOrder => (FulfillmentMode::MadeToOrder, true),
        FulfillmentType::Hybrid => {
            if status == StockStatus::OutOfStock {
                // instock is unselectable; force manufacture
                (FulfillmentMode::MadeToOrder, true)
            } else {
                (choice.unwrap_or(FulfillmentMode::Instock), true)
            }
        }
    };
    Resolution {
        mode,
        addable,
        estimate: DeliveryEstimate::for_mode(mode, lead_time_days),
    }
}

/// Convenience wrapper resolving against a product and selected color.
pub fn resolve_for(
    product: &Product,
    color: Option<&str>,
    choice: Option<FulfillmentMode>,
) -> crate::Result<Resolution> {
    let status = product.selected_status(color)?;
    Ok(resolve(
        product.fulfillment_type(),
        status,
        product.lead_time_days(),
        choice,
    ))
}

/// Sticky per-product mode selection for a detail-page session.
///
/// Going out of stock on a hybrid product forces the selection to
/// made-to-order; switching back to an in-stock variant never
/// auto-reverts it. The shopper's last explicit choice (or the forced
/// fallback) stands until they act again, so a deliberate made-to-order
/// choice is never silently undone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSelection {
    current: FulfillmentMode,
}

impl ModeSelection {
    pub fn new(fulfillment_type: FulfillmentType, status: StockStatus) -> Self {
        Self {
            current: resolve(fulfillment_type, status, 0, None).mode,
        }
    }

    pub fn current(&self) -> FulfillmentMode { self.current }

    /// Explicit shopper choice. Returns false (selection unchanged) when
    /// the mode is not offered for the current status.
    pub fn choose(
        &mut self,
        fulfillment_type: FulfillmentType,
        status: StockStatus,
        mode: FulfillmentMode,
    ) -> bool {
        if offered_modes(fulfillment_type, status).contains(&mode) {
            self.current = mode;
            true
        } else {
            false
        }
    }

    /// Called when the selected variant (and hence its status) changes.
    /// Forces one way only.
    pub fn on_stock_change(&mut self, fulfillment_type: FulfillmentType, status: StockStatus) {
        if !offered_modes(fulfillment_type, status).contains(&self.current) {
            self.current = resolve(fulfillment_type, status, 0, None).mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instock_product_not_addable_when_out() {
        let r = resolve(FulfillmentType::Instock, StockStatus::OutOfStock, 7, None);
        assert_eq!(r.mode, FulfillmentMode::Instock);
        assert!(!r.addable);
        // an override cannot make it addable
        let r = resolve(
            FulfillmentType::Instock,
            StockStatus::OutOfStock,
            7,
            Some(FulfillmentMode::MadeToOrder),
        );
        assert_eq!(r.mode, FulfillmentMode::Instock);
        assert!(!r.addable);
    }

    #[test]
    fn test_made_to_order_always_addable() {
        for status in [StockStatus::InStock, StockStatus::LowStock, StockStatus::OutOfStock] {
            let r = resolve(FulfillmentType::MadeToOrder, status, 10, None);
            assert_eq!(r.mode, FulfillmentMode::MadeToOrder);
            assert!(r.addable);
            assert_eq!(r.estimate.min_days, 13);
        }
    }

    #[test]
    fn test_hybrid_forces_made_to_order_when_out() {
        let r = resolve(
            FulfillmentType::Hybrid,
            StockStatus::OutOfStock,
            7,
            Some(FulfillmentMode::Instock),
        );
        assert_eq!(r.mode, FulfillmentMode::MadeToOrder);
        assert!(r.addable);
        assert!(!offered_modes(FulfillmentType::Hybrid, StockStatus::OutOfStock)
            .contains(&FulfillmentMode::Instock));
    }

    #[test]
    fn test_hybrid_honors_choice_when_in_stock() {
        let r = resolve(
            FulfillmentType::Hybrid,
            StockStatus::LowStock,
            7,
            Some(FulfillmentMode::MadeToOrder),
        );
        assert_eq!(r.mode, FulfillmentMode::MadeToOrder);
        let r = resolve(FulfillmentType::Hybrid, StockStatus::InStock, 7, None);
        assert_eq!(r.mode, FulfillmentMode::Instock);
        assert_eq!(r.estimate, DeliveryEstimate { min_days: 2, max_days: 3 });
    }

    #[test]
    fn test_forced_mode_does_not_auto_revert() {
        let mut sel = ModeSelection::new(FulfillmentType::Hybrid, StockStatus::InStock);
        assert_eq!(sel.current(), FulfillmentMode::Instock);

        // switch to an out-of-stock variant: forced to made-to-order
        sel.on_stock_change(FulfillmentType::Hybrid, StockStatus::OutOfStock);
        assert_eq!(sel.current(), FulfillmentMode::MadeToOrder);

        // switch back to an in-stock variant: selection stays put
        sel.on_stock_change(FulfillmentType::Hybrid, StockStatus::InStock);
        assert_eq!(sel.current(), FulfillmentMode::MadeToOrder);

        // only an explicit choice moves it
        assert!(sel.choose(
            FulfillmentType::Hybrid,
            StockStatus::InStock,
            FulfillmentMode::Instock
        ));
        assert_eq!(sel.current(), FulfillmentMode::Instock);
    }

    #[test]
    fn test_choose_rejects_unoffered_mode() {
        let mut sel = ModeSelection::new(FulfillmentType::Hybrid, StockStatus::OutOfStock);
        assert!(!sel.choose(
            FulfillmentType::Hybrid,
            StockStatus::OutOfStock,
            FulfillmentMode::Instock
        ));
        assert_eq!(sel.current(), FulfillmentMode::MadeToOrder);
    }
}
