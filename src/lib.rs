//! Furnicart — furniture storefront engine
//!
//! Inventory, variant and fulfillment consistency rules for a
//! catalog-and-checkout storefront and its admin console.
//!
//! ## Features
//! - Per-variant stock tracking with derived availability badges
//! - Ready-stock / made-to-order / hybrid fulfillment resolution
//! - Session cart keyed by (product, color, fulfillment mode)
//! - GST pricing and cash-on-delivery gating
//! - Pincode serviceability checks
//!
//! The domain layer in [`domain`] is synchronous and side-effect free;
//! everything network-bound (delivery lookup, stock reads, order
//! submission) lives in the HTTP shell and behind the [`store`] port.

use thiserror::Error;

pub mod domain;
pub mod store;

/// Engine-wide error taxonomy.
///
/// Validation errors are surfaced to the shopper as specific feedback;
/// `Unreachable` wraps any collaborator failure and is always retryable.
/// Every rejection leaves prior state intact.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("stock value {0} is negative")]
    InvalidStock(i32),

    #[error("product has no color variant named '{0}'")]
    UnknownVariant(String),

    #[error("selection cannot be added to cart: {0}")]
    NotAddable(String),

    #[error("pincode must be exactly 6 digits")]
    InvalidPincode,

    #[error("cannot submit an empty order")]
    EmptyOrder,

    #[error("payment method '{0}' is not allowed for this cart")]
    PaymentMethodNotAllowed(String),

    #[error("collaborator unreachable: {0}")]
    Unreachable(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
