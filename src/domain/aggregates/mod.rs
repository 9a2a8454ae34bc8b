//! Aggregates module
pub mod cart;
pub mod order;
pub mod product;

pub use cart::{Cart, CartLine, LineKey};
pub use order::{Order, OrderSubmission, PaymentMethod, Pricing};
pub use product::{ColorVariant, Product, StockStatus};
