//! Domain layer
pub mod aggregates;
pub mod delivery;
pub mod events;
pub mod fulfillment;
pub mod value_objects;
