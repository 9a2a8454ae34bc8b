//! Delivery serviceability.
//!
//! A pincode is deliverable iff an active serviceable-area record
//! exists with that exact code. Format validation happens before any
//! lookup; a malformed code never reaches the network.

use serde::{Deserialize, Serialize};

use crate::domain::value_objects::Pincode;

/// Result of a serviceability lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serviceability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl Serviceability {
    pub fn available(city: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            available: true,
            city: Some(city.into()),
            state: Some(state.into()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            city: None,
            state: None,
        }
    }
}

/// A backend-maintained deliverable-area record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceableArea {
    pub pincode: Pincode,
    pub city: String,
    pub state: String,
    pub is_active: bool,
}

/// Decides what to remember after a check: only a successful check may
/// replace the previously confirmed pincode, so a transient failure
/// never erases a known-good delivery location.
pub fn pincode_to_remember<'a>(
    checked: &'a Pincode,
    result: &Serviceability,
) -> Option<&'a Pincode> {
    result.available.then_some(checked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_success_is_remembered() {
        let pin = Pincode::parse("380001").unwrap();
        assert_eq!(
            pincode_to_remember(&pin, &Serviceability::available("Ahmedabad", "Gujarat")),
            Some(&pin)
        );
        assert_eq!(pincode_to_remember(&pin, &Serviceability::unavailable()), None);
    }
}
