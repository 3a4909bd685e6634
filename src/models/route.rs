//! Airport pair model identifying a monitored route

use std::fmt;

use serde::{Deserialize, Serialize};

/// Origin/destination pair of IATA location codes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AirportPair {
    /// Departure airport code (e.g. `JFK`)
    pub origin: String,
    /// Arrival airport code (e.g. `LHR`)
    pub destination: String,
}

impl AirportPair {
    /// Create a new airport pair
    #[must_use]
    pub fn new(origin: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            destination: destination.into(),
        }
    }

    /// Whether both codes look like IATA codes (three uppercase ASCII letters)
    #[must_use]
    pub fn has_valid_codes(&self) -> bool {
        fn is_iata(code: &str) -> bool {
            code.len() == 3 && code.bytes().all(|b| b.is_ascii_uppercase())
        }
        is_iata(&self.origin) && is_iata(&self.destination)
    }
}

impl fmt::Display for AirportPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}→{}", self.origin, self.destination)
    }
}
