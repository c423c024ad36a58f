//! Vehicle status - closed set of lot states

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Where a vehicle is in the sales lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VehicleStatus {
    Available,
    Pending,
    Sold,
    Reserved,
}

impl VehicleStatus {
    pub const ALL: [VehicleStatus; 4] = [
        VehicleStatus::Available,
        VehicleStatus::Pending,
        VehicleStatus::Sold,
        VehicleStatus::Reserved,
    ];

    /// Parse a status, ignoring case and surrounding whitespace.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "status" });
        }

        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "status",
                value: trimmed.to_owned(),
            })
    }

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Pending => "Pending",
            Self::Sold => "Sold",
            Self::Reserved => "Reserved",
        }
    }
}

impl Default for VehicleStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl TryFrom<String> for VehicleStatus {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
