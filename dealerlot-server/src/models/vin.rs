//! Vehicle Identification Number
//!
//! VINs are trimmed and upper-cased at construction so storage and
//! comparison are always case-insensitive.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::ValidationError;

/// Standard VIN length; older vehicles may carry shorter ones
const MAX_VIN_LEN: usize = 17;

static VIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z0-9]{1,17}$").expect("invalid vin regex"));

/// Validated, upper-cased VIN
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Vin(String);

impl Vin {
    /// Normalize and validate a VIN.
    ///
    /// # Example
    /// ```
    /// use dealerlot_server::models::Vin;
    ///
    /// assert_eq!(Vin::new(" 1hgcm82633a004352 ").unwrap().as_str(), "1HGCM82633A004352");
    /// assert!(Vin::new("   ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let normalized = s.trim().to_uppercase();

        if normalized.is_empty() {
            return Err(ValidationError::Empty { field: "vin" });
        }

        if normalized.len() > MAX_VIN_LEN {
            return Err(ValidationError::TooLong {
                field: "vin",
                max: MAX_VIN_LEN,
            });
        }

        if !VIN_RE.is_match(&normalized) {
            return Err(ValidationError::InvalidFormat {
                field: "vin",
                reason: "must contain only letters and digits",
            });
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for Vin {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
