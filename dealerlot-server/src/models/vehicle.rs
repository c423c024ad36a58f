//! Vehicle input validation
//!
//! Create and full update share one request shape. Numeric fields accept
//! either JSON numbers or numeric strings, since form posts send strings.

use serde::Deserialize;
use serde_json::Value;

use super::{ValidationError, VehicleStatus, Vin};

const MIN_YEAR: i64 = 1900;
const MAX_YEAR: i64 = 2100;
const MAX_TEXT_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 4000;

/// Raw vehicle payload for `POST /api/vehicles/add` and `PUT /api/vehicles/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRequest {
    pub vin: Option<String>,
    pub year: Option<Value>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub trim: Option<String>,
    pub mileage: Option<Value>,
    pub price: Option<Value>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
}

/// Validated vehicle fields ready for storage
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleDraft {
    pub vin: Vin,
    pub year: i32,
    pub make: String,
    pub model: String,
    pub trim: Option<String>,
    pub mileage: Option<i32>,
    pub price: Option<f64>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub status: VehicleStatus,
}

impl TryFrom<VehicleRequest> for VehicleDraft {
    type Error = ValidationError;

    fn try_from(req: VehicleRequest) -> Result<Self, Self::Error> {
        let vin = Vin::new(req.vin.as_deref().unwrap_or_default())?;

        let year = req
            .year
            .as_ref()
            .map(|v| parse_int("year", v))
            .transpose()?
            .ok_or(ValidationError::Empty { field: "year" })?;
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(ValidationError::OutOfRange {
                field: "year",
                min: MIN_YEAR,
                max: MAX_YEAR,
            });
        }

        let make = required_text("make", req.make)?;
        let model = required_text("model", req.model)?;

        let mileage = match req.mileage.as_ref() {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(v) => Some(parse_int("mileage", v)?),
        };
        if let Some(m) = mileage {
            if !(0..=i64::from(i32::MAX)).contains(&m) {
                return Err(ValidationError::OutOfRange {
                    field: "mileage",
                    min: 0,
                    max: i64::from(i32::MAX),
                });
            }
        }

        let price = req.price.as_ref().map(parse_price).transpose()?.flatten();

        let status = match req.status.as_deref().map(str::trim) {
            None | Some("") => VehicleStatus::default(),
            Some(s) => VehicleStatus::parse(s)?,
        };

        Ok(Self {
            vin,
            year: year as i32,
            make,
            model,
            trim: optional_text("trim", req.trim, MAX_TEXT_LEN)?,
            mileage: mileage.map(|m| m as i32),
            price,
            color: optional_text("color", req.color, MAX_TEXT_LEN)?,
            description: optional_text("description", req.description, MAX_DESCRIPTION_LEN)?,
            status,
        })
    }
}

fn parse_int(field: &'static str, value: &Value) -> Result<i64, ValidationError> {
    let invalid = ValidationError::InvalidFormat {
        field,
        reason: "must be a whole number",
    };

    match value {
        Value::Number(n) => n.as_i64().ok_or(invalid),
        Value::String(s) if s.trim().is_empty() => Err(ValidationError::Empty { field }),
        Value::String(s) => s.trim().parse().map_err(|_| invalid),
        Value::Null => Err(ValidationError::Empty { field }),
        _ => Err(invalid),
    }
}

fn parse_price(value: &Value) -> Result<Option<f64>, ValidationError> {
    let invalid = ValidationError::InvalidFormat {
        field: "price",
        reason: "must be a non-negative number",
    };

    let price = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::Number(n) => n.as_f64().ok_or(invalid.clone())?,
        Value::String(s) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .map_err(|_| invalid.clone())?,
        _ => return Err(invalid),
    };

    if price.is_finite() && price >= 0.0 {
        Ok(Some(price))
    } else {
        Err(invalid)
    }
}

fn required_text(field: &'static str, value: Option<String>) -> Result<String, ValidationError> {
    optional_text(field, value, MAX_TEXT_LEN)?.ok_or(ValidationError::Empty { field })
}

fn optional_text(
    field: &'static str,
    value: Option<String>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    let Some(text) = value.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    if text.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(Some(text))
}
