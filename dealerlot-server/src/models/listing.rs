//! Inventory listing filters and sort order
//!
//! Sort columns come from an allow-list and are the only caller-supplied
//! tokens ever interpolated into SQL text. Filter values are always bound.

use serde::Deserialize;

use super::{Pagination, PaginationParams, ValidationError, VehicleStatus};

/// Query string for `GET /api/inventory`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub make: Option<String>,
    pub status: Option<String>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl InventoryQuery {
    pub fn pagination(&self, default_limit: u32) -> Pagination {
        Pagination::from_params(
            &PaginationParams {
                page: self.page,
                limit: self.limit,
            },
            default_limit,
        )
    }

    pub fn filter(&self) -> Result<VehicleFilter, ValidationError> {
        let status = match non_blank(&self.status) {
            Some(s) => Some(VehicleStatus::parse(&s)?),
            None => None,
        };

        Ok(VehicleFilter {
            make: non_blank(&self.make),
            status,
            min_year: self.min_year,
            max_year: self.max_year,
            search: non_blank(&self.search),
        })
    }

    pub fn sort(&self) -> Result<Sort, ValidationError> {
        let column = match non_blank(&self.sort_by) {
            Some(s) => SortColumn::parse(&s)?,
            None => SortColumn::CreatedAt,
        };
        let direction = match non_blank(&self.sort_order) {
            Some(s) => SortDirection::parse(&s)?,
            None => SortDirection::Desc,
        };

        Ok(Sort { column, direction })
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// Optional WHERE-clause filters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleFilter {
    pub make: Option<String>,
    pub status: Option<VehicleStatus>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    /// Case-insensitive match against VIN, make or model
    pub search: Option<String>,
}

/// Sortable columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    CreatedAt,
    UpdatedAt,
    Year,
    Make,
    Model,
    Price,
    Mileage,
    Vin,
}

impl SortColumn {
    const ALLOWED: [(&'static str, SortColumn); 8] = [
        ("createdat", SortColumn::CreatedAt),
        ("updatedat", SortColumn::UpdatedAt),
        ("year", SortColumn::Year),
        ("make", SortColumn::Make),
        ("model", SortColumn::Model),
        ("price", SortColumn::Price),
        ("mileage", SortColumn::Mileage),
        ("vin", SortColumn::Vin),
    ];

    /// Accepts `createdAt`, `created_at` and any casing thereof.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let key = s.trim().replace('_', "").to_lowercase();
        Self::ALLOWED
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, column)| *column)
            .ok_or_else(|| ValidationError::InvalidVariant {
                field: "sortBy",
                value: s.to_owned(),
            })
    }

    /// Column name as it appears in SQL
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Year => "year",
            Self::Make => "make",
            Self::Model => "model",
            Self::Price => "price",
            Self::Mileage => "mileage",
            Self::Vin => "vin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(ValidationError::InvalidVariant {
                field: "sortOrder",
                value: s.to_owned(),
            }),
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            column: SortColumn::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

impl Sort {
    /// `ORDER BY` clause; the id tiebreak keeps paging stable
    pub fn order_by(&self) -> String {
        format!(
            "ORDER BY {} {}, id {}",
            self.column.as_sql(),
            self.direction.as_sql(),
            self.direction.as_sql()
        )
    }
}
