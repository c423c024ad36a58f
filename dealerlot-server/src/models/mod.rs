//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod listing;
pub mod pagination;
pub mod status;
pub mod validation;
pub mod vehicle;
pub mod vin;

pub use listing::{InventoryQuery, Sort, SortColumn, SortDirection, VehicleFilter};
pub use pagination::{Paginated, Pagination, PaginationParams, DEFAULT_LIMIT};
pub use status::VehicleStatus;
pub use validation::ValidationError;
pub use vehicle::{VehicleDraft, VehicleRequest};
pub use vin::Vin;
