//! Vehicle repository
//!
//! - list: data and COUNT(*) queries run concurrently with shared filters
//! - create: VIN pre-check (upper-cased) then INSERT ... RETURNING id, via
//!   [`VehicleWriter`] so the duplicate path does not depend on Postgres
//! - update/delete/status: RETURNING distinguishes "no such id"

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use super::DbError;
use crate::db::executor::{FailureKind, Params, QueryExecutor, QueryResult};
use crate::models::{
    Paginated, Pagination, Sort, VehicleDraft, VehicleFilter, VehicleStatus, Vin,
};

const COLUMNS: &str = "id, vin, year, make, model, trim, mileage, price, color, description, \
                       status, created_at, updated_at";

/// Vehicle record from database
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: i64,
    pub vin: String,
    pub year: i32,
    pub make: String,
    pub model: String,
    pub trim: Option<String>,
    pub mileage: Option<i32>,
    pub price: Option<f64>,
    pub color: Option<String>,
    pub description: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: VehicleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Vehicles per status for the dashboard
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(FromRow)]
struct CountRow {
    total: i64,
}

#[derive(FromRow)]
struct IdRow {
    id: i64,
}

/// Build the shared WHERE clause for listing and counting
fn where_clause(filter: &VehicleFilter) -> (String, Params) {
    let mut conditions = Vec::new();
    let mut params = Params::new();

    if let Some(make) = &filter.make {
        conditions.push("LOWER(make) = LOWER(@make)");
        params = params.bind("make", make.as_str());
    }
    if let Some(status) = filter.status {
        conditions.push("status = @status");
        params = params.bind("status", status.as_str());
    }
    if let Some(min_year) = filter.min_year {
        conditions.push("year >= @minYear");
        params = params.bind("minYear", min_year);
    }
    if let Some(max_year) = filter.max_year {
        conditions.push("year <= @maxYear");
        params = params.bind("maxYear", max_year);
    }
    if let Some(search) = &filter.search {
        conditions.push("(vin ILIKE @search OR make ILIKE @search OR model ILIKE @search)");
        params = params.bind("search", format!("%{}%", escape_like(search)));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), params)
    }
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn draft_params(draft: &VehicleDraft) -> Params {
    Params::new()
        .bind("vin", draft.vin.as_str())
        .bind("year", draft.year)
        .bind("make", draft.make.as_str())
        .bind("model", draft.model.as_str())
        .bind("trim", draft.trim.clone())
        .bind("mileage", draft.mileage)
        .bind("price", draft.price)
        .bind("color", draft.color.clone())
        .bind("description", draft.description.clone())
        .bind("status", draft.status.as_str())
}

fn is_unique_violation(message: &str) -> bool {
    message.contains("idx_vehicles_vin") || message.contains("duplicate key")
}

fn duplicate_vin(vin: &Vin) -> DbError {
    DbError::Conflict(format!("vehicle with VIN '{}' already exists", vin.as_str()))
}

/// The statements vehicle creation is built from
#[async_trait]
pub trait VehicleWriter: Send + Sync {
    /// Case-insensitive VIN lookup, optionally ignoring one vehicle id
    async fn count_vin(&self, vin: &Vin, except_id: Option<i64>) -> Result<i64, DbError>;

    /// Insert without any pre-check. Returns the new id.
    async fn insert(&self, draft: &VehicleDraft) -> Result<i64, DbError>;
}

/// Insert a vehicle, refusing duplicate VINs. Returns the new id.
///
/// A VIN already on the lot is a [`DbError::Conflict`] and nothing is
/// inserted.
pub async fn create_vehicle<W>(writer: &W, draft: &VehicleDraft) -> Result<i64, DbError>
where
    W: VehicleWriter + ?Sized,
{
    if writer.count_vin(&draft.vin, None).await? > 0 {
        return Err(duplicate_vin(&draft.vin));
    }

    let id = writer.insert(draft).await?;
    tracing::info!(id, vin = draft.vin.as_str(), "Vehicle created");
    Ok(id)
}

/// Vehicle repository
pub struct VehicleRepo<'a> {
    exec: &'a QueryExecutor,
}

impl<'a> VehicleRepo<'a> {
    pub fn new(exec: &'a QueryExecutor) -> Self {
        Self { exec }
    }

    fn rows<T>(&self, result: QueryResult<T>) -> Result<Vec<T>, DbError> {
        result.into_result().map_err(|failure| match failure.kind {
            FailureKind::Configuration => DbError::Configuration {
                message: failure.message,
            },
            _ => DbError::Query {
                message: failure.message,
                breaker: self.exec.breaker_snapshot(),
            },
        })
    }

    /// One page of vehicles plus the total matching `filter`.
    pub async fn list(
        &self,
        page: Pagination,
        filter: &VehicleFilter,
        sort: Sort,
    ) -> Result<Paginated<Vehicle>, DbError> {
        let (where_sql, params) = where_clause(filter);

        let data_sql = format!(
            "SELECT {COLUMNS} FROM vehicles {where_sql} {} LIMIT @limit OFFSET @offset",
            sort.order_by()
        );
        let data_params = params
            .clone()
            .bind("limit", page.limit)
            .bind("offset", page.offset());
        let count_sql = format!("SELECT COUNT(*) AS total FROM vehicles {where_sql}");

        let (data, count) = tokio::join!(
            self.exec.execute_query::<Vehicle>(&data_sql, &data_params),
            self.exec.execute_query::<CountRow>(&count_sql, &params),
        );

        let items = self.rows(data)?;
        let total = self.rows(count)?.first().map(|r| r.total).unwrap_or(0);

        Ok(Paginated {
            items,
            total,
            page: page.page,
            limit: page.limit,
        })
    }

    pub async fn get(&self, id: i64) -> Result<Vehicle, DbError> {
        let result = self
            .exec
            .execute_query::<Vehicle>(
                &format!("SELECT {COLUMNS} FROM vehicles WHERE id = @id"),
                &Params::new().bind("id", id),
            )
            .await;

        self.rows(result)?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                resource: "vehicle",
                id: id.to_string(),
            })
    }

    pub async fn vin_exists(&self, vin: &Vin) -> Result<bool, DbError> {
        Ok(self.count_vin(vin, None).await? > 0)
    }

    /// Insert a vehicle, refusing duplicate VINs. Returns the new id.
    pub async fn create(&self, draft: &VehicleDraft) -> Result<i64, DbError> {
        create_vehicle(self, draft).await
    }

    /// Replace every editable field of a vehicle
    pub async fn update(&self, id: i64, draft: &VehicleDraft) -> Result<Vehicle, DbError> {
        if self.count_vin(&draft.vin, Some(id)).await? > 0 {
            return Err(DbError::Conflict(format!(
                "another vehicle already uses VIN '{}'",
                draft.vin.as_str()
            )));
        }

        let result = self
            .exec
            .execute_query::<Vehicle>(
                &format!(
                    "UPDATE vehicles SET vin = @vin, year = @year, make = @make, model = @model, \
                     trim = @trim, mileage = @mileage, price = @price, color = @color, \
                     description = @description, status = @status, updated_at = NOW() \
                     WHERE id = @id RETURNING {COLUMNS}"
                ),
                &draft_params(draft).bind("id", id),
            )
            .await;

        self.rows(result)?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                resource: "vehicle",
                id: id.to_string(),
            })
    }

    pub async fn set_status(&self, id: i64, status: VehicleStatus) -> Result<Vehicle, DbError> {
        let result = self
            .exec
            .execute_query::<Vehicle>(
                &format!(
                    "UPDATE vehicles SET status = @status, updated_at = NOW() \
                     WHERE id = @id RETURNING {COLUMNS}"
                ),
                &Params::new().bind("status", status.as_str()).bind("id", id),
            )
            .await;

        self.rows(result)?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                resource: "vehicle",
                id: id.to_string(),
            })
    }

    pub async fn delete(&self, id: i64) -> Result<(), DbError> {
        let result = self
            .exec
            .execute_query::<IdRow>(
                "DELETE FROM vehicles WHERE id = @id RETURNING id",
                &Params::new().bind("id", id),
            )
            .await;

        if self.rows(result)?.is_empty() {
            return Err(DbError::NotFound {
                resource: "vehicle",
                id: id.to_string(),
            });
        }

        tracing::info!(id, "Vehicle deleted");
        Ok(())
    }

    pub async fn status_counts(&self) -> Result<Vec<StatusCount>, DbError> {
        let result = self
            .exec
            .execute_query::<StatusCount>(
                "SELECT status, COUNT(*) AS count FROM vehicles GROUP BY status ORDER BY status",
                &Params::new(),
            )
            .await;
        self.rows(result)
    }
}

#[async_trait]
impl VehicleWriter for VehicleRepo<'_> {
    async fn count_vin(&self, vin: &Vin, except_id: Option<i64>) -> Result<i64, DbError> {
        let (sql, params) = match except_id {
            Some(id) => (
                "SELECT COUNT(*) AS total FROM vehicles WHERE UPPER(vin) = @vin AND id <> @id",
                Params::new().bind("vin", vin.as_str()).bind("id", id),
            ),
            None => (
                "SELECT COUNT(*) AS total FROM vehicles WHERE UPPER(vin) = @vin",
                Params::new().bind("vin", vin.as_str()),
            ),
        };

        let result = self.exec.execute_query::<CountRow>(sql, &params).await;
        Ok(self.rows(result)?.first().map(|r| r.total).unwrap_or(0))
    }

    async fn insert(&self, draft: &VehicleDraft) -> Result<i64, DbError> {
        let result = self
            .exec
            .execute_query::<IdRow>(
                "INSERT INTO vehicles \
                 (vin, year, make, model, trim, mileage, price, color, description, status) \
                 VALUES (@vin, @year, @make, @model, @trim, @mileage, @price, @color, \
                 @description, @status) \
                 RETURNING id",
                &draft_params(draft),
            )
            .await;

        // Lost a race with a concurrent insert of the same VIN
        if let Some(message) = result.error.as_deref().filter(|m| is_unique_violation(m)) {
            tracing::debug!(error = message, "VIN unique index rejected insert");
            return Err(duplicate_vin(&draft.vin));
        }

        self.rows(result)?
            .first()
            .map(|r| r.id)
            .ok_or_else(|| DbError::Query {
                message: "insert returned no id".into(),
                breaker: self.exec.breaker_snapshot(),
            })
    }
}
