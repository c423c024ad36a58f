//! Query executor - resilient, never-failing query entry point
//!
//! Every query acquires the shared pool through the circuit breaker, binds
//! named parameters and returns a [`QueryResult`] envelope. Pool, breaker,
//! driver and timeout failures all come back as `success: false`, so
//! callers branch on `.success` instead of handling errors.

use std::sync::Arc;
use std::time::Duration;

use dealerlot_core::{BreakerSnapshot, CircuitState, PoolError, PoolStatus, ResilientPool};
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::FromRow;
use tokio::time::Instant;

use super::pool::PgConnector;

/// The process-wide pool, gated by the circuit breaker
pub type SqlPool = ResilientPool<PgConnector>;

/// Request-level timeout around acquire + execute
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// What went wrong when a query reports `success: false`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// No connection string configured
    Configuration,
    /// Breaker rejected the acquisition
    CircuitOpen,
    /// Opening the pool failed
    Connection,
    /// Binding or executing the statement failed
    Query,
    Timeout,
}

impl FailureKind {
    /// Short reason that is safe to show to clients
    pub fn reason(self) -> &'static str {
        match self {
            Self::Configuration => "database is not configured",
            Self::CircuitOpen => "circuit breaker is open",
            Self::Connection => "database connection failed",
            Self::Query => "database query failed",
            Self::Timeout => "database query timed out",
        }
    }
}

/// A failed envelope, split back out for `?`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct QueryFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Uniform envelope returned by [`QueryExecutor::execute_query`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
}

impl<T> QueryResult<T> {
    pub fn ok(rows: Vec<T>) -> Self {
        Self {
            success: true,
            data: Some(rows),
            error: None,
            kind: None,
        }
    }

    pub fn err(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            kind: Some(kind),
        }
    }

    /// Rows on success, the failure otherwise
    pub fn into_result(self) -> Result<Vec<T>, QueryFailure> {
        if self.success {
            return Ok(self.data.unwrap_or_default());
        }
        Err(QueryFailure {
            kind: self.kind.unwrap_or(FailureKind::Query),
            message: self
                .error
                .unwrap_or_else(|| "unknown database error".to_string()),
        })
    }
}

/// Typed, nullable query parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(Option<i64>),
    Float(Option<f64>),
    Text(Option<String>),
    Bool(Option<bool>),
}

macro_rules! sql_value_from {
    ($variant:ident: $($ty:ty => $conv:expr),+ $(,)?) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant(Some($conv(v)))
                }
            }

            impl From<Option<$ty>> for SqlValue {
                fn from(v: Option<$ty>) -> Self {
                    SqlValue::$variant(v.map($conv))
                }
            }
        )+
    };
}

sql_value_from!(Int: i64 => |v| v, i32 => i64::from, u32 => i64::from);
sql_value_from!(Float: f64 => |v| v);
sql_value_from!(Text: String => |v| v, &str => str::to_owned);
sql_value_from!(Bool: bool => |v| v);

/// Named parameters, referenced in SQL as `@name`
#[derive(Debug, Clone, Default)]
pub struct Params(Vec<(String, SqlValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a named parameter
    pub fn bind(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = value,
            None => self.0.push((name.to_owned(), value)),
        }
        self
    }

    fn get(&self, name: &str) -> Option<&SqlValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, thiserror::Error)]
enum ExecError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Query failed: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("Unknown query parameter '@{0}'")]
    UnknownParam(String),
}

impl ExecError {
    fn kind(&self) -> FailureKind {
        match self {
            Self::Pool(PoolError::Configuration { .. }) => FailureKind::Configuration,
            Self::Pool(PoolError::CircuitOpen { .. }) => FailureKind::CircuitOpen,
            Self::Pool(PoolError::Connect { .. }) => FailureKind::Connection,
            Self::Sql(_) | Self::UnknownParam(_) => FailureKind::Query,
        }
    }
}

/// Rewrite `@name` placeholders to positional `$n`.
///
/// Positions follow first appearance; a name used twice reuses its
/// position. Text inside single-quoted literals is left untouched.
fn bind_named(sql: &str, params: &Params) -> Result<(String, Vec<SqlValue>), ExecError> {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<String> = Vec::new();
    let mut values = Vec::new();
    let mut in_literal = false;
    let mut chars = sql.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if c == '\'' {
            in_literal = !in_literal;
            out.push(c);
            continue;
        }

        let starts_name = chars
            .peek()
            .is_some_and(|&(_, next)| next.is_ascii_alphabetic() || next == '_');
        if c != '@' || in_literal || !starts_name {
            out.push(c);
            continue;
        }

        let mut name = String::new();
        while let Some(&(_, next)) = chars.peek() {
            if next.is_ascii_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }

        let position = match names.iter().position(|n| *n == name) {
            Some(i) => i + 1,
            None => {
                let value = params
                    .get(&name)
                    .ok_or_else(|| ExecError::UnknownParam(name.clone()))?;
                values.push(value.clone());
                names.push(name);
                names.len()
            }
        };
        out.push('$');
        out.push_str(&position.to_string());
    }

    Ok((out, values))
}

/// Runs parameterized SQL against the breaker-guarded pool
#[derive(Clone)]
pub struct QueryExecutor {
    pool: Arc<SqlPool>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(pool: Arc<SqlPool>) -> Self {
        Self {
            pool,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Execute `sql` and map every row into `T`.
    ///
    /// Never returns an error: failures are reported through
    /// `QueryResult { success: false, error }`.
    pub async fn execute_query<T>(&self, sql: &str, params: &Params) -> QueryResult<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let started = Instant::now();

        match tokio::time::timeout(self.timeout, self.run::<T>(sql, params)).await {
            Ok(Ok(rows)) => {
                tracing::debug!(rows = rows.len(), elapsed = ?started.elapsed(), "Query executed");
                QueryResult::ok(rows)
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "Query failed");
                QueryResult::err(err.kind(), err.to_string())
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Query timed out");
                QueryResult::err(
                    FailureKind::Timeout,
                    format!("Query timed out after {:?}", self.timeout),
                )
            }
        }
    }

    async fn run<T>(&self, sql: &str, params: &Params) -> Result<Vec<T>, ExecError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let (sql, values) = bind_named(sql, params)?;
        let pool = self.pool.acquire().await?;

        let mut query = sqlx::query_as::<_, T>(&sql);
        for value in values {
            query = match value {
                SqlValue::Int(v) => query.bind(v),
                SqlValue::Float(v) => query.bind(v),
                SqlValue::Text(v) => query.bind(v),
                SqlValue::Bool(v) => query.bind(v),
            };
        }

        Ok(query.fetch_all(pool.inner()).await?)
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.pool.breaker_snapshot()
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.pool.breaker_state()
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.pool_status()
    }

    /// Drop the cached pool so the next query reconnects
    pub async fn invalidate(&self) {
        self.pool.invalidate().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealerlot_core::{CircuitBreakerConfig, ConnectionSources};

    #[derive(Debug, sqlx::FromRow)]
    struct One {
        #[allow(dead_code)]
        value: i32,
    }

    fn executor(sources: ConnectionSources) -> QueryExecutor {
        QueryExecutor::new(Arc::new(ResilientPool::with_breaker(
            PgConnector::default(),
            sources,
            CircuitBreakerConfig::default(),
        )))
    }

    #[test]
    fn rewrites_named_params() {
        let params = Params::new().bind("vin", "ABC").bind("year", 2020);
        let (sql, values) = bind_named(
            "SELECT * FROM vehicles WHERE vin = @vin AND year >= @year OR vin = @vin",
            &params,
        )
        .unwrap();

        assert_eq!(
            sql,
            "SELECT * FROM vehicles WHERE vin = $1 AND year >= $2 OR vin = $1"
        );
        assert_eq!(
            values,
            vec![SqlValue::Text(Some("ABC".into())), SqlValue::Int(Some(2020))]
        );
    }

    #[test]
    fn leaves_literals_and_operators_alone() {
        let params = Params::new().bind("make", "Ford");
        let (sql, values) =
            bind_named("SELECT '@make' AS tag, @ 5 AS n WHERE make = @make", &params).unwrap();

        assert_eq!(sql, "SELECT '@make' AS tag, @ 5 AS n WHERE make = $1");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn unknown_param_is_an_error() {
        let err = bind_named("SELECT @missing", &Params::new()).unwrap_err();
        assert!(matches!(err, ExecError::UnknownParam(name) if name == "missing"));
    }

    #[test]
    fn rebinding_replaces_value() {
        let params = Params::new().bind("limit", 10).bind("limit", 25);
        assert_eq!(params.get("limit"), Some(&SqlValue::Int(Some(25))));
    }

    #[test]
    fn value_types_follow_rust_types() {
        assert_eq!(SqlValue::from(7i32), SqlValue::Int(Some(7)));
        assert_eq!(SqlValue::from(1.5f64), SqlValue::Float(Some(1.5)));
        assert_eq!(SqlValue::from(None::<String>), SqlValue::Text(None));
        assert_eq!(SqlValue::from(true), SqlValue::Bool(Some(true)));
    }

    #[test]
    fn envelope_into_result() {
        assert_eq!(QueryResult::ok(vec![1, 2]).into_result(), Ok(vec![1, 2]));
        assert_eq!(
            QueryResult::<i32>::err(FailureKind::Timeout, "boom").into_result(),
            Err(QueryFailure {
                kind: FailureKind::Timeout,
                message: "boom".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn missing_configuration_is_reported_not_thrown() {
        let exec = executor(ConnectionSources::from_pairs([("DATABASE_URL", None::<String>)]));
        let result = exec.execute_query::<One>("SELECT 1 AS value", &Params::new()).await;

        assert!(!result.success);
        assert!(result.data.is_none());
        assert!(result.error.unwrap().contains("Configuration"));
        assert_eq!(result.kind, Some(FailureKind::Configuration));
    }

    #[tokio::test]
    async fn breaker_open_is_reported_not_thrown() {
        let exec = executor(ConnectionSources::literal("not a url"));

        for _ in 0..5 {
            let result = exec.execute_query::<One>("SELECT 1 AS value", &Params::new()).await;
            assert!(!result.success);
        }
        assert_eq!(exec.breaker_state(), CircuitState::Open);

        let result = exec.execute_query::<One>("SELECT 1 AS value", &Params::new()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("Circuit breaker is open"));
        assert_eq!(result.kind, Some(FailureKind::CircuitOpen));
        assert!(exec.breaker_snapshot().is_open);
    }

    #[tokio::test]
    async fn bad_params_do_not_touch_breaker() {
        let exec = executor(ConnectionSources::literal("not a url"));
        let result = exec.execute_query::<One>("SELECT @nope", &Params::new()).await;

        assert!(!result.success);
        assert_eq!(result.kind, Some(FailureKind::Query));
        assert_eq!(exec.breaker_snapshot().failures, 0);
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn executes_against_database() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
        let exec = executor(ConnectionSources::literal(url));

        let result = exec
            .execute_query::<One>("SELECT @v::int4 AS value", &Params::new().bind("v", 41))
            .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.data.unwrap().len(), 1);
    }
}
