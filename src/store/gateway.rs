//! The Store Gateway (§4.C): a bounded connection pool with fetch-one/
//! fetch-all and transactional-batch execution, guarded by a circuit
//! breaker and instrumented per query kind. Grounded on the `Database`
//! wrapper over `PgPool` with positional `sqlx::query_as` binds.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres};
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::errors::CoreError;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryKind {
    fn as_str(self) -> &'static str {
        match self {
            QueryKind::Select => "select",
            QueryKind::Insert => "insert",
            QueryKind::Update => "update",
            QueryKind::Delete => "delete",
        }
    }
}

/// A type-erased positional bind value; lets callers build SQL parameter
/// lists dynamically (reconciler batches, scheduled maintenance) without
/// sqlx's compile-time query macros.
#[derive(Debug, Clone)]
pub enum SqlParam {
    I64(i64),
    I32(i32),
    Str(String),
    Bool(bool),
    Json(JsonValue),
    Null,
}

/// One statement in a transactional batch: SQL text plus its positional
/// parameters (§4.C "ordered list of (sql, params) pairs").
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
    pub kind: QueryKind,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>, kind: QueryKind) -> Self {
        Self {
            sql: sql.into(),
            params,
            kind,
        }
    }
}

#[derive(Debug, Default)]
struct QueryStats {
    count: AtomicU64,
    total_micros: AtomicU64,
    slow_count: AtomicU64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryStatsSnapshot {
    pub count: u64,
    pub avg_duration_ms: f64,
    pub slow_count: u64,
}

pub struct GatewayConfig {
    pub database_url: String,
    pub pool_size: u32,
    pub acquire_timeout: Duration,
    pub circuit_breaker: CircuitBreakerConfig,
    pub slow_query_threshold: Duration,
}

pub struct StoreGateway {
    pool: PgPool,
    breaker: Arc<Mutex<CircuitBreaker>>,
    stats: HashMap<QueryKind, QueryStats>,
    slow_query_threshold: Duration,
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    params: &'q [SqlParam],
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    for p in params {
        query = match p {
            SqlParam::I64(v) => query.bind(v),
            SqlParam::I32(v) => query.bind(v),
            SqlParam::Str(v) => query.bind(v),
            SqlParam::Bool(v) => query.bind(v),
            SqlParam::Json(v) => query.bind(v),
            SqlParam::Null => query.bind(None::<i64>),
        };
    }
    query
}

impl StoreGateway {
    pub async fn connect(config: GatewayConfig) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(CoreError::from)?;
        let mut stats = HashMap::new();
        for kind in [QueryKind::Select, QueryKind::Insert, QueryKind::Update, QueryKind::Delete] {
            stats.insert(kind, QueryStats::default());
        }
        Ok(Self {
            pool,
            breaker: Arc::new(Mutex::new(CircuitBreaker::new(config.circuit_breaker))),
            stats,
            slow_query_threshold: config.slow_query_threshold,
        })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        for ddl in super::schema::ALL_DDL {
            sqlx::query(ddl)
                .execute(&self.pool)
                .await
                .map_err(CoreError::from)?;
        }
        Ok(())
    }

    async fn guard_attempt(&self) -> Result<(), CoreError> {
        let mut breaker = self.breaker.lock().await;
        if breaker.can_attempt() {
            Ok(())
        } else {
            Err(CoreError::CircuitOpen)
        }
    }

    async fn record_outcome<T>(&self, kind: QueryKind, started: Instant, result: &Result<T, CoreError>) {
        let elapsed = started.elapsed();
        let stats = &self.stats[&kind];
        stats.count.fetch_add(1, Ordering::Relaxed);
        stats
            .total_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if elapsed >= self.slow_query_threshold {
            stats.slow_count.fetch_add(1, Ordering::Relaxed);
            warn!(kind = kind.as_str(), elapsed_ms = elapsed.as_millis() as u64, "slow query");
        }
        let mut breaker = self.breaker.lock().await;
        match result {
            Ok(_) => breaker.record_success(),
            Err(e) if matches!(e, CoreError::CircuitOpen) => {}
            Err(_) => breaker.record_failure(),
        }
    }

    #[instrument(skip(self, params))]
    pub async fn fetch_one<T>(&self, kind: QueryKind, sql: &str, params: &[SqlParam]) -> Result<T, CoreError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        self.guard_attempt().await?;
        let started = Instant::now();
        let query = bind_params(sqlx::query(sql), params);
        let result = query
            .fetch_one(&self.pool)
            .await
            .map_err(CoreError::from)
            .and_then(|row| T::from_row(&row).map_err(CoreError::from));
        self.record_outcome(kind, started, &result).await;
        result
    }

    #[instrument(skip(self, params))]
    pub async fn fetch_all<T>(&self, kind: QueryKind, sql: &str, params: &[SqlParam]) -> Result<Vec<T>, CoreError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        self.guard_attempt().await?;
        let started = Instant::now();
        let query = bind_params(sqlx::query(sql), params);
        let result = query
            .fetch_all(&self.pool)
            .await
            .map_err(CoreError::from)
            .and_then(|rows| {
                rows.iter()
                    .map(T::from_row)
                    .collect::<Result<Vec<T>, sqlx::Error>>()
                    .map_err(CoreError::from)
            });
        self.record_outcome(kind, started, &result).await;
        result
    }

    /// Executes `statements` atomically on a single connection; rolls back
    /// on the first error and surfaces it (§4.C, §8 property 9).
    #[instrument(skip(self, statements))]
    pub async fn execute_batch(&self, statements: &[Statement]) -> Result<(), CoreError> {
        self.guard_attempt().await?;
        let started = Instant::now();
        let result = self.execute_batch_inner(statements).await;
        // Batches touch several kinds; bucket the whole batch under the
        // kind of its final (typically the most consequential) statement.
        let kind = statements.last().map(|s| s.kind).unwrap_or(QueryKind::Update);
        self.record_outcome(kind, started, &result).await;
        result
    }

    async fn execute_batch_inner(&self, statements: &[Statement]) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(CoreError::from)?;
        for stmt in statements {
            let query = bind_params(sqlx::query(&stmt.sql), &stmt.params);
            if let Err(e) = query.execute(&mut *tx).await {
                tx.rollback().await.map_err(CoreError::from)?;
                return Err(CoreError::from(e));
            }
        }
        tx.commit().await.map_err(CoreError::from)?;
        Ok(())
    }

    pub async fn stats(&self) -> HashMap<String, QueryStatsSnapshot> {
        self.stats
            .iter()
            .map(|(kind, stats)| {
                let count = stats.count.load(Ordering::Relaxed);
                let total = stats.total_micros.load(Ordering::Relaxed);
                let avg_duration_ms = if count == 0 {
                    0.0
                } else {
                    (total as f64 / count as f64) / 1000.0
                };
                (
                    kind.as_str().to_string(),
                    QueryStatsSnapshot {
                        count,
                        avg_duration_ms,
                        slow_count: stats.slow_count.load(Ordering::Relaxed),
                    },
                )
            })
            .collect()
    }

    pub async fn circuit_state(&self) -> super::circuit_breaker::CircuitState {
        self.breaker.lock().await.state()
    }
}
