//! bol-db
//!
//! Postgres store for the ledger engine. Runtime-checked `sqlx::query`
//! everywhere; no compile-time query macros besides `migrate!`.
//!
//! - connection, migrations, status
//! - isolation-scoped transactions (`begin_isolated`)
//! - positions: lot reads, split marks, `apply_position_writes`
//! - execution inbox dedupe, instrument resolution
//! - balance / day-trade reads
//! - batch-error upsert

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};

mod batch_errors;
mod ledger;
mod reads;
mod rows;

pub use batch_errors::{fetch_batch_errors, upsert_batch_error, BatchErrorRow};
pub use ledger::{
    apply_position_writes, inbox_insert_execution, insert_execution, keys_marked_for_split,
    load_lots, load_lots_marked_for_split, load_open_long_lots, lock_account, mark_lots_for_split,
    open_quantities, resolve_instrument,
};
pub use reads::{
    executions_since, fetch_account, latest_cash_snapshot, open_orders, pending_outgoing_transfers,
    positions_touched_since,
};

pub const ENV_DB_URL: &str = "BOL_DATABASE_URL";

/// Connect to Postgres using BOL_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 10).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_positions_table: bool,
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'positions'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_positions_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    /// Ledger writes.
    Serializable,
    /// Consistent multi-table reads.
    RepeatableReadOnly,
}

impl Isolation {
    fn set_statement(&self) -> &'static str {
        match self {
            Isolation::Serializable => "set transaction isolation level serializable",
            Isolation::RepeatableReadOnly => {
                "set transaction isolation level repeatable read, read only"
            }
        }
    }
}

/// Open a transaction at the given isolation level. The `set transaction`
/// runs before any other statement, as Postgres requires.
pub async fn begin_isolated(
    pool: &PgPool,
    isolation: Isolation,
) -> Result<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;
    sqlx::query(isolation.set_statement())
        .execute(&mut *tx)
        .await
        .context("set transaction isolation failed")?;
    Ok(tx)
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// SQLSTATE 40001 (serialization_failure) or 40P01 (deadlock_detected)
/// anywhere in the chain.
pub fn is_serialization_failure(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<sqlx::Error>()
            .and_then(sqlstate)
            .is_some_and(|code| code == "40001" || code == "40P01")
    })
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// Detect a Postgres unique constraint violation by name.
pub(crate) fn is_unique_constraint_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.code().as_deref() == Some("23505") && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}
