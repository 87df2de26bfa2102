//! Ledger writes and the reads they depend on. Every function takes the
//! caller's connection so it runs inside the caller's transaction.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use bol_positions::{LotKey, PositionWrite};
use bol_schemas::{Account, Execution, LedgerError, Position};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::rows::{self, POSITION_COLUMNS};

/// Row-lock the account for the rest of the transaction. Concurrent ledger
/// writers for the same account queue here instead of failing later.
pub async fn lock_account(conn: &mut PgConnection, account_id: Uuid) -> Result<Option<Account>> {
    let row = sqlx::query(
        r#"
        select account_id, cash_withdrawable
        from accounts
        where account_id = $1
        for update
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await
    .context("lock_account failed")?;

    row.map(|r| -> Result<Account> {
        Ok(Account {
            account_id: r.try_get("account_id")?,
            cash_withdrawable: r.try_get("cash_withdrawable")?,
        })
    })
    .transpose()
}

pub async fn resolve_instrument(conn: &mut PgConnection, symbol: &str) -> Result<Option<Uuid>> {
    let row: Option<(Uuid,)> =
        sqlx::query_as::<_, (Uuid,)>("select instrument_id from instruments where symbol = $1")
            .bind(symbol)
            .fetch_optional(&mut *conn)
            .await
            .context("resolve_instrument failed")?;
    Ok(row.map(|(id,)| id))
}

/// Inbox insert keyed by execution id. Returns `false` when the execution
/// was already applied, in which case the caller must write nothing.
pub async fn inbox_insert_execution(
    conn: &mut PgConnection,
    account_id: Uuid,
    execution_id: Uuid,
) -> Result<bool> {
    let res = sqlx::query(
        r#"
        insert into applied_executions (execution_id, account_id)
        values ($1, $2)
        on conflict (execution_id) do nothing
        "#,
    )
    .bind(execution_id)
    .bind(account_id)
    .execute(&mut *conn)
    .await
    .context("inbox_insert_execution failed")?;

    Ok(res.rows_affected() == 1)
}

/// Store the raw execution. Already-stored executions are left as they are.
pub async fn insert_execution(
    conn: &mut PgConnection,
    account_id: Uuid,
    exec: &Execution,
) -> Result<()> {
    sqlx::query(
        r#"
        insert into executions (
          execution_id, order_id, account_id, symbol, side, exec_type,
          quantity, avg_price, cum_quantity, transaction_time
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10
        )
        on conflict (execution_id) do nothing
        "#,
    )
    .bind(exec.execution_id)
    .bind(exec.order_id)
    .bind(account_id)
    .bind(&exec.symbol)
    .bind(exec.side.as_str())
    .bind(exec.exec_type.as_str())
    .bind(exec.quantity)
    .bind(exec.avg_price)
    .bind(exec.cum_quantity)
    .bind(exec.transaction_time)
    .execute(&mut *conn)
    .await
    .context("insert_execution failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Lot reads
// ---------------------------------------------------------------------------

/// Open long lots of `key`, oldest first, row-locked.
pub async fn load_open_long_lots(conn: &mut PgConnection, key: LotKey) -> Result<Vec<Position>> {
    let sql = format!(
        r#"
        select {POSITION_COLUMNS}
        from positions
        where account_id = $1 and instrument_id = $2
          and status = 'open' and side = 'long'
        order by entry_time, id
        for update
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(key.account_id)
        .bind(key.instrument_id)
        .fetch_all(&mut *conn)
        .await
        .context("load_open_long_lots failed")?;
    rows.iter().map(rows::position).collect()
}

/// Every lot of `key` in any status, oldest first.
pub async fn load_lots(conn: &mut PgConnection, key: LotKey) -> Result<Vec<Position>> {
    let sql = format!(
        r#"
        select {POSITION_COLUMNS}
        from positions
        where account_id = $1 and instrument_id = $2
        order by entry_time, id
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(key.account_id)
        .bind(key.instrument_id)
        .fetch_all(&mut *conn)
        .await
        .context("load_lots failed")?;
    rows.iter().map(rows::position).collect()
}

/// Summed open long quantity per key, for the accounts given.
pub async fn open_quantities(
    conn: &mut PgConnection,
    account_ids: &[Uuid],
) -> Result<BTreeMap<LotKey, Decimal>> {
    let rows = sqlx::query(
        r#"
        select account_id, instrument_id, sum(quantity) as qty
        from positions
        where status = 'open' and side = 'long' and account_id = any($1)
        group by account_id, instrument_id
        "#,
    )
    .bind(account_ids)
    .fetch_all(&mut *conn)
    .await
    .context("open_quantities failed")?;

    let mut out = BTreeMap::new();
    for r in rows {
        let key = LotKey {
            account_id: r.try_get("account_id")?,
            instrument_id: r.try_get("instrument_id")?,
        };
        out.insert(key, r.try_get::<Decimal, _>("qty")?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Split marks
// ---------------------------------------------------------------------------

/// Mark every open lot of `key` for the split run of `as_of`. Lots still
/// carrying a mark from an earlier date are re-marked; lots already marked
/// for `as_of` are left alone and not counted.
pub async fn mark_lots_for_split(
    conn: &mut PgConnection,
    key: LotKey,
    as_of: NaiveDate,
) -> Result<u64> {
    let res = sqlx::query(
        r#"
        update positions
        set marked_for_split_at = $3
        where account_id = $1 and instrument_id = $2
          and status = 'open' and marked_for_split_at is distinct from $3
        "#,
    )
    .bind(key.account_id)
    .bind(key.instrument_id)
    .bind(as_of)
    .execute(&mut *conn)
    .await
    .context("mark_lots_for_split failed")?;
    Ok(res.rows_affected())
}

/// Keys with at least one open lot marked for `as_of`, with the symbol.
pub async fn keys_marked_for_split(
    conn: &mut PgConnection,
    as_of: NaiveDate,
) -> Result<Vec<(LotKey, String)>> {
    let rows = sqlx::query(
        r#"
        select distinct account_id, instrument_id, symbol
        from positions
        where status = 'open' and marked_for_split_at = $1
        order by account_id, instrument_id
        "#,
    )
    .bind(as_of)
    .fetch_all(&mut *conn)
    .await
    .context("keys_marked_for_split failed")?;

    rows.iter()
        .map(|r| -> Result<(LotKey, String)> {
            Ok((
                LotKey {
                    account_id: r.try_get("account_id")?,
                    instrument_id: r.try_get("instrument_id")?,
                },
                r.try_get("symbol")?,
            ))
        })
        .collect()
}

/// Open lots of `key` marked for `as_of`, oldest first, row-locked.
pub async fn load_lots_marked_for_split(
    conn: &mut PgConnection,
    key: LotKey,
    as_of: NaiveDate,
) -> Result<Vec<Position>> {
    let sql = format!(
        r#"
        select {POSITION_COLUMNS}
        from positions
        where account_id = $1 and instrument_id = $2
          and status = 'open' and marked_for_split_at = $3
        order by entry_time, id
        for update
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(key.account_id)
        .bind(key.instrument_id)
        .bind(as_of)
        .fetch_all(&mut *conn)
        .await
        .context("load_lots_marked_for_split failed")?;
    rows.iter().map(rows::position).collect()
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Apply planned writes in order. A close or supersede that matches no row
/// in the expected state fails with `InvariantViolation`, so the caller's
/// transaction rolls back whole.
pub async fn apply_position_writes(conn: &mut PgConnection, writes: &[PositionWrite]) -> Result<()> {
    for w in writes {
        match w {
            PositionWrite::Insert(p) => insert_position(conn, p).await?,
            PositionWrite::Close {
                position_id,
                exit_price,
                exit_time,
                closing_order_id,
            } => {
                let res = sqlx::query(
                    r#"
                    update positions
                    set status = 'closed', exit_price = $2, exit_time = $3,
                        closing_order_id = $4, marked_for_split_at = null
                    where id = $1 and status = 'open'
                    "#,
                )
                .bind(position_id)
                .bind(exit_price)
                .bind(exit_time)
                .bind(closing_order_id)
                .execute(&mut *conn)
                .await
                .context("close position failed")?;
                if res.rows_affected() != 1 {
                    return Err(LedgerError::InvariantViolation(format!(
                        "position {position_id} is not open"
                    ))
                    .into());
                }
            }
            PositionWrite::Supersede { position_id } => {
                let res = sqlx::query(
                    r#"
                    update positions
                    set status = 'split', marked_for_split_at = null
                    where id = $1 and status <> 'split'
                    "#,
                )
                .bind(position_id)
                .execute(&mut *conn)
                .await
                .context("supersede position failed")?;
                if res.rows_affected() != 1 {
                    return Err(LedgerError::InvariantViolation(format!(
                        "position {position_id} is missing or already split"
                    ))
                    .into());
                }
            }
        }
    }
    Ok(())
}

async fn insert_position(conn: &mut PgConnection, p: &Position) -> Result<()> {
    p.check_invariants()?;
    let res = sqlx::query(
        r#"
        insert into positions (
          id, account_id, instrument_id, symbol, side, status, quantity,
          entry_price, entry_time, exit_price, exit_time, originating_order_id,
          closing_order_id, original_position_id, marked_for_split_at
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15
        )
        "#,
    )
    .bind(p.id)
    .bind(p.account_id)
    .bind(p.instrument_id)
    .bind(&p.symbol)
    .bind(p.side.as_str())
    .bind(p.status.as_str())
    .bind(p.quantity)
    .bind(p.entry_price)
    .bind(p.entry_time)
    .bind(p.exit_price)
    .bind(p.exit_time)
    .bind(p.originating_order_id)
    .bind(p.closing_order_id)
    .bind(p.original_position_id)
    .bind(p.marked_for_split_at)
    .execute(&mut *conn)
    .await;

    match res {
        Ok(_) => Ok(()),
        Err(e) if crate::is_unique_constraint_violation(&e, "positions_pkey") => {
            Err(LedgerError::InvariantViolation(format!("position {} already exists", p.id)).into())
        }
        Err(e) => Err(anyhow::Error::new(e).context("insert position failed")),
    }
}
