//! Reads behind the balance and day-trade calculations. Callers run them
//! inside one repeatable-read transaction so all of them see one snapshot.

use anyhow::{Context, Result};
use bol_schemas::{Account, CashSnapshot, Execution, Order, Position, Transfer};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use crate::rows::{self, POSITION_COLUMNS};

pub async fn fetch_account(conn: &mut PgConnection, account_id: Uuid) -> Result<Option<Account>> {
    let row: Option<(Uuid, rust_decimal::Decimal)> = sqlx::query_as(
        "select account_id, cash_withdrawable from accounts where account_id = $1",
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await
    .context("fetch_account failed")?;

    Ok(row.map(|(account_id, cash_withdrawable)| Account {
        account_id,
        cash_withdrawable,
    }))
}

pub async fn latest_cash_snapshot(
    conn: &mut PgConnection,
    account_id: Uuid,
) -> Result<Option<CashSnapshot>> {
    let row = sqlx::query(
        r#"
        select account_id, trading_date, value
        from cash_snapshots
        where account_id = $1
        order by trading_date desc
        limit 1
        "#,
    )
    .bind(account_id)
    .fetch_optional(&mut *conn)
    .await
    .context("latest_cash_snapshot failed")?;

    row.map(|r| -> Result<CashSnapshot> {
        Ok(CashSnapshot {
            account_id: r.try_get("account_id")?,
            trading_date: r.try_get("trading_date")?,
            value: r.try_get("value")?,
        })
    })
    .transpose()
}

/// Outgoing transfers not yet batch-processed and not dead.
pub async fn pending_outgoing_transfers(
    conn: &mut PgConnection,
    account_id: Uuid,
) -> Result<Vec<Transfer>> {
    let rows = sqlx::query(
        r#"
        select transfer_id, account_id, direction, amount, status,
               batch_processed_at, created_at
        from transfers
        where account_id = $1
          and direction = 'outgoing'
          and batch_processed_at is null
          and status not in ('canceled', 'rejected', 'returned')
        order by created_at, transfer_id
        "#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await
    .context("pending_outgoing_transfers failed")?;
    rows.iter().map(rows::transfer).collect()
}

/// Orders that can still fill, any age.
pub async fn open_orders(conn: &mut PgConnection, account_id: Uuid) -> Result<Vec<Order>> {
    let rows = sqlx::query(
        r#"
        select order_id, account_id, symbol, side, order_type, quantity,
               filled_quantity, limit_price, estimated_price, status, created_at
        from orders
        where account_id = $1
          and status in ('new', 'pending_new', 'accepted', 'partially_filled',
                         'pending_cancel', 'pending_replace')
        order by created_at, order_id
        "#,
    )
    .bind(account_id)
    .fetch_all(&mut *conn)
    .await
    .context("open_orders failed")?;
    rows.iter().map(rows::order).collect()
}

/// Non-split lots entered or exited at or after `since`.
pub async fn positions_touched_since(
    conn: &mut PgConnection,
    account_id: Uuid,
    since: DateTime<Utc>,
) -> Result<Vec<Position>> {
    let sql = format!(
        r#"
        select {POSITION_COLUMNS}
        from positions
        where account_id = $1
          and status <> 'split'
          and (entry_time >= $2 or exit_time >= $2)
        order by entry_time, id
        "#
    );
    let rows = sqlx::query(&sql)
        .bind(account_id)
        .bind(since)
        .fetch_all(&mut *conn)
        .await
        .context("positions_touched_since failed")?;
    rows.iter().map(rows::position).collect()
}

/// Fill executions with `since < transaction_time <= until`.
pub async fn executions_since(
    conn: &mut PgConnection,
    account_id: Uuid,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<Execution>> {
    let rows = sqlx::query(
        r#"
        select execution_id, order_id, symbol, side, exec_type, quantity,
               avg_price, cum_quantity, transaction_time
        from executions
        where account_id = $1
          and exec_type in ('fill', 'partial_fill')
          and transaction_time > $2 and transaction_time <= $3
        order by transaction_time, execution_id
        "#,
    )
    .bind(account_id)
    .bind(since)
    .bind(until)
    .fetch_all(&mut *conn)
    .await
    .context("executions_since failed")?;
    rows.iter().map(rows::execution).collect()
}
